//! Control message formats
//!
//! Requests and responses are three CRLF-terminated lines each:
//!
//! ```text
//! SETUP movie.mjpeg RTSP/1.0\r\n          RTSP/1.0 200 OK\r\n
//! CSeq: 1\r\n                             CSeq: 1\r\n
//! Transport: RTP/UDP; client_port= 25000  Session: 123456\r\n
//! ```
//!
//! SETUP carries the Transport line; every other method carries the
//! session id handed out in the SETUP response.

use anyhow::{Context, Result};
use std::str::FromStr;

pub const CRLF: &str = "\r\n";

const PROTOCOL_VERSION: &str = "RTSP/1.0";

/// Control methods, in handshake order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Setup,
    Play,
    Pause,
    Teardown,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Teardown => "TEARDOWN",
        }
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SETUP" => Ok(Method::Setup),
            "PLAY" => Ok(Method::Play),
            "PAUSE" => Ok(Method::Pause),
            "TEARDOWN" => Ok(Method::Teardown),
            other => anyhow::bail!("unknown control method: {other:?}"),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The third request line: transport parameters or the session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// `Transport: RTP/UDP; client_port= <port>` (SETUP only)
    Transport { client_port: u16 },
    /// `Session: <id>` (all other methods)
    Session(u32),
}

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub resource: String,
    pub cseq: u32,
    pub attachment: Attachment,
}

impl Request {
    /// Render the three request lines.
    pub fn format(&self) -> String {
        let third = match &self.attachment {
            Attachment::Transport { client_port } => {
                format!("Transport: RTP/UDP; client_port= {client_port}")
            }
            Attachment::Session(id) => format!("Session: {id}"),
        };
        format!(
            "{} {} {PROTOCOL_VERSION}{CRLF}CSeq: {}{CRLF}{third}{CRLF}",
            self.method, self.resource, self.cseq
        )
    }

    /// Parse a request from its three lines (CRLF already stripped).
    pub fn parse(lines: &[String; 3]) -> Result<Self> {
        let mut tokens = lines[0].split_whitespace();
        let method: Method = tokens
            .next()
            .context("empty request line")?
            .parse()?;
        let resource = tokens
            .next()
            .context("request line missing resource")?
            .to_string();

        let cseq = parse_labeled(&lines[1], "CSeq:")?;

        let attachment = if method == Method::Setup {
            // Transport: RTP/UDP; client_port= <port>
            let port_token = lines[2]
                .split_whitespace()
                .last()
                .context("transport line missing port")?;
            Attachment::Transport {
                client_port: port_token
                    .parse()
                    .with_context(|| format!("bad client_port: {port_token:?}"))?,
            }
        } else {
            Attachment::Session(parse_labeled(&lines[2], "Session:")?)
        };

        Ok(Self {
            method,
            resource,
            cseq,
            attachment,
        })
    }
}

/// A server response; anything but code 200 aborts the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub cseq: u32,
    pub session: u32,
}

impl Response {
    pub fn ok(cseq: u32, session: u32) -> Self {
        Self {
            code: 200,
            cseq,
            session,
        }
    }

    pub fn format(&self) -> String {
        let reason = if self.code == 200 { "OK" } else { "Error" };
        format!(
            "{PROTOCOL_VERSION} {} {reason}{CRLF}CSeq: {}{CRLF}Session: {}{CRLF}",
            self.code, self.cseq, self.session
        )
    }

    pub fn parse(lines: &[String; 3]) -> Result<Self> {
        let mut tokens = lines[0].split_whitespace();
        let version = tokens.next().context("empty status line")?;
        if version != PROTOCOL_VERSION {
            anyhow::bail!("unexpected protocol version: {version:?}");
        }
        let code = tokens
            .next()
            .context("status line missing code")?
            .parse()
            .context("bad status code")?;

        Ok(Self {
            code,
            cseq: parse_labeled(&lines[1], "CSeq:")?,
            session: parse_labeled(&lines[2], "Session:")?,
        })
    }
}

fn parse_labeled<T: FromStr>(line: &str, label: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let mut tokens = line.split_whitespace();
    let found = tokens.next().unwrap_or_default();
    if found != label {
        anyhow::bail!("expected {label:?} line, got {line:?}");
    }
    tokens
        .next()
        .with_context(|| format!("{label} line missing value"))?
        .parse()
        .with_context(|| format!("bad {label} value in {line:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> [String; 3] {
        let mut it = text.split(CRLF).map(str::to_string);
        [
            it.next().unwrap(),
            it.next().unwrap(),
            it.next().unwrap(),
        ]
    }

    #[test]
    fn test_setup_round_trip() {
        let request = Request {
            method: Method::Setup,
            resource: "movie.mjpeg".into(),
            cseq: 1,
            attachment: Attachment::Transport { client_port: 25000 },
        };

        let text = request.format();
        assert_eq!(
            text,
            "SETUP movie.mjpeg RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/UDP; client_port= 25000\r\n"
        );
        assert_eq!(Request::parse(&lines(&text)).unwrap(), request);
    }

    #[test]
    fn test_play_round_trip() {
        let request = Request {
            method: Method::Play,
            resource: "movie.mjpeg".into(),
            cseq: 2,
            attachment: Attachment::Session(123456),
        };

        let parsed = Request::parse(&lines(&request.format())).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_response_round_trip() {
        let response = Response::ok(3, 123456);
        let text = response.format();
        assert_eq!(text, "RTSP/1.0 200 OK\r\nCSeq: 3\r\nSession: 123456\r\n");
        assert_eq!(Response::parse(&lines(&text)).unwrap(), response);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(
            Request::parse(&[
                "FETCH movie RTSP/1.0".into(),
                "CSeq: 1".into(),
                "Session: 1".into()
            ])
            .is_err()
        );
        assert!(
            Request::parse(&[
                "PLAY movie RTSP/1.0".into(),
                "Seq: 1".into(),
                "Session: 1".into()
            ])
            .is_err()
        );
        assert!(
            Response::parse(&[
                "HTTP/1.1 200 OK".into(),
                "CSeq: 1".into(),
                "Session: 1".into()
            ])
            .is_err()
        );
    }

    #[test]
    fn test_non_ok_code_parses() {
        let parsed = Response::parse(&[
            "RTSP/1.0 404 Error".into(),
            "CSeq: 2".into(),
            "Session: 0".into(),
        ])
        .unwrap();
        assert_eq!(parsed.code, 404);
    }
}
