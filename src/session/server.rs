//! Control-channel server
//!
//! Used by the sender. Accepts a single client and turns well-formed,
//! state-legal requests into [`ServerEvent`]s for the worker to act on. A
//! request that does not fit the current state is dropped without a
//! response, so a protocol-layer violation has no effect on the session.

use anyhow::{Context, Result};
use log::{info, warn};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use super::SessionState;
use super::message::{Attachment, Method, Request, Response};

/// A committed state transition, with what the worker needs to act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    Setup { client_port: u16 },
    Play,
    Pause,
    Teardown,
}

pub struct ControlServer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    state: SessionState,
    session_id: u32,
}

impl ControlServer {
    /// Listen on `port` and accept exactly one client.
    pub async fn accept(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("binding control port {port}"))?;
        info!("waiting for a control connection on port {port}");

        let (stream, peer) = listener.accept().await.context("accepting control client")?;
        info!("control client connected from {peer}");
        Ok(Self::from_stream(stream, peer))
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer,
            state: SessionState::Init,
            // Arbitrary but stable for the lifetime of the process pair
            session_id: 123456,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Address of the connected client; datagrams go to its IP.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Block until the client commits a state transition.
    ///
    /// Requests illegal in the current state are logged and skipped; a
    /// malformed request or the channel closing surfaces as an error.
    pub async fn next_event(&mut self) -> Result<ServerEvent> {
        loop {
            let request = match self.read_request().await? {
                Some(request) => request,
                None => anyhow::bail!("control channel closed by client"),
            };

            if !self.state.accepts(request.method) {
                warn!(
                    "ignoring {} in state {} (no response sent)",
                    request.method, self.state
                );
                continue;
            }

            let response = Response::ok(request.cseq, self.session_id);
            self.writer
                .write_all(response.format().as_bytes())
                .await
                .context("writing control response")?;
            self.writer.flush().await?;

            self.state = self.state.after(request.method);
            info!("{} committed, session state {}", request.method, self.state);

            return Ok(match request.method {
                Method::Setup => match request.attachment {
                    Attachment::Transport { client_port } => ServerEvent::Setup { client_port },
                    // Parser guarantees SETUP carries a transport line
                    Attachment::Session(_) => unreachable!(),
                },
                Method::Play => ServerEvent::Play,
                Method::Pause => ServerEvent::Pause,
                Method::Teardown => ServerEvent::Teardown,
            });
        }
    }

    async fn read_request(&mut self) -> Result<Option<Request>> {
        let mut lines: [String; 3] = Default::default();
        for line in &mut lines {
            let mut raw = String::new();
            let read = self
                .reader
                .read_line(&mut raw)
                .await
                .context("reading control request")?;
            if read == 0 {
                return Ok(None);
            }
            *line = raw.trim_end().to_string();
        }

        // A malformed request is a session-level protocol error
        Request::parse(&lines)
            .map(Some)
            .context("malformed control request")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ControlClient;

    async fn pair() -> (ControlClient, ControlServer) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
        let client = ControlClient::connect(&addr.to_string(), "movie.mjpeg")
            .await
            .unwrap();
        let (stream, peer) = accept.await.unwrap();

        (client, ControlServer::from_stream(stream, peer))
    }

    #[tokio::test]
    async fn test_full_handshake() {
        let (mut client, mut server) = pair().await;

        let server_task = tokio::spawn(async move {
            let mut events = Vec::new();
            loop {
                let event = server.next_event().await.unwrap();
                events.push(event);
                if event == ServerEvent::Teardown {
                    break;
                }
            }
            events
        });

        client.setup(25000).await.unwrap();
        assert_eq!(client.state(), SessionState::Ready);
        assert_eq!(client.session_id(), 123456);

        client.play().await.unwrap();
        assert_eq!(client.state(), SessionState::Playing);

        client.pause().await.unwrap();
        assert_eq!(client.state(), SessionState::Ready);

        client.play().await.unwrap();
        client.teardown().await.unwrap();
        assert_eq!(client.state(), SessionState::Init);

        let events = server_task.await.unwrap();
        assert_eq!(
            events,
            vec![
                ServerEvent::Setup { client_port: 25000 },
                ServerEvent::Play,
                ServerEvent::Pause,
                ServerEvent::Play,
                ServerEvent::Teardown,
            ]
        );
    }

    #[tokio::test]
    async fn test_client_ignores_illegal_methods() {
        let (mut client, _server) = pair().await;

        // PLAY and PAUSE before SETUP never touch the wire
        client.play().await.unwrap();
        client.pause().await.unwrap();
        assert_eq!(client.state(), SessionState::Init);
    }
}
