//! Control-channel client
//!
//! Used by the receiver to drive the session. Each method performs one
//! request/response exchange and commits the state transition only after a
//! matching 200 response. Methods that do not fit the current state are
//! ignored without touching the wire.

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use super::SessionState;
use super::message::{Attachment, Method, Request, Response};

pub struct ControlClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    resource: String,
    state: SessionState,
    cseq: u32,
    session_id: u32,
}

impl ControlClient {
    /// Open the control connection; no request is sent yet.
    pub async fn connect(addr: &str, resource: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting control channel to {addr}"))?;
        let (read_half, write_half) = stream.into_split();

        info!("control channel connected to {addr}");
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            resource: resource.to_string(),
            state: SessionState::Init,
            cseq: 0,
            session_id: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Negotiate the session, advertising the datagram receive port.
    pub async fn setup(&mut self, client_port: u16) -> Result<()> {
        self.transition(Method::Setup, Attachment::Transport { client_port })
            .await
    }

    pub async fn play(&mut self) -> Result<()> {
        self.transition(Method::Play, Attachment::Session(self.session_id))
            .await
    }

    pub async fn pause(&mut self) -> Result<()> {
        self.transition(Method::Pause, Attachment::Session(self.session_id))
            .await
    }

    pub async fn teardown(&mut self) -> Result<()> {
        self.transition(Method::Teardown, Attachment::Session(self.session_id))
            .await
    }

    async fn transition(&mut self, method: Method, attachment: Attachment) -> Result<()> {
        if !self.state.accepts(method) {
            debug!("{method} ignored in state {}", self.state);
            return Ok(());
        }

        self.cseq += 1;
        let request = Request {
            method,
            resource: self.resource.clone(),
            cseq: self.cseq,
            attachment,
        };

        let response = self.exchange(&request).await?;
        if response.code != 200 {
            anyhow::bail!("{method} rejected with status {}", response.code);
        }
        if response.cseq != self.cseq {
            anyhow::bail!(
                "response sequence mismatch: sent {}, got {}",
                self.cseq,
                response.cseq
            );
        }

        if method == Method::Setup {
            self.session_id = response.session;
        }
        self.state = self.state.after(method);
        info!("{method} acknowledged, session state {}", self.state);
        Ok(())
    }

    async fn exchange(&mut self, request: &Request) -> Result<Response> {
        self.writer
            .write_all(request.format().as_bytes())
            .await
            .context("writing control request")?;
        self.writer.flush().await?;

        let mut lines: [String; 3] = Default::default();
        for line in &mut lines {
            let mut raw = String::new();
            let read = self
                .reader
                .read_line(&mut raw)
                .await
                .context("reading control response")?;
            if read == 0 {
                anyhow::bail!("control channel closed by peer");
            }
            *line = raw.trim_end().to_string();
        }

        Response::parse(&lines)
    }
}
