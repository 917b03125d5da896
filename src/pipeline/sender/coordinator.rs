//! Sender pipeline coordinator
//!
//! Built on SETUP, once the receiver's address is known. Opens one
//! ephemeral UDP socket per stream (video, audio, parity), opens the media
//! source once per stage so each paces its own reads, and spawns the
//! stages paused: PLAY opens the gate, PAUSE closes it, TEARDOWN cancels
//! and joins with a bounded timeout.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::config::SenderConfig;
use crate::media::FileSource;
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::signals::SessionSignals;

use super::{AudioSendStage, VideoSendStage};

/// How long teardown waits for a stage before abandoning it
const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

pub struct SenderCoordinator {
    signals: SessionSignals,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl SenderCoordinator {
    /// Create a coordinator over a shared signal handle; the caller is
    /// expected to start it paused (session READY).
    pub fn new(signals: SessionSignals) -> Self {
        Self {
            signals,
            handles: Vec::new(),
        }
    }

    pub fn signals(&self) -> &SessionSignals {
        &self.signals
    }

    /// Open sockets and sources and spawn both send stages.
    pub async fn launch(
        &mut self,
        config: &SenderConfig,
        client_ip: IpAddr,
        client_port: u16,
    ) -> Result<()> {
        let dest = SocketAddr::new(client_ip, client_port);

        let video_socket = Arc::new(bind_ephemeral().await?);
        let fec_socket = Arc::new(bind_ephemeral().await?);

        // Each stage paces its own reads, so the file is opened per stage
        let video_source = FileSource::open(&config.media_path, None)?;
        let video = VideoSendStage::new(
            Box::new(video_source),
            video_socket,
            fec_socket,
            dest,
            config.fec_group_size,
            config.simulate_loss,
            Duration::from_millis(config.video_period_ms),
            self.signals.clone(),
        );
        self.spawn(video);

        if config.audio_path.is_some() {
            let audio_source = FileSource::open(&config.media_path, config.audio_path.as_deref())?;
            let audio_socket = Arc::new(bind_ephemeral().await?);
            let audio = AudioSendStage::new(
                Box::new(audio_source),
                audio_socket,
                dest,
                Duration::from_millis(config.audio_period_ms),
                self.signals.clone(),
            );
            self.spawn(audio);
        }

        info!("sender pipeline launched toward {dest}");
        Ok(())
    }

    fn spawn<S: PipelineStage + 'static>(&mut self, mut stage: S) {
        let name = stage.name();
        let signals = self.signals.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = stage.run().await {
                error!("{}: {e:#}", stage.name());
                // A dead send path is fatal for the whole session
                signals.cancel();
            }
        });
        self.handles.push((name, handle));
    }

    pub fn pause(&self) {
        self.signals.pause();
    }

    pub fn resume(&self) {
        self.signals.resume();
    }

    /// Cancel every stage and join each with a bounded timeout.
    pub async fn shutdown(&mut self) {
        self.signals.cancel();
        for (name, handle) in self.handles.drain(..) {
            match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
                Ok(_) => {}
                Err(_) => warn!("{name} did not stop within {JOIN_TIMEOUT:?}, abandoning it"),
            }
        }
        info!("sender pipeline stopped");
    }
}

async fn bind_ephemeral() -> Result<UdpSocket> {
    UdpSocket::bind(("0.0.0.0", 0))
        .await
        .context("binding ephemeral UDP socket")
}
