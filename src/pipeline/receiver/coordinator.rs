//! Receiver pipeline coordinator
//!
//! Owns the shared buffers, counters and signals, wires the stages
//! together (receive → {buffers, FEC queue}, FEC → video buffer, playback
//! per media type → sink) and manages their lifecycle. Created paused;
//! PLAY opens the gate.

use anyhow::Result;
use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::buffer::{PlaybackBuffer, ProtectionWindow, StatsSnapshot, StreamStats};
use crate::config::ReceiverConfig;
use crate::fec::WINDOW_GROUPS;
use crate::media::{MediaKind, PlaybackSink};
use crate::packet::FecPacket;
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::signals::SessionSignals;

use super::{FecStage, PlaybackStage, ReceiveStage};

/// How long teardown waits for a stage before abandoning it
const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound on queued parity packets between receive and recovery
const FEC_QUEUE_CAPACITY: usize = 100;

pub struct ReceiverCoordinator {
    signals: SessionSignals,
    video_buffer: Arc<Mutex<PlaybackBuffer>>,
    audio_buffer: Arc<Mutex<PlaybackBuffer>>,
    window: Arc<Mutex<ProtectionWindow>>,
    video_stats: Arc<StreamStats>,
    audio_stats: Arc<StreamStats>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl ReceiverCoordinator {
    /// Create a coordinator over a shared signal handle; the caller is
    /// expected to start it paused (session READY).
    pub fn new(config: &ReceiverConfig, signals: SessionSignals) -> Self {
        let group_size = config.fec_group_size.max(1);
        Self {
            signals,
            video_buffer: Arc::new(Mutex::new(PlaybackBuffer::new(config.buffer_capacity))),
            audio_buffer: Arc::new(Mutex::new(PlaybackBuffer::new(config.buffer_capacity))),
            window: Arc::new(Mutex::new(ProtectionWindow::new(
                WINDOW_GROUPS * group_size,
            ))),
            video_stats: Arc::new(StreamStats::new()),
            audio_stats: Arc::new(StreamStats::new()),
            handles: Vec::new(),
        }
    }

    pub fn signals(&self) -> &SessionSignals {
        &self.signals
    }

    /// Current counters for both streams: `(video, audio)`.
    pub fn stats(&self) -> (StatsSnapshot, StatsSnapshot) {
        (self.video_stats.snapshot(), self.audio_stats.snapshot())
    }

    /// Spawn the receive, FEC and playback stages over `socket`.
    pub fn launch(
        &mut self,
        config: &ReceiverConfig,
        socket: Arc<UdpSocket>,
        sink: Box<dyn PlaybackSink>,
    ) -> Result<()> {
        let (fec_tx, fec_rx) = mpsc::channel::<FecPacket>(FEC_QUEUE_CAPACITY);
        let sink = Arc::new(Mutex::new(sink));

        let receive = ReceiveStage::new(
            socket,
            self.video_buffer.clone(),
            self.audio_buffer.clone(),
            self.window.clone(),
            fec_tx,
            self.video_stats.clone(),
            self.audio_stats.clone(),
            self.signals.clone(),
        );
        let fec = FecStage::new(
            fec_rx,
            self.window.clone(),
            self.video_buffer.clone(),
            self.video_stats.clone(),
            config.fec_group_size.max(1),
            self.signals.clone(),
        );
        let video_playback = PlaybackStage::new(
            MediaKind::Video,
            self.video_buffer.clone(),
            self.video_stats.clone(),
            sink.clone(),
            Duration::from_millis(config.video_period_ms),
            self.signals.clone(),
        );
        let audio_playback = PlaybackStage::new(
            MediaKind::Audio,
            self.audio_buffer.clone(),
            self.audio_stats.clone(),
            sink,
            Duration::from_millis(config.audio_period_ms),
            self.signals.clone(),
        );

        self.spawn(receive);
        self.spawn(fec);
        self.spawn(video_playback);
        self.spawn(audio_playback);

        // Periodic stats summary for the log
        let video_stats = self.video_stats.clone();
        let audio_stats = self.audio_stats.clone();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = signals.cancelled() => break,
                    _ = interval.tick() => {
                        info!("video: {}", video_stats.snapshot());
                        info!("audio: {}", audio_stats.snapshot());
                    }
                }
            }
        });

        info!("receiver pipeline launched");
        Ok(())
    }

    fn spawn<S: PipelineStage + 'static>(&mut self, mut stage: S) {
        let name = stage.name();
        let signals = self.signals.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = stage.run().await {
                error!("{}: {e:#}", stage.name());
                // A dead intake path is fatal for the whole session
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
        info!("receiver pipeline stopped");
    }
}
