//! Datagram intake and dispatch
//!
//! The only reader of the media socket. Decodes each datagram and routes
//! it by payload type: audio into the audio buffer, video into the video
//! buffer plus the protection window, parity onto the FEC work queue so
//! recovery never blocks intake. Truncated datagrams are dropped as
//! single-packet loss; the stage keeps receiving while the session is
//! paused so in-flight packets drain into the buffers.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::buffer::{PlaybackBuffer, ProtectionWindow, StreamStats};
use crate::packet::{FecPacket, MediaPacket};
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::signals::SessionSignals;

pub struct ReceiveStage {
    socket: Arc<UdpSocket>,
    video_buffer: Arc<Mutex<PlaybackBuffer>>,
    audio_buffer: Arc<Mutex<PlaybackBuffer>>,
    window: Arc<Mutex<ProtectionWindow>>,
    fec_tx: mpsc::Sender<FecPacket>,
    video_stats: Arc<StreamStats>,
    audio_stats: Arc<StreamStats>,
    signals: SessionSignals,
}

impl ReceiveStage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        socket: Arc<UdpSocket>,
        video_buffer: Arc<Mutex<PlaybackBuffer>>,
        audio_buffer: Arc<Mutex<PlaybackBuffer>>,
        window: Arc<Mutex<ProtectionWindow>>,
        fec_tx: mpsc::Sender<FecPacket>,
        video_stats: Arc<StreamStats>,
        audio_stats: Arc<StreamStats>,
        signals: SessionSignals,
    ) -> Self {
        Self {
            socket,
            video_buffer,
            audio_buffer,
            window,
            fec_tx,
            video_stats,
            audio_stats,
            signals,
        }
    }

    fn dispatch(&self, packet: MediaPacket) {
        if packet.is_audio() {
            self.audio_stats
                .record_packet(packet.sequence_number, packet.wire_len());
            self.audio_buffer.lock().unwrap().insert(packet);
        } else if packet.is_video() {
            self.video_stats
                .record_packet(packet.sequence_number, packet.wire_len());
            self.window.lock().unwrap().insert(packet.clone());
            self.video_buffer.lock().unwrap().insert(packet);
        } else if packet.is_fec() {
            match FecPacket::decode(&packet.payload) {
                Ok(fec) => {
                    // Queue full means recovery is hopelessly behind; the
                    // parity is only redundancy, so drop it
                    if self.fec_tx.try_send(fec).is_err() {
                        warn!("FEC queue full, dropping parity packet");
                    }
                }
                Err(e) => debug!("dropping malformed FEC payload: {e:#}"),
            }
        } else {
            warn!(
                "unknown payload type {} (seq {})",
                packet.payload_type, packet.sequence_number
            );
        }
    }
}

#[async_trait]
impl PipelineStage for ReceiveStage {
    async fn run(&mut self) -> Result<()> {
        let mut buf = vec![0u8; 65536];

        info!("ReceiveStage: started");
        let mut total = 0u64;

        loop {
            let received = tokio::select! {
                _ = self.signals.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            match received {
                Ok((len, _from)) => match MediaPacket::decode(&buf[..len]) {
                    Ok(packet) => {
                        total += 1;
                        self.dispatch(packet);
                    }
                    // Below the minimum header size: single-packet loss
                    Err(e) => debug!("dropping truncated datagram: {e:#}"),
                },
                Err(e) => {
                    // Socket gone is fatal for the session
                    anyhow::bail!("media socket receive failed: {e}");
                }
            }
        }

        info!("ReceiveStage: finished ({total} datagrams)");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ReceiveStage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{AUDIO_TYPE, FEC_TYPE, MJPEG_TYPE};
    use bytes::Bytes;

    fn make_stage() -> (ReceiveStage, mpsc::Receiver<FecPacket>) {
        let (fec_tx, fec_rx) = mpsc::channel(16);
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_nonblocking(true).unwrap();
        let stage = ReceiveStage::new(
            Arc::new(UdpSocket::from_std(socket).unwrap()),
            Arc::new(Mutex::new(PlaybackBuffer::default())),
            Arc::new(Mutex::new(PlaybackBuffer::default())),
            Arc::new(Mutex::new(ProtectionWindow::new(15))),
            fec_tx,
            Arc::new(StreamStats::new()),
            Arc::new(StreamStats::new()),
            SessionSignals::new(false),
        );
        (stage, fec_rx)
    }

    #[tokio::test]
    async fn test_video_feeds_buffer_and_window() {
        let (stage, _fec_rx) = make_stage();

        let packet = MediaPacket::new(MJPEG_TYPE, 7, 100, Bytes::from_static(b"jpeg"));
        stage.dispatch(packet);

        assert_eq!(stage.video_buffer.lock().unwrap().len(), 1);
        assert!(stage.window.lock().unwrap().get(7).is_some());
        assert_eq!(stage.video_stats.received_packets(), 1);
        assert_eq!(stage.audio_stats.received_packets(), 0);
    }

    #[tokio::test]
    async fn test_audio_feeds_audio_buffer_only() {
        let (stage, _fec_rx) = make_stage();

        stage.dispatch(MediaPacket::new(
            AUDIO_TYPE,
            3,
            100,
            Bytes::from_static(b"pcm"),
        ));

        assert_eq!(stage.audio_buffer.lock().unwrap().len(), 1);
        assert!(stage.video_buffer.lock().unwrap().is_empty());
        assert!(stage.window.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fec_goes_to_work_queue() {
        let (stage, mut fec_rx) = make_stage();

        let parity = crate::fec::build_parity(&[
            MediaPacket::new(MJPEG_TYPE, 1, 10, Bytes::from_static(b"a")),
            MediaPacket::new(MJPEG_TYPE, 2, 20, Bytes::from_static(b"b")),
        ]);
        stage.dispatch(MediaPacket::new(FEC_TYPE, 0, 100, parity.encode()));

        let queued = fec_rx.try_recv().unwrap();
        assert_eq!(queued, parity);
        assert!(stage.video_buffer.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_fec_payload_dropped() {
        let (stage, mut fec_rx) = make_stage();

        stage.dispatch(MediaPacket::new(
            FEC_TYPE,
            0,
            100,
            Bytes::from_static(b"short"),
        ));
        assert!(fec_rx.try_recv().is_err());
    }
}
