//! Video send stage
//!
//! Reads MJPEG frames at the streaming period, packetizes them and sends
//! one datagram per frame. Every outgoing packet also feeds the FEC
//! assembler; a completed group emits a parity datagram on its own socket.
//! Simulated loss drops the media datagram before the socket write but
//! still counts the packet into its protection group, so the receiver has
//! something to recover.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;

use crate::fec::GroupAssembler;
use crate::media::MediaSource;
use crate::packet::{FEC_TYPE, FecPacket, MJPEG_TYPE, MediaPacket};
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::signals::SessionSignals;

use super::media_timestamp;

pub struct VideoSendStage {
    source: Box<dyn MediaSource>,
    socket: Arc<UdpSocket>,
    fec_socket: Arc<UdpSocket>,
    dest: SocketAddr,
    assembler: Option<GroupAssembler>,
    signals: SessionSignals,
    period: std::time::Duration,
    loss_percent: u8,
    seq: u16,
    fec_seq: u16,
    simulated_losses: u64,
}

impl VideoSendStage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Box<dyn MediaSource>,
        socket: Arc<UdpSocket>,
        fec_socket: Arc<UdpSocket>,
        dest: SocketAddr,
        fec_group_size: usize,
        loss_percent: u8,
        period: std::time::Duration,
        signals: SessionSignals,
    ) -> Self {
        Self {
            source,
            socket,
            fec_socket,
            dest,
            assembler: (fec_group_size > 0).then(|| GroupAssembler::new(fec_group_size)),
            signals,
            period,
            loss_percent: loss_percent.min(100),
            seq: 0,
            fec_seq: 0,
            simulated_losses: 0,
        }
    }

    async fn send_parity(&mut self, parity: FecPacket) -> Result<()> {
        let packet = MediaPacket::new(FEC_TYPE, self.fec_seq, media_timestamp(), parity.encode());
        self.fec_seq = self.fec_seq.wrapping_add(1);
        self.fec_socket.send_to(&packet.encode(), self.dest).await?;
        Ok(())
    }
}

#[async_trait]
impl PipelineStage for VideoSendStage {
    async fn run(&mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("VideoSendStage: started toward {}", self.dest);

        loop {
            tokio::select! {
                _ = self.signals.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if !self.signals.wait_resumed().await {
                break;
            }

            let Some(frame) = self.source.next_video_frame()? else {
                // End of stream: a partial group still gets its parity
                let parity = self.assembler.as_mut().and_then(GroupAssembler::flush);
                if let Some(parity) = parity {
                    self.send_parity(parity).await?;
                }
                info!("VideoSendStage: end of stream after {} frames", self.seq);
                break;
            };

            let packet = MediaPacket::new(MJPEG_TYPE, self.seq, media_timestamp(), frame);
            self.seq = self.seq.wrapping_add(1);

            if self.loss_percent > 0 && rand::rng().random_range(0..100u8) < self.loss_percent {
                self.simulated_losses += 1;
                debug!(
                    "VideoSendStage: simulated loss of packet {} ({} total)",
                    packet.sequence_number, self.simulated_losses
                );
            } else {
                self.socket.send_to(&packet.encode(), self.dest).await?;
            }

            let parity = self.assembler.as_mut().and_then(|a| a.push(&packet));
            if let Some(parity) = parity {
                self.send_parity(parity).await?;
            }
        }

        info!(
            "VideoSendStage: finished ({} frames, {} parity packets, {} simulated losses)",
            self.seq, self.fec_seq, self.simulated_losses
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "VideoSendStage"
    }
}
