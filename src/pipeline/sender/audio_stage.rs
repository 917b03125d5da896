//! Audio send stage
//!
//! Paces PCM chunks at the audio period, one datagram per chunk. Audio is
//! not FEC-protected; a lost chunk is simply a lost chunk.

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;

use crate::media::MediaSource;
use crate::packet::{AUDIO_TYPE, MediaPacket};
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::signals::SessionSignals;

use super::media_timestamp;

pub struct AudioSendStage {
    source: Box<dyn MediaSource>,
    socket: Arc<UdpSocket>,
    dest: SocketAddr,
    signals: SessionSignals,
    period: std::time::Duration,
    seq: u16,
}

impl AudioSendStage {
    pub fn new(
        source: Box<dyn MediaSource>,
        socket: Arc<UdpSocket>,
        dest: SocketAddr,
        period: std::time::Duration,
        signals: SessionSignals,
    ) -> Self {
        Self {
            source,
            socket,
            dest,
            signals,
            period,
            seq: 0,
        }
    }
}

#[async_trait]
impl PipelineStage for AudioSendStage {
    async fn run(&mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("AudioSendStage: started toward {}", self.dest);

        loop {
            tokio::select! {
                _ = self.signals.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if !self.signals.wait_resumed().await {
                break;
            }

            let Some(chunk) = self.source.next_audio_chunk()? else {
                info!("AudioSendStage: end of stream after {} chunks", self.seq);
                break;
            };

            let packet = MediaPacket::new(AUDIO_TYPE, self.seq, media_timestamp(), chunk);
            self.seq = self.seq.wrapping_add(1);
            self.socket.send_to(&packet.encode(), self.dest).await?;
        }

        info!("AudioSendStage: finished ({} chunks)", self.seq);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "AudioSendStage"
    }
}
