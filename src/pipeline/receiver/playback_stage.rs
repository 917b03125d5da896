//! Fixed-rate playback scheduler
//!
//! One stage per media type, waking at the stream's playback period. Each
//! tick inspects at most the lowest-ordered buffered packet: the expected
//! one is delivered to the sink, a stale one is discarded as late, and a
//! future one is left waiting while the slot is written off. The expected
//! cursor advances exactly once per tick, so playback is a fixed clock
//! that never stalls on a missing packet.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::buffer::{PlaybackBuffer, StreamStats};
use crate::media::{MediaKind, PlaybackSink};
use crate::packet::{MediaPacket, seq_precedes};
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::signals::SessionSignals;

pub struct PlaybackStage {
    kind: MediaKind,
    buffer: Arc<Mutex<PlaybackBuffer>>,
    stats: Arc<StreamStats>,
    sink: Arc<Mutex<Box<dyn PlaybackSink>>>,
    signals: SessionSignals,
    period: Duration,
    expected: Option<u16>,
    delivered: u64,
}

impl PlaybackStage {
    pub fn new(
        kind: MediaKind,
        buffer: Arc<Mutex<PlaybackBuffer>>,
        stats: Arc<StreamStats>,
        sink: Arc<Mutex<Box<dyn PlaybackSink>>>,
        period: Duration,
        signals: SessionSignals,
    ) -> Self {
        Self {
            kind,
            buffer,
            stats,
            sink,
            signals,
            period,
            expected: None,
            delivered: 0,
        }
    }

    /// One scheduler tick: decide what this slot gets, then advance the
    /// cursor. Returns the packet to deliver, if any.
    fn step(&mut self) -> Option<MediaPacket> {
        let mut buffer = self.buffer.lock().unwrap();

        let mut deliver = None;
        if let Some(seq) = buffer.peek_seq() {
            match self.expected {
                // First packet seen sets the cursor
                None => {
                    deliver = buffer.pop_front();
                    self.expected = Some(seq);
                }
                Some(expected) if seq == expected => {
                    deliver = buffer.pop_front();
                }
                Some(expected) if seq_precedes(seq, expected) => {
                    // Arrived after its slot passed
                    buffer.pop_front();
                    self.stats.record_late();
                    debug!("{}: packet {seq} late (expected {expected})", self.kind);
                }
                // Future packet: this slot is lost or still in flight
                Some(_) => {}
            }
        }

        // The clock never waits for a packet
        self.expected = self.expected.map(|seq| seq.wrapping_add(1));
        deliver
    }

    fn deliver(&mut self, packet: MediaPacket) -> Result<()> {
        let mut sink = self.sink.lock().unwrap();
        match self.kind {
            MediaKind::Video => sink.display_frame(&packet.payload)?,
            MediaKind::Audio => sink.write_audio(&packet.payload)?,
        }
        self.stats.record_played(packet.sequence_number);
        self.delivered += 1;
        Ok(())
    }
}

#[async_trait]
impl PipelineStage for PlaybackStage {
    async fn run(&mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("PlaybackStage({}): started", self.kind);

        loop {
            tokio::select! {
                _ = self.signals.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if !self.signals.wait_resumed().await {
                break;
            }

            if let Some(packet) = self.step()
                && let Err(e) = self.deliver(packet)
            {
                warn!("{} sink error: {e:#}", self.kind);
            }
        }

        info!(
            "PlaybackStage({}): finished ({} delivered)",
            self.kind, self.delivered
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "PlaybackStage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::NullSink;
    use crate::packet::MJPEG_TYPE;
    use bytes::Bytes;

    fn make_stage() -> PlaybackStage {
        PlaybackStage::new(
            MediaKind::Video,
            Arc::new(Mutex::new(PlaybackBuffer::default())),
            Arc::new(StreamStats::new()),
            Arc::new(Mutex::new(Box::new(NullSink) as Box<dyn PlaybackSink>)),
            Duration::from_millis(40),
            SessionSignals::new(false),
        )
    }

    fn push(stage: &PlaybackStage, seq: u16) {
        stage
            .buffer
            .lock()
            .unwrap()
            .insert(MediaPacket::new(
                MJPEG_TYPE,
                seq,
                0,
                Bytes::from_static(b"f"),
            ));
    }

    #[test]
    fn test_first_packet_sets_cursor() {
        let mut stage = make_stage();
        push(&stage, 42);

        let delivered = stage.step().unwrap();
        assert_eq!(delivered.sequence_number, 42);
        assert_eq!(stage.expected, Some(43));
    }

    #[test]
    fn test_cursor_advances_once_per_tick() {
        let mut stage = make_stage();
        push(&stage, 0);
        assert!(stage.step().is_some()); // cursor now 1

        // Ten empty ticks: exactly one advance each
        for expected in 1..=10u16 {
            assert_eq!(stage.expected, Some(expected));
            assert!(stage.step().is_none());
        }
        assert_eq!(stage.expected, Some(11));
    }

    #[test]
    fn test_in_order_delivery() {
        let mut stage = make_stage();
        for seq in 0..3 {
            push(&stage, seq);
        }

        for seq in 0..3 {
            assert_eq!(stage.step().unwrap().sequence_number, seq);
        }
        assert!(stage.step().is_none());
    }

    #[test]
    fn test_stale_packet_discarded_as_late() {
        let mut stage = make_stage();
        push(&stage, 5);
        assert!(stage.step().is_some()); // cursor 6
        assert!(stage.step().is_none()); // cursor 7

        push(&stage, 6); // missed its slot
        assert!(stage.step().is_none());
        assert_eq!(stage.stats.snapshot().late_packets, 1);
        assert!(stage.buffer.lock().unwrap().is_empty());
    }

    #[test]
    fn test_future_packet_left_waiting() {
        let mut stage = make_stage();
        push(&stage, 0);
        assert!(stage.step().is_some()); // cursor 1

        push(&stage, 3);
        assert!(stage.step().is_none()); // slot 1 written off
        assert!(stage.step().is_none()); // slot 2 written off
        // Slot 3: the waiting packet's turn
        assert_eq!(stage.step().unwrap().sequence_number, 3);
    }

    #[test]
    fn test_packet_delivered_only_once() {
        let mut stage = make_stage();
        push(&stage, 0);

        assert!(stage.step().is_some());
        push(&stage, 0); // duplicate arriving again
        let redelivered = stage.step();
        // Stale now (cursor moved past 0), so discarded as late
        assert!(redelivered.is_none());
        assert!(stage.buffer.lock().unwrap().is_empty());
    }
}
