//! FEC recovery stage
//!
//! Drains the parity queue filled by the receive stage. For each parity
//! packet it looks the protected sequence numbers up in the protection
//! window: a fully present group discards the parity, exactly one missing
//! packet is rebuilt and inserted into the video playback buffer, and
//! anything beyond that is logged as genuine loss. After a recovery the
//! group's packets and anything older than three group-widths behind the
//! base are evicted from the window.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::buffer::{PlaybackBuffer, ProtectionWindow, StreamStats};
use crate::fec::{RecoveryOutcome, WINDOW_GROUPS, recover};
use crate::packet::{FecPacket, MediaPacket};
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::signals::SessionSignals;

pub struct FecStage {
    fec_rx: mpsc::Receiver<FecPacket>,
    window: Arc<Mutex<ProtectionWindow>>,
    video_buffer: Arc<Mutex<PlaybackBuffer>>,
    stats: Arc<StreamStats>,
    signals: SessionSignals,
    group_size: usize,
    recovered: u64,
    unrecoverable: u64,
}

impl FecStage {
    pub fn new(
        fec_rx: mpsc::Receiver<FecPacket>,
        window: Arc<Mutex<ProtectionWindow>>,
        video_buffer: Arc<Mutex<PlaybackBuffer>>,
        stats: Arc<StreamStats>,
        group_size: usize,
        signals: SessionSignals,
    ) -> Self {
        Self {
            fec_rx,
            window,
            video_buffer,
            stats,
            signals,
            group_size,
            recovered: 0,
            unrecoverable: 0,
        }
    }

    fn process(&mut self, fec: FecPacket) {
        // Snapshot the group out of the window, then recover without
        // holding the lock
        let (present, missing): (Vec<MediaPacket>, Vec<u16>) = {
            let window = self.window.lock().unwrap();
            let mut present = Vec::with_capacity(fec.protected_count());
            let mut missing = Vec::new();
            for seq in fec.protected_sequences() {
                match window.get(seq) {
                    Some(packet) => present.push(packet.clone()),
                    None => missing.push(seq),
                }
            }
            (present, missing)
        };

        match recover(&fec, &present, &missing) {
            Ok(RecoveryOutcome::Intact) => {
                debug!("group at base {} fully received", fec.sn_base);
            }
            Ok(RecoveryOutcome::Recovered(packet)) => {
                debug!(
                    "recovered packet {} from group at base {}",
                    packet.sequence_number, fec.sn_base
                );
                self.video_buffer.lock().unwrap().insert(packet);
                self.stats.record_recovered();
                self.recovered += 1;

                let mut window = self.window.lock().unwrap();
                for seq in fec.protected_sequences() {
                    window.remove(seq);
                }
                let horizon = (WINDOW_GROUPS * self.group_size) as u16;
                window.evict_before(fec.sn_base.wrapping_sub(horizon));
            }
            Ok(RecoveryOutcome::Unrecoverable { missing }) => {
                warn!(
                    "group at base {}: {} packets missing, beyond single-erasure recovery",
                    fec.sn_base, missing
                );
                self.unrecoverable += 1;
            }
            Err(e) => warn!("discarding inconsistent parity packet: {e:#}"),
        }
    }
}

#[async_trait]
impl PipelineStage for FecStage {
    async fn run(&mut self) -> Result<()> {
        info!("FecStage: started (group size {})", self.group_size);

        loop {
            if !self.signals.wait_resumed().await {
                break;
            }
            let fec = tokio::select! {
                _ = self.signals.cancelled() => break,
                fec = self.fec_rx.recv() => match fec {
                    Some(fec) => fec,
                    None => break,
                },
            };
            self.process(fec);
        }

        info!(
            "FecStage: finished ({} recovered, {} unrecoverable groups)",
            self.recovered, self.unrecoverable
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "FecStage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fec::build_parity;
    use crate::packet::MJPEG_TYPE;
    use bytes::Bytes;

    fn make_packet(seq: u16, payload: &[u8]) -> MediaPacket {
        MediaPacket::new(MJPEG_TYPE, seq, seq as u32, Bytes::copy_from_slice(payload))
    }

    fn make_stage(group_size: usize) -> FecStage {
        let (_tx, rx) = mpsc::channel(4);
        FecStage::new(
            rx,
            Arc::new(Mutex::new(ProtectionWindow::new(group_size * 3))),
            Arc::new(Mutex::new(PlaybackBuffer::default())),
            Arc::new(StreamStats::new()),
            group_size,
            SessionSignals::new(false),
        )
    }

    #[test]
    fn test_single_erasure_recovered_into_buffer() {
        let mut stage = make_stage(3);

        let group = vec![
            make_packet(100, b"one"),
            make_packet(101, b"two"),
            make_packet(102, b"three"),
        ];
        let parity = build_parity(&group);

        {
            let mut window = stage.window.lock().unwrap();
            window.insert(group[0].clone());
            window.insert(group[2].clone()); // 101 was lost
        }

        stage.process(parity);

        let mut buffer = stage.video_buffer.lock().unwrap();
        let recovered = buffer.pop_front().unwrap();
        assert_eq!(recovered, group[1]);
        assert_eq!(stage.stats.recovered_packets(), 1);

        // The group was evicted after recovery
        let window = stage.window.lock().unwrap();
        assert!(window.get(100).is_none());
        assert!(window.get(102).is_none());
    }

    #[test]
    fn test_intact_group_changes_nothing() {
        let mut stage = make_stage(2);

        let group = vec![make_packet(5, b"a"), make_packet(6, b"b")];
        {
            let mut window = stage.window.lock().unwrap();
            for packet in &group {
                window.insert(packet.clone());
            }
        }

        stage.process(build_parity(&group));

        assert!(stage.video_buffer.lock().unwrap().is_empty());
        assert_eq!(stage.stats.recovered_packets(), 0);
        // Parity discarded without eviction
        assert_eq!(stage.window.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_double_erasure_fabricates_nothing() {
        let mut stage = make_stage(3);

        let group = vec![
            make_packet(10, b"x"),
            make_packet(11, b"y"),
            make_packet(12, b"z"),
        ];
        stage.window.lock().unwrap().insert(group[0].clone());

        stage.process(build_parity(&group));

        assert!(stage.video_buffer.lock().unwrap().is_empty());
        assert_eq!(stage.unrecoverable, 1);
        assert_eq!(stage.stats.recovered_packets(), 0);
    }

    #[test]
    fn test_stale_packets_evicted_after_recovery() {
        let mut stage = make_stage(2);

        // Well behind the next group's eviction horizon
        stage.window.lock().unwrap().insert(make_packet(1, b"old"));

        let group = vec![make_packet(100, b"a"), make_packet(101, b"b")];
        stage.window.lock().unwrap().insert(group[0].clone());

        stage.process(build_parity(&group));

        assert!(stage.window.lock().unwrap().get(1).is_none());
    }
}
