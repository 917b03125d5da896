//! Per-stream reception statistics
//!
//! Tracks the counters the observer surface reads: received bytes and
//! packets, loss, late and recovered packet counts, inter-packet delay and
//! signed jitter, and delivered-frame rate for video. All fields are
//! atomics so the receive, FEC and playback stages can update them without
//! a lock; readers only ever see a snapshot.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel for "no sequence number observed yet"
const SEQ_UNSET: i64 = -1;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Shared counters for one media stream.
pub struct StreamStats {
    received_packets: AtomicU64,
    received_bytes: AtomicU64,
    lost_packets: AtomicU64,
    late_packets: AtomicU64,
    recovered_packets: AtomicU64,

    initial_seq: AtomicI64,
    last_received_seq: AtomicI64,
    last_played_seq: AtomicI64,

    last_packet_millis: AtomicU64,
    packet_delay_ms: AtomicI64,
    jitter_ms: AtomicI64,

    // Video only: delivered frames per second, recomputed once a second
    frames_since_update: AtomicU64,
    last_fps_update_millis: AtomicU64,
    fps_hundredths: AtomicU64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self {
            received_packets: AtomicU64::new(0),
            received_bytes: AtomicU64::new(0),
            lost_packets: AtomicU64::new(0),
            late_packets: AtomicU64::new(0),
            recovered_packets: AtomicU64::new(0),
            initial_seq: AtomicI64::new(SEQ_UNSET),
            last_received_seq: AtomicI64::new(SEQ_UNSET),
            last_played_seq: AtomicI64::new(SEQ_UNSET),
            last_packet_millis: AtomicU64::new(0),
            packet_delay_ms: AtomicI64::new(0),
            jitter_ms: AtomicI64::new(0),
            frames_since_update: AtomicU64::new(0),
            last_fps_update_millis: AtomicU64::new(now_millis()),
            fps_hundredths: AtomicU64::new(0),
        }
    }

    /// Record an arriving packet: byte/packet counts, gap-derived loss,
    /// inter-packet delay and signed jitter (previous delay minus current).
    pub fn record_packet(&self, seq: u16, wire_len: usize) {
        self.received_bytes
            .fetch_add(wire_len as u64, Ordering::Relaxed);
        let first = self.received_packets.fetch_add(1, Ordering::Relaxed) == 0;

        if first {
            self.initial_seq.store(seq as i64, Ordering::Relaxed);
        } else {
            let last = self.last_received_seq.load(Ordering::Relaxed) as u16;
            let gap = seq.wrapping_sub(last.wrapping_add(1));
            if gap > 0 && gap < 0x8000 {
                self.lost_packets.fetch_add(gap as u64, Ordering::Relaxed);
            }
        }
        self.last_received_seq.store(seq as i64, Ordering::Relaxed);

        let now = now_millis();
        let last_arrival = self.last_packet_millis.swap(now, Ordering::Relaxed);
        if last_arrival != 0 {
            let delay = now.saturating_sub(last_arrival) as i64;
            let previous = self.packet_delay_ms.swap(delay, Ordering::Relaxed);
            self.jitter_ms.store(previous - delay, Ordering::Relaxed);
        }
    }

    /// Record a packet popped past its playback slot
    pub fn record_late(&self) {
        self.late_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet rebuilt by FEC
    pub fn record_recovered(&self) {
        self.recovered_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet delivered to the sink; refreshes the FPS estimate.
    pub fn record_played(&self, seq: u16) {
        self.last_played_seq.store(seq as i64, Ordering::Relaxed);

        let frames = self.frames_since_update.fetch_add(1, Ordering::Relaxed) + 1;
        let now = now_millis();
        let since = self.last_fps_update_millis.load(Ordering::Relaxed);
        let elapsed = now.saturating_sub(since);
        if elapsed >= 1000 {
            let fps = frames as f64 * 1000.0 / elapsed as f64;
            self.fps_hundredths
                .store((fps * 100.0) as u64, Ordering::Relaxed);
            self.frames_since_update.store(0, Ordering::Relaxed);
            self.last_fps_update_millis.store(now, Ordering::Relaxed);
        }
    }

    pub fn received_packets(&self) -> u64 {
        self.received_packets.load(Ordering::Relaxed)
    }

    pub fn lost_packets(&self) -> u64 {
        self.lost_packets.load(Ordering::Relaxed)
    }

    pub fn recovered_packets(&self) -> u64 {
        self.recovered_packets.load(Ordering::Relaxed)
    }

    /// Loss percentage over the sequence span seen so far
    pub fn loss_percent(&self) -> u64 {
        let received = self.received_packets();
        let lost = self.lost_packets();
        if received + lost == 0 {
            return 0;
        }
        lost * 100 / (received + lost)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received_packets: self.received_packets(),
            received_bytes: self.received_bytes.load(Ordering::Relaxed),
            lost_packets: self.lost_packets(),
            late_packets: self.late_packets.load(Ordering::Relaxed),
            recovered_packets: self.recovered_packets(),
            loss_percent: self.loss_percent(),
            initial_seq: self.initial_seq.load(Ordering::Relaxed),
            last_received_seq: self.last_received_seq.load(Ordering::Relaxed),
            last_played_seq: self.last_played_seq.load(Ordering::Relaxed),
            packet_delay_ms: self.packet_delay_ms.load(Ordering::Relaxed),
            jitter_ms: self.jitter_ms.load(Ordering::Relaxed),
            fps: self.fps_hundredths.load(Ordering::Relaxed) as f64 / 100.0,
        }
    }
}

impl Default for StreamStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub received_packets: u64,
    pub received_bytes: u64,
    pub lost_packets: u64,
    pub late_packets: u64,
    pub recovered_packets: u64,
    pub loss_percent: u64,
    pub initial_seq: i64,
    pub last_received_seq: i64,
    pub last_played_seq: i64,
    pub packet_delay_ms: i64,
    pub jitter_ms: i64,
    pub fps: f64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} packets / {} bytes, {} lost ({}%), {} late, {} recovered, delay {} ms, jitter {:+} ms, {:.2} fps",
            self.received_packets,
            self.received_bytes,
            self.lost_packets,
            self.loss_percent,
            self.late_packets,
            self.recovered_packets,
            self.packet_delay_ms,
            self.jitter_ms,
            self.fps
        )
    }
}
