//! Sequence-ordered playback buffer
//!
//! Holds received (and FEC-recovered) packets of one media type until the
//! playback scheduler's clock reaches their slot. Insertion keeps the
//! buffer sorted by wraparound-aware sequence order; capacity is bounded
//! and overrun discards the newcomer instead of blocking the intake path.

use std::collections::VecDeque;

use crate::packet::{MediaPacket, seq_precedes};

/// Default bound on buffered packets per media type
pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounded reorder buffer for one media type.
///
/// Shared behind a mutex: the transport orchestrator inserts, the playback
/// scheduler peeks and pops. Packets are kept in ascending sequence order
/// so the scheduler only ever inspects the front.
pub struct PlaybackBuffer {
    buffer: VecDeque<MediaPacket>,
    capacity: usize,
    dropped: u64,
}

impl PlaybackBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
            dropped: 0,
        }
    }

    /// Insert a packet in sequence order.
    ///
    /// Duplicates are discarded; a full buffer discards the newcomer and
    /// counts the drop. Returns whether the packet was kept.
    pub fn insert(&mut self, packet: MediaPacket) -> bool {
        let seq = packet.sequence_number;

        if self.buffer.iter().any(|p| p.sequence_number == seq) {
            return false;
        }

        if self.buffer.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }

        // First slot whose packet sorts after the newcomer
        let pos = self
            .buffer
            .iter()
            .position(|p| seq_precedes(seq, p.sequence_number));

        match pos {
            Some(i) => self.buffer.insert(i, packet),
            None => self.buffer.push_back(packet),
        }
        true
    }

    /// Sequence number of the lowest-ordered buffered packet
    pub fn peek_seq(&self) -> Option<u16> {
        self.buffer.front().map(|p| p.sequence_number)
    }

    /// Remove and return the lowest-ordered packet
    pub fn pop_front(&mut self) -> Option<MediaPacket> {
        self.buffer.pop_front()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Packets discarded because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PlaybackBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MJPEG_TYPE;
    use bytes::Bytes;

    fn make_packet(seq: u16) -> MediaPacket {
        MediaPacket::new(MJPEG_TYPE, seq, seq as u32 * 100, Bytes::from_static(b"x"))
    }

    #[test]
    fn test_out_of_order_insertion() {
        let mut buffer = PlaybackBuffer::default();

        buffer.insert(make_packet(3));
        buffer.insert(make_packet(1));
        buffer.insert(make_packet(2));

        assert_eq!(buffer.pop_front().unwrap().sequence_number, 1);
        assert_eq!(buffer.pop_front().unwrap().sequence_number, 2);
        assert_eq!(buffer.pop_front().unwrap().sequence_number, 3);
        assert!(buffer.pop_front().is_none());
    }

    #[test]
    fn test_duplicates_discarded() {
        let mut buffer = PlaybackBuffer::default();

        assert!(buffer.insert(make_packet(5)));
        assert!(!buffer.insert(make_packet(5)));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_ordering_across_rollover() {
        let mut buffer = PlaybackBuffer::default();

        buffer.insert(make_packet(1));
        buffer.insert(make_packet(u16::MAX));
        buffer.insert(make_packet(0));

        assert_eq!(buffer.peek_seq(), Some(u16::MAX));
        buffer.pop_front();
        assert_eq!(buffer.peek_seq(), Some(0));
        buffer.pop_front();
        assert_eq!(buffer.peek_seq(), Some(1));
    }

    #[test]
    fn test_overrun_discards_newcomer() {
        let mut buffer = PlaybackBuffer::new(2);

        assert!(buffer.insert(make_packet(1)));
        assert!(buffer.insert(make_packet(2)));
        assert!(!buffer.insert(make_packet(3)));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.peek_seq(), Some(1));
    }
}
