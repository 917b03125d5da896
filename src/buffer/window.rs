//! Protection window for FEC lookups
//!
//! A fixed-capacity ring indexed by sequence number modulo capacity. The
//! receive path appends every video packet; the FEC stage looks protected
//! sequence numbers up and evicts groups it is done with. Indexing by
//! sequence number sidesteps the scan-while-append hazards of a shared
//! ordered queue, and old entries fall out by being overwritten.

use crate::packet::{MediaPacket, seq_precedes};

/// Bounded ring of recent packets, keyed by sequence number.
pub struct ProtectionWindow {
    slots: Vec<Option<MediaPacket>>,
}

impl ProtectionWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity.max(1)).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Live entries currently held
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    fn slot(&self, seq: u16) -> usize {
        seq as usize % self.slots.len()
    }

    /// Insert a packet, displacing whatever occupied its slot.
    pub fn insert(&mut self, packet: MediaPacket) {
        let idx = self.slot(packet.sequence_number);
        self.slots[idx] = Some(packet);
    }

    /// Look up a packet by sequence number.
    pub fn get(&self, seq: u16) -> Option<&MediaPacket> {
        self.slots[self.slot(seq)]
            .as_ref()
            .filter(|p| p.sequence_number == seq)
    }

    /// Drop the entry for `seq`, if present.
    pub fn remove(&mut self, seq: u16) {
        let idx = self.slot(seq);
        if self.slots[idx]
            .as_ref()
            .is_some_and(|p| p.sequence_number == seq)
        {
            self.slots[idx] = None;
        }
    }

    /// Drop every entry whose sequence number precedes `seq`.
    pub fn evict_before(&mut self, seq: u16) {
        for slot in &mut self.slots {
            let stale = matches!(slot, Some(p) if seq_precedes(p.sequence_number, seq));
            if stale {
                *slot = None;
            }
        }
    }
}
