//! Sender-side protection group assembly

use bytes::BytesMut;

use crate::packet::{FecPacket, MediaPacket};

use super::{MAX_GROUP_SIZE, MIN_GROUP_SIZE};

/// Accumulates outgoing media packets into protection groups and builds
/// one parity packet per group.
///
/// Packets must be pushed in send order; the group invariant (consecutive
/// ascending sequence numbers, same payload type) follows from that. A
/// partial group left at end of stream is flushed explicitly.
pub struct GroupAssembler {
    group_size: usize,
    group: Vec<MediaPacket>,
}

impl GroupAssembler {
    /// Create an assembler; the group size is clamped to `2..=16`.
    pub fn new(group_size: usize) -> Self {
        Self {
            group_size: group_size.clamp(MIN_GROUP_SIZE, MAX_GROUP_SIZE),
            group: Vec::with_capacity(group_size),
        }
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Number of packets waiting in the current group
    pub fn pending(&self) -> usize {
        self.group.len()
    }

    /// Add a packet to the current group.
    ///
    /// Returns the parity packet when this push completes a group.
    pub fn push(&mut self, packet: &MediaPacket) -> Option<FecPacket> {
        self.group.push(packet.clone());
        if self.group.len() >= self.group_size {
            let fec = build_parity(&self.group);
            self.group.clear();
            Some(fec)
        } else {
            None
        }
    }

    /// Emit parity for a partial group at end of stream, if any.
    pub fn flush(&mut self) -> Option<FecPacket> {
        if self.group.is_empty() {
            return None;
        }
        let fec = build_parity(&self.group);
        self.group.clear();
        Some(fec)
    }
}

/// Build the parity packet covering `group` (1..=16 packets).
///
/// The XOR payload spans each packet's full wire bytes zero-padded to the
/// largest wire size in the group, so an erased packet is rebuilt whole,
/// header included.
pub fn build_parity(group: &[MediaPacket]) -> FecPacket {
    debug_assert!(!group.is_empty() && group.len() <= MAX_GROUP_SIZE);

    let protection_length = group.iter().map(MediaPacket::wire_len).max().unwrap_or(0);

    let mut mask = 0u16;
    let mut pt_recovery = 0u8;
    let mut ts_recovery = 0u32;
    let mut len_recovery = 0u16;
    let mut xor = BytesMut::zeroed(protection_length);

    for (i, packet) in group.iter().enumerate() {
        mask |= 0x8000 >> i;
        pt_recovery ^= packet.payload_type;
        ts_recovery ^= packet.timestamp;
        len_recovery ^= packet.payload.len() as u16;

        for (dst, src) in xor.iter_mut().zip(packet.encode().iter()) {
            *dst ^= src;
        }
    }

    FecPacket {
        pt_recovery,
        sn_base: group[0].sequence_number,
        ts_recovery,
        len_recovery,
        protection_length: protection_length as u16,
        mask,
        xor_payload: xor.freeze(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MJPEG_TYPE;
    use bytes::Bytes;

    fn make_packet(seq: u16, timestamp: u32, payload: &[u8]) -> MediaPacket {
        MediaPacket::new(MJPEG_TYPE, seq, timestamp, Bytes::copy_from_slice(payload))
    }

    #[test]
    fn test_group_completion() {
        let mut assembler = GroupAssembler::new(3);

        assert!(assembler.push(&make_packet(1, 10, b"a")).is_none());
        assert!(assembler.push(&make_packet(2, 20, b"b")).is_none());
        let fec = assembler.push(&make_packet(3, 30, b"c")).unwrap();

        assert_eq!(fec.sn_base, 1);
        assert_eq!(fec.protected_count(), 3);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_flush_partial_group() {
        let mut assembler = GroupAssembler::new(5);

        assembler.push(&make_packet(7, 70, b"xy"));
        assembler.push(&make_packet(8, 80, b"z"));

        let fec = assembler.flush().unwrap();
        assert_eq!(fec.sn_base, 7);
        assert_eq!(fec.protected_count(), 2);
        assert_eq!(fec.mask, 0xC000);
        assert!(assembler.flush().is_none());
    }

    #[test]
    fn test_mask_and_length_invariants() {
        for n in 2..=16 {
            let group: Vec<MediaPacket> = (0..n)
                .map(|i| make_packet(100 + i as u16, i as u32, &vec![i as u8; i + 1]))
                .collect();
            let fec = build_parity(&group);

            assert_eq!(fec.protected_count(), n);
            // Contiguous run of ones starting at the MSB
            assert_eq!(fec.mask, !(u16::MAX.checked_shr(n as u32).unwrap_or(0)));
            // Largest wire size in the group (header + longest payload)
            assert_eq!(fec.protection_length as usize, 12 + n);
            assert_eq!(fec.xor_payload.len(), fec.protection_length as usize);
        }
    }

    #[test]
    fn test_recovery_fields() {
        let group = vec![
            make_packet(100, 1000, &[0x01, 0x02, 0x03]),
            make_packet(101, 2000, &[0x04, 0x05, 0x06]),
            make_packet(102, 3000, &[0x07, 0x08, 0x09]),
        ];
        let fec = build_parity(&group);

        assert_eq!(fec.ts_recovery, 1000 ^ 2000 ^ 3000);
        assert_eq!(fec.ts_recovery, 3968);
        assert_eq!(fec.len_recovery, 3);
        assert_eq!(fec.protection_length, 15);
        assert_eq!(fec.mask, 0xE000);
        assert_eq!(fec.pt_recovery, MJPEG_TYPE); // odd group size
    }

    #[test]
    fn test_group_size_clamped() {
        assert_eq!(GroupAssembler::new(0).group_size(), 2);
        assert_eq!(GroupAssembler::new(1).group_size(), 2);
        assert_eq!(GroupAssembler::new(99).group_size(), 16);
        assert_eq!(GroupAssembler::new(5).group_size(), 5);
    }
}
