//! FEC packet codec
//!
//! A FEC packet protects a contiguous run of media packets with a single
//! XOR parity. It travels as the payload of a media packet whose payload
//! type is [`FEC_TYPE`](super::rtp::FEC_TYPE):
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   reserved    |  PT recovery  |     base sequence number      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      timestamp recovery                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        length recovery        |       protection length       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        protection mask        |       XOR payload ...         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The recovery fields are running XORs over the protected packets
//! (payload type, timestamp, payload length). The protection mask is a
//! contiguous run of ones starting at the MSB, one bit per protected
//! packet. The XOR payload covers the protected packets' full wire bytes
//! zero-padded to the protection length (the largest wire size in the
//! group), so a single erased packet can be rebuilt in its entirety.

use anyhow::Result;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the FEC header in bytes (before the XOR payload)
pub const FEC_HEADER_SIZE: usize = 14;

/// Parity data covering one protection group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FecPacket {
    /// XOR of the protected packets' payload types
    pub pt_recovery: u8,
    /// Sequence number of the first protected packet
    pub sn_base: u16,
    /// XOR of the protected packets' timestamps
    pub ts_recovery: u32,
    /// XOR of the protected packets' payload lengths
    pub len_recovery: u16,
    /// Largest wire size in the group; size of the XOR payload
    pub protection_length: u16,
    /// One bit per protected packet, MSB first, no gaps
    pub mask: u16,
    /// Byte-wise XOR of the protected packets' wire bytes
    pub xor_payload: Bytes,
}

impl FecPacket {
    /// Number of packets covered by this parity
    pub fn protected_count(&self) -> usize {
        self.mask.count_ones() as usize
    }

    /// Sequence numbers implied by the base and the mask, MSB first
    pub fn protected_sequences(&self) -> impl Iterator<Item = u16> + '_ {
        (0u16..16)
            .filter(|bit| self.mask & (0x8000 >> bit) != 0)
            .map(|bit| self.sn_base.wrapping_add(bit))
    }

    /// Serialize into the payload of a FEC media packet
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FEC_HEADER_SIZE + self.xor_payload.len());

        buf.put_u8(0); // reserved flags
        buf.put_u8(self.pt_recovery & 0x7F);
        buf.put_u16(self.sn_base);
        buf.put_u32(self.ts_recovery);
        buf.put_u16(self.len_recovery);
        buf.put_u16(self.protection_length);
        buf.put_u16(self.mask);
        buf.put_slice(&self.xor_payload);

        buf.freeze()
    }

    /// Parse a FEC packet out of a media packet payload
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < FEC_HEADER_SIZE {
            anyhow::bail!("payload too small for FEC header: {} bytes", data.len());
        }

        let protection_length = u16::from_be_bytes([data[10], data[11]]);
        if data.len() < FEC_HEADER_SIZE + protection_length as usize {
            anyhow::bail!(
                "FEC payload truncated: {} bytes, expected {}",
                data.len() - FEC_HEADER_SIZE,
                protection_length
            );
        }

        Ok(Self {
            pt_recovery: data[1] & 0x7F,
            sn_base: u16::from_be_bytes([data[2], data[3]]),
            ts_recovery: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            len_recovery: u16::from_be_bytes([data[8], data[9]]),
            protection_length,
            mask: u16::from_be_bytes([data[12], data[13]]),
            xor_payload: Bytes::copy_from_slice(
                &data[FEC_HEADER_SIZE..FEC_HEADER_SIZE + protection_length as usize],
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FecPacket {
        FecPacket {
            pt_recovery: 26,
            sn_base: 100,
            ts_recovery: 3968,
            len_recovery: 3,
            protection_length: 4,
            mask: 0xE000,
            xor_payload: Bytes::from_static(&[0x01, 0x02, 0x03, 0x04]),
        }
    }

    #[test]
    fn test_fec_round_trip() {
        let fec = sample();
        let decoded = FecPacket::decode(&fec.encode()).unwrap();
        assert_eq!(decoded, fec);
    }

    #[test]
    fn test_encode_layout() {
        let wire = sample().encode();

        assert_eq!(wire[0], 0x00);
        assert_eq!(wire[1], 26);
        assert_eq!(&wire[2..4], &[0x00, 0x64]); // sn_base 100
        assert_eq!(&wire[4..8], &[0x00, 0x00, 0x0F, 0x80]); // ts recovery 3968
        assert_eq!(&wire[8..10], &[0x00, 0x03]);
        assert_eq!(&wire[10..12], &[0x00, 0x04]);
        assert_eq!(&wire[12..14], &[0xE0, 0x00]);
        assert_eq!(&wire[14..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_protected_sequences() {
        let fec = sample();
        assert_eq!(fec.protected_count(), 3);
        let seqs: Vec<u16> = fec.protected_sequences().collect();
        assert_eq!(seqs, vec![100, 101, 102]);
    }

    #[test]
    fn test_sequences_wrap() {
        let fec = FecPacket {
            sn_base: u16::MAX,
            mask: 0xC000,
            ..sample()
        };
        let seqs: Vec<u16> = fec.protected_sequences().collect();
        assert_eq!(seqs, vec![u16::MAX, 0]);
    }

    #[test]
    fn test_decode_truncated() {
        assert!(FecPacket::decode(&[0; 13]).is_err());

        // Header claims 4 bytes of parity but only 2 are present
        let mut wire = sample().encode().to_vec();
        wire.truncate(16);
        assert!(FecPacket::decode(&wire).is_err());
    }
}
