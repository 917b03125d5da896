//! Media packet codec
//!
//! Fixed 12-byte header in the RTP layout (RFC 3550), big-endian fields:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Padding, extension, CSRC count, marker and SSRC are always zero in this
//! system (single source, no mixing). The payload length is not carried in
//! the header; it is whatever remains of the datagram.

use anyhow::Result;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the fixed media packet header in bytes
pub const HEADER_SIZE: usize = 12;

/// Wire protocol version
pub const RTP_VERSION: u8 = 2;

/// Payload type for raw PCM audio
pub const AUDIO_TYPE: u8 = 0;

/// Payload type for MJPEG video frames
pub const MJPEG_TYPE: u8 = 26;

/// Payload type marking a FEC packet
pub const FEC_TYPE: u8 = 116;

/// A single unit of media on the wire: 12-byte header plus payload.
///
/// Immutable after construction; ordered by sequence number when buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPacket {
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub payload: Bytes,
}

impl MediaPacket {
    pub fn new(payload_type: u8, sequence_number: u16, timestamp: u32, payload: Bytes) -> Self {
        Self {
            payload_type: payload_type & 0x7F,
            sequence_number,
            timestamp,
            payload,
        }
    }

    /// Total size on the wire (header + payload)
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    pub fn is_audio(&self) -> bool {
        self.payload_type == AUDIO_TYPE
    }

    pub fn is_video(&self) -> bool {
        self.payload_type == MJPEG_TYPE
    }

    pub fn is_fec(&self) -> bool {
        self.payload_type == FEC_TYPE
    }

    /// Serialize the packet into wire format
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());

        // Byte 0: V(2) | P(1) | X(1) | CC(4), all but the version zero
        buf.put_u8(RTP_VERSION << 6);
        // Byte 1: M(1) | PT(7), marker unused
        buf.put_u8(self.payload_type & 0x7F);
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        // SSRC, always zero (single source)
        buf.put_u32(0);
        buf.put_slice(&self.payload);

        buf.freeze()
    }

    /// Parse a packet from a received datagram.
    ///
    /// Fails only on truncation; version, marker and reserved bits are
    /// trusted as received.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            anyhow::bail!("datagram too small for media header: {} bytes", data.len());
        }

        Ok(Self {
            payload_type: data[1] & 0x7F,
            sequence_number: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            payload: Bytes::copy_from_slice(&data[HEADER_SIZE..]),
        })
    }
}

/// Check whether sequence number `a` comes before `b` (wraparound-aware)
///
/// `a` precedes `b` iff the forward distance from `a` to `b` is in
/// `1..0x8000`, so ordering stays correct across the 16-bit rollover.
pub fn seq_precedes(a: u16, b: u16) -> bool {
    let diff = b.wrapping_sub(a);
    diff > 0 && diff < 0x8000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        for (pt, seq, ts) in [
            (AUDIO_TYPE, 0u16, 0u32),
            (MJPEG_TYPE, 1, 1000),
            (FEC_TYPE, u16::MAX, u32::MAX),
            (127, 0x8000, 0xDEAD_BEEF),
        ] {
            let packet = MediaPacket::new(pt, seq, ts, Bytes::from_static(b"payload"));
            let decoded = MediaPacket::decode(&packet.encode()).unwrap();
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn test_encode_layout() {
        let packet = MediaPacket::new(MJPEG_TYPE, 0x0102, 0x0304_0506, Bytes::from_static(b"\xAA"));
        let wire = packet.encode();

        assert_eq!(wire.len(), 13);
        assert_eq!(wire[0], 0x80); // V=2, everything else zero
        assert_eq!(wire[1], MJPEG_TYPE);
        assert_eq!(&wire[2..4], &[0x01, 0x02]);
        assert_eq!(&wire[4..8], &[0x03, 0x04, 0x05, 0x06]);
        assert_eq!(&wire[8..12], &[0, 0, 0, 0]); // SSRC
        assert_eq!(wire[12], 0xAA);
    }

    #[test]
    fn test_decode_truncated() {
        assert!(MediaPacket::decode(&[]).is_err());
        assert!(MediaPacket::decode(&[0x80; 11]).is_err());
        // Exactly a header is a valid, empty-payload packet
        let packet = MediaPacket::decode(&[0x80, 26, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert!(packet.payload.is_empty());
        assert_eq!(packet.sequence_number, 1);
    }

    #[test]
    fn test_seq_ordering() {
        assert!(seq_precedes(1, 2));
        assert!(!seq_precedes(2, 1));
        assert!(!seq_precedes(5, 5));
        // Across the rollover boundary
        assert!(seq_precedes(u16::MAX, 0));
        assert!(seq_precedes(0xFFF0, 0x0010));
        assert!(!seq_precedes(0x0010, 0xFFF0));
    }
}
