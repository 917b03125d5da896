//! Receiver-side single-erasure recovery

use anyhow::Result;
use bytes::Bytes;

use crate::packet::{HEADER_SIZE, FecPacket, MediaPacket};

/// What a parity packet turned out to be good for.
#[derive(Debug)]
pub enum RecoveryOutcome {
    /// Every protected packet arrived; the parity is redundant
    Intact,
    /// Exactly one packet was missing and has been rebuilt
    Recovered(MediaPacket),
    /// Two or more packets are missing; genuine loss
    Unrecoverable { missing: usize },
}

/// Classify a protection group and rebuild the missing packet when there
/// is exactly one erasure.
///
/// `present` holds the protected packets that were found in the protection
/// window; `missing` the protected sequence numbers that were not. XOR
/// parity inverts a single erasure only, so anything beyond that is
/// reported as unrecoverable rather than guessed at.
pub fn recover(
    fec: &FecPacket,
    present: &[MediaPacket],
    missing: &[u16],
) -> Result<RecoveryOutcome> {
    match missing {
        [] => Ok(RecoveryOutcome::Intact),
        [seq] => Ok(RecoveryOutcome::Recovered(recover_missing(
            fec, present, *seq,
        )?)),
        _ => Ok(RecoveryOutcome::Unrecoverable {
            missing: missing.len(),
        }),
    }
}

/// Rebuild the packet with sequence number `missing_seq` from the parity
/// and the rest of its group.
///
/// XORing the parity payload with every present packet's wire bytes
/// (zero-padded to the protection length) leaves exactly the erased
/// packet's wire bytes; the header fields come back through the same
/// cancellation in the recovery fields.
pub fn recover_missing(
    fec: &FecPacket,
    present: &[MediaPacket],
    missing_seq: u16,
) -> Result<MediaPacket> {
    let protection_length = fec.protection_length as usize;
    if fec.xor_payload.len() < protection_length {
        anyhow::bail!(
            "parity payload shorter than protection length: {} < {}",
            fec.xor_payload.len(),
            protection_length
        );
    }

    let mut wire = fec.xor_payload.to_vec();
    let mut payload_type = fec.pt_recovery;
    let mut timestamp = fec.ts_recovery;
    let mut payload_len = fec.len_recovery;

    for packet in present {
        payload_type ^= packet.payload_type;
        timestamp ^= packet.timestamp;
        payload_len ^= packet.payload.len() as u16;

        for (dst, src) in wire.iter_mut().zip(packet.encode().iter()) {
            *dst ^= src;
        }
    }

    let payload_len = payload_len as usize;
    if HEADER_SIZE + payload_len > protection_length {
        anyhow::bail!(
            "recovered payload length {} exceeds protection length {}",
            payload_len,
            protection_length
        );
    }

    Ok(MediaPacket::new(
        payload_type,
        missing_seq,
        timestamp,
        Bytes::copy_from_slice(&wire[HEADER_SIZE..HEADER_SIZE + payload_len]),
    ))
}
