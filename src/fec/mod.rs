//! XOR forward error correction
//!
//! Single-parity erasure coding over protection groups of consecutive
//! media packets. The sender accumulates outgoing packets and emits one
//! parity packet per completed group; the receiver rebuilds at most one
//! erased packet per group from the parity and the packets it did get.
//! Two or more erasures in a group are unrecoverable by construction.

pub mod assembler;
pub mod recovery;

pub use assembler::{GroupAssembler, build_parity};
pub use recovery::{RecoveryOutcome, recover, recover_missing};

/// Smallest allowed protection group
pub const MIN_GROUP_SIZE: usize = 2;

/// Largest allowed protection group (bounded by the 16-bit mask)
pub const MAX_GROUP_SIZE: usize = 16;

/// How many group-sizes worth of packets the receiver retains for lookups
pub const WINDOW_GROUPS: usize = 3;
