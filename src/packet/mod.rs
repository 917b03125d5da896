//! Wire formats for the datagram channel
//!
//! Two packet layouts travel over UDP: the fixed 12-byte media header
//! followed by an opaque payload, and the FEC header carried *as* the
//! payload of a media packet whose payload type marks it as FEC.

pub mod fec;
pub mod rtp;

pub use fec::{FEC_HEADER_SIZE, FecPacket};
pub use rtp::{
    AUDIO_TYPE, FEC_TYPE, HEADER_SIZE, MJPEG_TYPE, MediaPacket, seq_precedes,
};
