//! Receiver-side pipeline
//!
//! A receive stage owns the datagram socket and routes decoded packets by
//! payload type; a FEC stage drains the parity queue and rebuilds single
//! erasures into the video buffer; one playback stage per media type
//! drains its buffer at the stream's fixed cadence.

pub mod coordinator;
pub mod fec_stage;
pub mod playback_stage;
pub mod receive_stage;

pub use coordinator::ReceiverCoordinator;
pub use fec_stage::FecStage;
pub use playback_stage::PlaybackStage;
pub use receive_stage::ReceiveStage;
