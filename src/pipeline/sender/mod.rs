//! Sender-side pipeline
//!
//! One stage per media type, each pacing its own reads from the media
//! source and pushing datagrams toward the receiver. The video stage also
//! feeds the FEC assembler and emits a parity datagram per completed
//! protection group.

pub mod audio_stage;
pub mod coordinator;
pub mod video_stage;

pub use audio_stage::AudioSendStage;
pub use coordinator::SenderCoordinator;
pub use video_stage::VideoSendStage;

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock media timestamp, truncated to the 32-bit wire field.
pub(crate) fn media_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u32
}
