//! Receiver-side packet buffers
//!
//! Three containers sit between the datagram intake and playback:
//! - [`PlaybackBuffer`]: per-media-type sequence-ordered buffer drained by
//!   the fixed-rate playback scheduler
//! - [`ProtectionWindow`]: bounded ring of recent video packets scanned by
//!   the FEC stage
//! - [`StreamStats`]: shared counters read by the observer surface

pub mod playback;
pub mod stats;
pub mod window;

pub use playback::PlaybackBuffer;
pub use stats::{StatsSnapshot, StreamStats};
pub use window::ProtectionWindow;
