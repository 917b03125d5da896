//! External media collaborators
//!
//! The transport core touches media only through these two seams: a
//! [`MediaSource`] the sender pulls frames and chunks from, and a
//! [`PlaybackSink`] the receiver delivers into. Container parsing,
//! graphical display and audio devices all live behind them.

pub mod sink;
pub mod source;

pub use sink::{FileSink, NullSink, PlaybackSink};
pub use source::{FileSource, MediaSource};

/// Kind of media data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}
