//! Runtime configuration
//!
//! Defaults mirror the classic deployment: control on TCP 1025, data on
//! UDP 25000, 35 ms between streamed video frames, 40 ms playback periods,
//! protection groups of five. Both structs deserialize from an optional
//! JSON file and are then overridden by command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default TCP port for the control channel
pub const DEFAULT_CONTROL_PORT: u16 = 1025;

/// Default UDP port the receiver listens on for media datagrams
pub const DEFAULT_DATA_PORT: u16 = 25000;

/// Default protection group size (0 disables FEC)
pub const DEFAULT_FEC_GROUP_SIZE: usize = 5;

/// Milliseconds between streamed video frames (sender side)
pub const STREAMING_FRAME_PERIOD_MS: u64 = 35;

/// Milliseconds between played-back video frames (receiver side)
pub const PLAYBACK_FRAME_PERIOD_MS: u64 = 40;

/// Milliseconds between audio chunks, both directions
pub const AUDIO_FRAME_PERIOD_MS: u64 = 40;

/// Bound on buffered packets per playback buffer
pub const PLAYBACK_BUFFER_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Length-prefixed MJPEG file to stream
    pub media_path: PathBuf,
    /// Optional raw PCM file streamed alongside the video
    pub audio_path: Option<PathBuf>,
    pub control_port: u16,
    /// Protection group size, clamped to 2..=16; 0 disables FEC
    pub fec_group_size: usize,
    /// Percentage of video packets dropped before the socket write
    pub simulate_loss: u8,
    pub video_period_ms: u64,
    pub audio_period_ms: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            media_path: PathBuf::new(),
            audio_path: None,
            control_port: DEFAULT_CONTROL_PORT,
            fec_group_size: DEFAULT_FEC_GROUP_SIZE,
            simulate_loss: 0,
            video_period_ms: STREAMING_FRAME_PERIOD_MS,
            audio_period_ms: AUDIO_FRAME_PERIOD_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Hostname or IP of the sender
    pub server_host: String,
    pub control_port: u16,
    /// Local UDP port advertised during SETUP
    pub data_port: u16,
    /// Resource name carried on the request line
    pub resource: String,
    /// Where played media is written; `None` discards it
    pub output_dir: Option<PathBuf>,
    pub fec_group_size: usize,
    pub video_period_ms: u64,
    pub audio_period_ms: u64,
    pub buffer_capacity: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            data_port: DEFAULT_DATA_PORT,
            resource: "movie.mjpeg".to_string(),
            output_dir: None,
            fec_group_size: DEFAULT_FEC_GROUP_SIZE,
            video_period_ms: PLAYBACK_FRAME_PERIOD_MS,
            audio_period_ms: AUDIO_FRAME_PERIOD_MS,
            buffer_capacity: PLAYBACK_BUFFER_CAPACITY,
        }
    }
}

/// Load a config struct from a JSON file.
pub fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ReceiverConfig::default();
        assert_eq!(config.control_port, 1025);
        assert_eq!(config.data_port, 25000);
        assert_eq!(config.fec_group_size, 5);
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "control_port": 9000, "simulate_loss": 10 }}"#).unwrap();
        file.flush().unwrap();

        let config: SenderConfig = load(file.path()).unwrap();
        assert_eq!(config.control_port, 9000);
        assert_eq!(config.simulate_loss, 10);
        // Untouched fields keep their defaults
        assert_eq!(config.fec_group_size, DEFAULT_FEC_GROUP_SIZE);
        assert_eq!(config.video_period_ms, STREAMING_FRAME_PERIOD_MS);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        file.flush().unwrap();

        assert!(load::<SenderConfig>(file.path()).is_err());
    }
}
