//! Media input seam
//!
//! The sender pulls one video frame or audio chunk at a time; `Ok(None)`
//! marks end of stream. The file-backed implementation reads the plain
//! MJPEG interchange layout (each frame prefixed by its length as five
//! ASCII digits) and raw PCM in fixed-size chunks.

use anyhow::{Context, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Bytes of PCM handed out per audio chunk: 40 ms of 44.1 kHz 16-bit mono
pub const AUDIO_CHUNK_SIZE: usize = 3528;

/// Source of outgoing media, one unit per call.
pub trait MediaSource: Send {
    /// Next MJPEG frame, or `None` at end of stream
    fn next_video_frame(&mut self) -> Result<Option<Bytes>>;

    /// Next PCM chunk, or `None` at end of stream
    fn next_audio_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// File-backed source: a length-prefixed MJPEG file and an optional raw
/// PCM file read side by side.
pub struct FileSource {
    video: File,
    audio: Option<File>,
    frames_read: u64,
}

impl FileSource {
    pub fn open(video_path: &Path, audio_path: Option<&Path>) -> Result<Self> {
        let video = File::open(video_path)
            .with_context(|| format!("opening video file {}", video_path.display()))?;
        let audio = audio_path
            .map(|path| {
                File::open(path).with_context(|| format!("opening audio file {}", path.display()))
            })
            .transpose()?;

        Ok(Self {
            video,
            audio,
            frames_read: 0,
        })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl MediaSource for FileSource {
    fn next_video_frame(&mut self) -> Result<Option<Bytes>> {
        // Five ASCII digits carry the frame length
        let mut prefix = [0u8; 5];
        match self.video.read_exact(&mut prefix) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e).context("reading frame length prefix"),
        }

        let length: usize = std::str::from_utf8(&prefix)
            .ok()
            .and_then(|s| s.parse().ok())
            .context("malformed frame length prefix")?;

        let mut frame = vec![0u8; length];
        self.video
            .read_exact(&mut frame)
            .context("reading frame body")?;

        self.frames_read += 1;
        Ok(Some(Bytes::from(frame)))
    }

    fn next_audio_chunk(&mut self) -> Result<Option<Bytes>> {
        let Some(audio) = &mut self.audio else {
            return Ok(None);
        };

        let mut chunk = vec![0u8; AUDIO_CHUNK_SIZE];
        let mut filled = 0;
        while filled < chunk.len() {
            match audio.read(&mut chunk[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("reading audio chunk"),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        chunk.truncate(filled);
        Ok(Some(Bytes::from(chunk)))
    }
}
