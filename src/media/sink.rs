//! Playback output seam
//!
//! The playback scheduler delivers media here at its fixed cadence. The
//! file sink writes frames out as numbered JPEG files and appends audio to
//! one raw PCM file; the null sink discards everything and is the default
//! when no output directory is given.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

/// Destination for played-out media.
pub trait PlaybackSink: Send {
    fn display_frame(&mut self, frame: &[u8]) -> Result<()>;

    fn write_audio(&mut self, chunk: &[u8]) -> Result<()>;
}

/// Discards everything; playback still paces and counts normally.
#[derive(Default)]
pub struct NullSink;

impl PlaybackSink for NullSink {
    fn display_frame(&mut self, _frame: &[u8]) -> Result<()> {
        Ok(())
    }

    fn write_audio(&mut self, _chunk: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Writes frames and audio under an output directory.
pub struct FileSink {
    dir: PathBuf,
    frame_index: u64,
    audio: Option<File>,
}

impl FileSink {
    pub fn create(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            frame_index: 0,
            audio: None,
        })
    }
}

impl PlaybackSink for FileSink {
    fn display_frame(&mut self, frame: &[u8]) -> Result<()> {
        let path = self.dir.join(format!("frame-{:06}.jpg", self.frame_index));
        fs::write(&path, frame).with_context(|| format!("writing {}", path.display()))?;
        self.frame_index += 1;
        Ok(())
    }

    fn write_audio(&mut self, chunk: &[u8]) -> Result<()> {
        let file = match self.audio.take() {
            Some(file) => file,
            None => {
                let path = self.dir.join("audio.pcm");
                File::create(&path).with_context(|| format!("creating {}", path.display()))?
            }
        };
        self.audio
            .insert(file)
            .write_all(chunk)
            .context("appending audio")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_sink_numbers_frames() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::create(dir.path().to_path_buf()).unwrap();

        sink.display_frame(b"one").unwrap();
        sink.display_frame(b"two").unwrap();

        assert_eq!(
            fs::read(dir.path().join("frame-000000.jpg")).unwrap(),
            b"one"
        );
        assert_eq!(
            fs::read(dir.path().join("frame-000001.jpg")).unwrap(),
            b"two"
        );
    }

    #[test]
    fn test_file_sink_appends_audio() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::create(dir.path().to_path_buf()).unwrap();

        sink.write_audio(b"abc").unwrap();
        sink.write_audio(b"def").unwrap();

        assert_eq!(fs::read(dir.path().join("audio.pcm")).unwrap(), b"abcdef");
    }
}
