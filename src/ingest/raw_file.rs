use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::Instant;

use super::{frame_interval, FrameSource, SourceConfig, SourceStats};
use crate::frame::Frame;

/// Local dump of back-to-back BGR frames of the configured shape. Plays in a
/// loop; a trailing partial frame is ignored.
pub struct RawFileSource {
    path: PathBuf,
    config: SourceConfig,
    file: Option<File>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

impl RawFileSource {
    pub fn new(path: impl Into<PathBuf>, config: SourceConfig) -> Self {
        Self {
            path: path.into(),
            config,
            file: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| anyhow!("raw file source not connected; call connect() first"))?;
        let mut pixels = vec![0u8; self.config.shape.byte_len()];
        match file.read_exact(&mut pixels) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                file.seek(SeekFrom::Start(0))?;
                file.read_exact(&mut pixels).with_context(|| {
                    format!(
                        "{} holds less than one {}x{} frame",
                        self.path.display(),
                        self.config.shape.width,
                        self.config.shape.height
                    )
                })?;
            }
            Err(e) => return Err(e.into()),
        }
        Frame::new(pixels, self.config.shape)
    }
}

impl FrameSource for RawFileSource {
    fn connect(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .with_context(|| format!("open raw frame file {}", self.path.display()))?;
        self.file = Some(file);
        log::info!("frame source: reading {}", self.path.display());
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let interval = frame_interval(self.config.target_fps);
        if self
            .last_frame_at
            .is_some_and(|last| last.elapsed() < interval)
        {
            return Ok(None);
        }
        self.last_frame_at = Some(Instant::now());
        match self.read_frame() {
            Ok(frame) => {
                self.frame_count += 1;
                self.last_error = None;
                Ok(Some(frame))
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.file.is_some() && self.last_error.is_none()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameShape;
    use std::io::Write;

    fn config(path: &str) -> SourceConfig {
        SourceConfig {
            url: format!("file://{}", path),
            target_fps: 1000,
            shape: FrameShape::new(2, 1).unwrap(),
        }
    }

    #[test]
    fn loops_over_whole_frames() -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new()?;
        // Two 2x1 frames plus a trailing partial one.
        tmp.write_all(&[1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 9])?;
        let path = tmp.path().to_string_lossy().to_string();

        let mut source = RawFileSource::new(&path, config(&path));
        source.connect()?;
        let mut seen = Vec::new();
        while seen.len() < 3 {
            if let Some(frame) = source.next_frame()? {
                seen.push(frame.as_bytes()[0]);
            }
        }
        assert_eq!(seen, vec![1, 2, 1]);
        assert!(source.is_healthy());
        Ok(())
    }

    #[test]
    fn missing_file_fails_to_connect() {
        let mut source = RawFileSource::new("/nonexistent/frames.bgr", config("x"));
        assert!(source.connect().is_err());
        assert!(!source.is_healthy());
    }
}
