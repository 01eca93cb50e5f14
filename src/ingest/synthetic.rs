use anyhow::Result;
use std::time::Instant;

use super::{frame_interval, FrameSource, SourceConfig, SourceStats};
use crate::frame::{Frame, CHANNELS};

/// Side of the moving square, as a fraction of the frame height.
const TARGET_SCALE: f64 = 0.2;

/// `stub://` source: dark gradient background with a bright square that drifts
/// across the frame, so downstream stages have something moving to look at.
pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    fn render(&self) -> Vec<u8> {
        let width = self.config.shape.width as usize;
        let height = self.config.shape.height as usize;
        let side = ((height as f64 * TARGET_SCALE) as usize).max(1);
        let left = (self.frame_count as usize * 2) % width;
        let top = (height.saturating_sub(side)) / 2;

        let mut pixels = vec![0u8; self.config.shape.byte_len()];
        for (row, line) in pixels.chunks_exact_mut(width * CHANNELS).enumerate() {
            for (col, px) in line.chunks_exact_mut(CHANNELS).enumerate() {
                let inside = (top..top + side).contains(&row)
                    && (col + width - left) % width < side;
                if inside {
                    px.copy_from_slice(&[40, 200, 255]);
                } else {
                    let shade = ((row + col) * 64 / (width + height)) as u8;
                    px.copy_from_slice(&[shade, shade, shade]);
                }
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    /// Synthetic sources are always "connected".
    fn connect(&mut self) -> Result<()> {
        log::info!("frame source: connected to {} (synthetic)", self.config.url);
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
        let frame = Frame::new(self.render(), self.config.shape)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn is_healthy(&self) -> bool {
        true
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

    fn source(fps: u32) -> SyntheticSource {
        SyntheticSource::new(SourceConfig {
            url: "stub://test".into(),
            target_fps: fps,
            shape: FrameShape::new(64, 48).unwrap(),
        })
    }

    #[test]
    fn produces_frames_of_configured_shape() -> Result<()> {
        let mut source = source(10);
        source.connect()?;
        let frame = source.next_frame()?.expect("first frame is due immediately");
        assert_eq!((frame.width(), frame.height()), (64, 48));
        Ok(())
    }

    #[test]
    fn frames_are_paced() -> Result<()> {
        let mut source = source(1);
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 1);
        Ok(())
    }

    #[test]
    fn pattern_moves_between_frames() -> Result<()> {
        let mut source = source(1000);
        let first = source.next_frame()?.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = source.next_frame()?.unwrap();
        assert_ne!(first.as_bytes(), second.as_bytes());
        Ok(())
    }
}
