//! Replay backend.
//!
//! Feeds detections recorded from a real tracker back into the pipeline. The
//! file is JSON lines: one line per frame, each line an array of
//! `{"track_id": .., "bbox": [x, y, w, h], "confidence": ..}` objects. Lines that
//! fail to parse count as frames with no detections; individual malformed
//! entries are dropped.

use anyhow::{Context, Result};
use std::path::Path;

use super::draw_boxes;
use crate::detect::backend::DetectionBackend;
use crate::detect::result::{sanitize, Detection, DetectionOutput, RawDetection};
use crate::frame::Frame;

pub struct ReplayBackend {
    frames: Vec<Vec<Detection>>,
    cursor: usize,
}

impl ReplayBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read detection replay {}", path.display()))?;
        Ok(Self::from_lines(&raw))
    }

    pub fn from_lines(raw: &str) -> Self {
        let frames = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| match serde_json::from_str::<Vec<RawDetection>>(line) {
                Ok(entries) => sanitize(entries),
                Err(e) => {
                    log::warn!("replay line {} ignored: {}", n + 1, e);
                    Vec::new()
                }
            })
            .collect();
        Self { frames, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectionBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    /// Detections for the next recorded frame; empty once the recording ends.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionOutput> {
        let detections = self.frames.get(self.cursor).cloned().unwrap_or_default();
        self.cursor = self.cursor.saturating_add(1);
        let annotated = Some(draw_boxes(frame, &detections));
        Ok(DetectionOutput {
            detections,
            annotated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameShape;

    #[test]
    fn replays_frames_in_order_then_runs_dry() {
        let mut backend = ReplayBackend::from_lines(
            r#"[{"track_id": 7, "bbox": [0.2, 0.5, 0.1, 0.1], "confidence": 0.5}]
not json
[{"track_id": 7, "bbox": [0.2, 0.5, 0.1, 0.1], "confidence": 0.5}, {"bbox": [0.5, 0.5, 0.1, 0.1]}]
"#,
        );
        assert_eq!(backend.len(), 3);

        let frame = Frame::blank(FrameShape::new(8, 8).unwrap());
        assert_eq!(backend.detect(&frame).unwrap().detections.len(), 1);
        assert!(backend.detect(&frame).unwrap().detections.is_empty());
        let third = backend.detect(&frame).unwrap();
        assert_eq!(third.detections.len(), 1);
        assert_eq!(third.detections[0].track_id, 7);
        assert!(backend.detect(&frame).unwrap().detections.is_empty());
    }
}
