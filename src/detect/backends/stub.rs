use anyhow::Result;

use crate::detect::backend::DetectionBackend;
use crate::detect::result::DetectionOutput;
use crate::frame::Frame;

/// Stub backend. Never detects anything; forwards the frame unchanged as the
/// annotated frame so the viewer stream still runs.
#[derive(Default)]
pub struct StubBackend {
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DetectionBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionOutput> {
        self.frames_seen += 1;
        Ok(DetectionOutput {
            detections: vec![],
            annotated: Some(frame.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameShape;

    #[test]
    fn stub_passes_frame_through() {
        let mut backend = StubBackend::new();
        let frame = Frame::blank(FrameShape::new(2, 2).unwrap());
        let out = backend.detect(&frame).unwrap();
        assert!(out.detections.is_empty());
        assert_eq!(out.annotated.unwrap(), frame);
    }
}
