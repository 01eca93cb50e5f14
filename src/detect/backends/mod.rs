use anyhow::{anyhow, Result};

use crate::detect::backend::DetectionBackend;
use crate::detect::result::Detection;
use crate::frame::{Frame, CHANNELS};

pub mod replay;
pub mod stub;

pub use replay::ReplayBackend;
pub use stub::StubBackend;

/// Build a backend from a config string: `stub` or `replay:<path>`.
pub fn backend_from_spec(spec: &str) -> Result<Box<dyn DetectionBackend>> {
    match spec.split_once(':') {
        None if spec == "stub" => Ok(Box::new(StubBackend::new())),
        Some(("replay", path)) if !path.is_empty() => Ok(Box::new(ReplayBackend::open(path)?)),
        _ => Err(anyhow!(
            "unknown detection backend '{}'; expected 'stub' or 'replay:<path>'",
            spec
        )),
    }
}

const BOX_COLOR_BGR: [u8; 3] = [0, 255, 0];

/// Copy of `frame` with a one-pixel outline around every detection.
pub(crate) fn draw_boxes(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut out = frame.clone();
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    let pixels = out.as_bytes_mut();
    let mut paint = |px: usize, py: usize| {
        let offset = (py * width + px) * CHANNELS;
        pixels[offset..offset + CHANNELS].copy_from_slice(&BOX_COLOR_BGR);
    };

    for det in detections {
        let to_px = |v: f64, extent: usize| ((v * extent as f64) as usize).min(extent - 1);
        let left = to_px(det.bbox.x - det.bbox.w / 2.0, width);
        let right = to_px(det.bbox.x + det.bbox.w / 2.0, width);
        let top = to_px(det.bbox.y - det.bbox.h / 2.0, height);
        let bottom = to_px(det.bbox.y + det.bbox.h / 2.0, height);
        for px in left..=right {
            paint(px, top);
            paint(px, bottom);
        }
        for py in top..=bottom {
            paint(left, py);
            paint(right, py);
        }
    }
    out
}
