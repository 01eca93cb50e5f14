use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Axis-aligned box in normalized image coordinates. `x`/`y` is the box
/// center, `w`/`h` its extent, all within [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// One tracked object in one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub track_id: i64,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Detection as delivered by an external tracker, before validation.
///
/// Every field is optional because upstream trackers omit the track id while a
/// track is still tentative, and replay files can be hand-edited.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub track_id: Option<i64>,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl RawDetection {
    /// Validated detection, or `None` if any field is missing or out of range.
    pub fn into_detection(self) -> Option<Detection> {
        let track_id = self.track_id?;
        let confidence = self.confidence.filter(|c| c.is_finite() && (0.0..=1.0).contains(c))?;
        let [x, y, w, h] = <[f64; 4]>::try_from(self.bbox?).ok()?;
        if ![x, y, w, h]
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
        {
            return None;
        }
        Some(Detection {
            track_id,
            bbox: BoundingBox { x, y, w, h },
            confidence,
        })
    }
}

/// Validate a batch, dropping malformed entries.
pub(crate) fn sanitize(raw: Vec<RawDetection>) -> Vec<Detection> {
    let total = raw.len();
    let detections: Vec<Detection> = raw
        .into_iter()
        .filter_map(RawDetection::into_detection)
        .collect();
    if detections.len() < total {
        log::debug!(
            "dropped {} malformed detection(s)",
            total - detections.len()
        );
    }
    detections
}

/// Everything a backend produces for one frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionOutput {
    pub detections: Vec<Detection>,
    /// Frame with boxes drawn, for the viewer stream.
    pub annotated: Option<Frame>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(track_id: Option<i64>, bbox: Option<Vec<f64>>, confidence: Option<f32>) -> RawDetection {
        RawDetection {
            track_id,
            bbox,
            confidence,
        }
    }

    #[test]
    fn complete_detection_is_accepted() {
        let det = raw(Some(7), Some(vec![0.2, 0.5, 0.1, 0.1]), Some(0.5))
            .into_detection()
            .unwrap();
        assert_eq!(det.track_id, 7);
        assert_eq!(det.bbox.center(), (0.2, 0.5));
    }

    #[test]
    fn missing_or_bad_fields_are_dropped() {
        let cases = vec![
            raw(None, Some(vec![0.5, 0.5, 0.1, 0.1]), Some(0.9)),
            raw(Some(1), None, Some(0.9)),
            raw(Some(1), Some(vec![0.5, 0.5, 0.1, 0.1]), None),
            raw(Some(1), Some(vec![0.5, 0.5, 0.1]), Some(0.9)),
            raw(Some(1), Some(vec![f64::NAN, 0.5, 0.1, 0.1]), Some(0.9)),
            raw(Some(1), Some(vec![1.5, 0.5, 0.1, 0.1]), Some(0.9)),
            raw(Some(1), Some(vec![0.5, 0.5, 0.1, 0.1]), Some(f32::INFINITY)),
        ];
        assert!(sanitize(cases).is_empty());
    }
}
