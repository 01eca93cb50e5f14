use crate::detect::{BoundingBox, Detection};

/// Detections at or below this confidence never count toward a lock.
pub const CONFIDENCE_THRESHOLD: f32 = 0.4;

/// Confident hits a track needs before it can be locked.
pub const LOCK_MIN_HITS: u32 = 3;

/// Per-track confident-hit counters.
///
/// Entries keep first-seen order so that lock selection breaks ties in favour
/// of the track that appeared first.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    hits: Vec<(i64, u32)>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame of detections in: purge tracks that are gone, then count
    /// a hit for every confident detection.
    pub fn update(&mut self, detections: &[Detection]) {
        self.hits
            .retain(|(id, _)| detections.iter().any(|d| d.track_id == *id));

        for det in detections.iter().filter(|d| d.confidence > CONFIDENCE_THRESHOLD) {
            match self.hits.iter_mut().find(|(id, _)| *id == det.track_id) {
                Some((_, count)) => *count = count.saturating_add(1),
                None => self.hits.push((det.track_id, 1)),
            }
        }
    }

    pub fn hits(&self, track_id: i64) -> u32 {
        self.hits
            .iter()
            .find(|(id, _)| *id == track_id)
            .map_or(0, |(_, count)| *count)
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Track with the most hits among those with at least `LOCK_MIN_HITS`.
    pub fn best_candidate(&self) -> Option<i64> {
        let mut best: Option<(i64, u32)> = None;
        for &(id, count) in &self.hits {
            if count < LOCK_MIN_HITS {
                continue;
            }
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((id, count));
            }
        }
        best.map(|(id, _)| id)
    }
}

/// The single target the camera is steering toward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LockState {
    pub track_id: i64,
    pub last_bbox: BoundingBox,
}
