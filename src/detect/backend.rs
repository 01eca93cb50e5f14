use anyhow::Result;

use crate::detect::result::DetectionOutput;
use crate::frame::Frame;

/// Detector/tracker backend trait.
///
/// Implementations receive each raw frame once and return the tracked boxes
/// for it. Track IDs must stay stable across consecutive frames for as long as
/// the underlying tracker keeps the target.
pub trait DetectionBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection and tracking on one frame.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionOutput>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
