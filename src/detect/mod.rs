//! Detection boundary.
//!
//! The object detector and multi-object tracker run outside this crate. What
//! crosses into the tracker is one `DetectionOutput` per processed frame: a list
//! of tracked boxes and, optionally, an annotated copy of the frame for the
//! viewer stream.

mod backend;
pub mod backends;
mod result;

pub use backend::DetectionBackend;
pub use backends::{backend_from_spec, ReplayBackend, StubBackend};
pub use result::{BoundingBox, Detection, DetectionOutput, RawDetection};
