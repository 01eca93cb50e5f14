//! Ingestion: camera frames into the raw frame channel, and coordinate fixes
//! into `SharedState`.
//!
//! Frame sources:
//! - Synthetic source (`stub://...`) producing a moving test pattern
//! - Raw BGR dump files (`file://...`), looped
//!
//! Real video capture and decoding happen outside this crate; anything that can
//! hand over H x W x 3 BGR bytes can implement `FrameSource`.
//!
//! Coordinate fixes arrive over a WebSocket listener (`CoordinateIngest`).

pub mod coords;
pub mod raw_file;
pub mod synthetic;

pub use coords::{parse_fix, CoordinateIngest, INGEST_BACKOFF, INGEST_READ_TIMEOUT};
pub use raw_file::RawFileSource;
pub use synthetic::SyntheticSource;

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::frame::{Frame, FrameShape, FrameWriter, FRAME_POLL_INTERVAL_MS};
use crate::shared::SharedState;

/// Configuration for a frame source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://<name>` or `file://<path>`.
    pub url: String,
    /// Frames per second the source is paced to.
    pub target_fps: u32,
    pub shape: FrameShape,
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

pub trait FrameSource: Send {
    fn connect(&mut self) -> Result<()>;

    /// Next frame if one is due. `Ok(None)` means poll again later.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

pub fn source_from_config(config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    if config.target_fps == 0 {
        return Err(anyhow!("target_fps must be > 0"));
    }
    if config.url.starts_with("stub://") {
        Ok(Box::new(SyntheticSource::new(config)))
    } else if let Some(path) = config.url.strip_prefix("file://") {
        let path = path.to_string();
        Ok(Box::new(RawFileSource::new(path, config)))
    } else {
        Err(anyhow!(
            "unsupported frame source '{}'; expected stub:// or file://",
            config.url
        ))
    }
}

pub(crate) fn frame_interval(target_fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / target_fps.max(1) as f64)
}

/// Publish frames from `source` into the raw channel until stop is requested.
pub fn run_capture_worker(
    mut source: Box<dyn FrameSource>,
    mut writer: FrameWriter,
    shared: Arc<SharedState>,
) {
    log::info!("capture worker started ({})", source.stats().url);
    let poll = Duration::from_millis(FRAME_POLL_INTERVAL_MS);
    let mut last_health_log = std::time::Instant::now();
    while !shared.is_stop_requested() {
        match source.next_frame() {
            Ok(Some(frame)) => {
                if let Err(e) = writer.write_frame(&frame) {
                    log::warn!("dropping captured frame: {:#}", e);
                }
            }
            Ok(None) => thread::sleep(poll),
            Err(e) => {
                log::warn!("capture failed: {:#}", e);
                thread::sleep(Duration::from_millis(250));
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = source.stats();
            log::debug!(
                "capture health={} frames={} url={}",
                source.is_healthy(),
                stats.frames_captured,
                stats.url
            );
            last_health_log = std::time::Instant::now();
        }
    }
    log::info!(
        "capture worker stopped after {} frames",
        source.stats().frames_captured
    );
}
