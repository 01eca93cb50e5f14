//! Shared state between workers.
//!
//! `SharedState` holds the small scalars that more than one worker touches: the
//! cooperative stop flag, the latest coordinate fix, the smoothed GPS position
//! and the smoothed heading. It is created once by the orchestrator and handed
//! to every worker behind an `Arc`. Each scalar sits behind its own mutex and is
//! read by polling; nothing here ever waits on a condition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A fix is "fresh" while younger than this.
pub const FIX_FRESH_FOR: Duration = Duration::from_secs(2);

/// Latest externally supplied target position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateFix {
    pub lon: f64,
    pub lat: f64,
    pub received_at: Instant,
    pub consumed: bool,
}

impl CoordinateFix {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.age(now) < FIX_FRESH_FOR
    }
}

/// Smoothed lon/lat of the camera mount.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPosition {
    pub lon: f64,
    pub lat: f64,
}

/// Smoothed compass reading plus the pan-frame offset derived from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadingReading {
    pub filtered_deg: f64,
    /// Rotation from a GPS bearing into the camera pan frame, in [0, 360).
    pub angle_offset_deg: f64,
}

pub struct SharedState {
    /// Cooperative stop flag. Every worker loop checks it once per iteration.
    stop_requested: AtomicBool,
    coordinate_fix: Mutex<Option<CoordinateFix>>,
    position: Mutex<Option<GeoPosition>>,
    heading: Mutex<Option<HeadingReading>>,
}

// Values behind these mutexes are plain `Copy` scalars, so a panic while one was
// held cannot leave it half-written.
fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Ask every worker to finish its current iteration and exit.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Replace the coordinate slot with a new, unconsumed fix.
    pub fn record_fix(&self, lon: f64, lat: f64, received_at: Instant) {
        *guard(&self.coordinate_fix) = Some(CoordinateFix {
            lon,
            lat,
            received_at,
            consumed: false,
        });
    }

    pub fn latest_fix(&self) -> Option<CoordinateFix> {
        *guard(&self.coordinate_fix)
    }

    /// Atomically hand out the current fix if it is fresh and unconsumed, marking
    /// it consumed so the same fix can never be acted on twice.
    pub fn consume_fresh_fix(&self, now: Instant) -> Option<CoordinateFix> {
        let mut slot = guard(&self.coordinate_fix);
        let fix = slot.as_mut()?;
        if fix.consumed || !fix.is_fresh(now) {
            return None;
        }
        fix.consumed = true;
        Some(*fix)
    }

    pub fn set_position(&self, position: GeoPosition) {
        *guard(&self.position) = Some(position);
    }

    pub fn position(&self) -> Option<GeoPosition> {
        *guard(&self.position)
    }

    pub fn set_heading(&self, heading: HeadingReading) {
        *guard(&self.heading) = Some(heading);
    }

    pub fn heading(&self) -> Option<HeadingReading> {
        *guard(&self.heading)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            coordinate_fix: Mutex::new(None),
            position: Mutex::new(None),
            heading: Mutex::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_fix_is_consumed_once() {
        let shared = SharedState::new();
        let now = Instant::now();
        shared.record_fix(10.0, 20.0, now);

        let fix = shared.consume_fresh_fix(now).expect("fresh fix");
        assert_eq!((fix.lon, fix.lat), (10.0, 20.0));
        assert!(shared.consume_fresh_fix(now).is_none());
        assert!(shared.latest_fix().unwrap().consumed);
    }

    #[test]
    fn stale_fix_is_never_handed_out() {
        let shared = SharedState::new();
        let received = Instant::now();
        shared.record_fix(1.0, 2.0, received);
        let later = received + FIX_FRESH_FOR;
        assert!(shared.consume_fresh_fix(later).is_none());
        assert!(!shared.latest_fix().unwrap().consumed);
    }

    #[test]
    fn new_fix_overwrites_consumed_one() {
        let shared = SharedState::new();
        let now = Instant::now();
        shared.record_fix(1.0, 1.0, now);
        shared.consume_fresh_fix(now);
        shared.record_fix(3.0, 4.0, now);
        let fix = shared.consume_fresh_fix(now).unwrap();
        assert_eq!((fix.lon, fix.lat), (3.0, 4.0));
    }

    #[test]
    fn stop_flag_is_sticky() {
        let shared = SharedState::new();
        assert!(!shared.is_stop_requested());
        shared.request_stop();
        assert!(shared.is_stop_requested());
    }
}
