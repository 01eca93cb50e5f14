//! Target-lock / coordinate-slew / patrol state machine.
//!
//! The tracker is fed twice per control cycle:
//!
//! 1. `observe` with the detections of the newest processed frame. This keeps
//!    the hit registry and the (single) lock up to date.
//! 2. `tick` with the current time and the shared sensor/fix state. At most
//!    once per `tick_interval` this yields one `PtzCommand`.
//!
//! Priority inside a tick: a locked target always wins; otherwise, after the
//! unlock hold-off, a fresh coordinate fix is slewed to; otherwise, once any
//! coordinate activity has gone quiet, the camera patrols.
//!
//! The tracker has no failure path. Bad input is filtered before `observe`, and
//! missing sensor state only withholds a slew.

mod registry;

pub use registry::{LockState, TargetRegistry, CONFIDENCE_THRESHOLD, LOCK_MIN_HITS};

use std::time::{Duration, Instant};

use crate::command::PtzCommand;
use crate::detect::Detection;
use crate::geo::{cart2pol, normalize_degrees};
use crate::shared::{SharedState, FIX_FRESH_FOR};

/// Rate magnitude used for every continuous correction and patrol command.
pub const SPEED: f64 = 34.0;

/// Boxes centered inside [DEAD_ZONE_LOW, DEAD_ZONE_HIGH] on an axis need no
/// correction on that axis.
pub const DEAD_ZONE_LOW: f64 = 0.4;
pub const DEAD_ZONE_HIGH: f64 = 0.6;

pub const MIN_HOLD_OFF: Duration = Duration::from_millis(500);
pub const MAX_HOLD_OFF: Duration = Duration::from_millis(1000);

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Minimum spacing between evaluated ticks.
    pub tick_interval: Duration,
    /// Quiet time after losing a lock (and after start-up).
    pub hold_off: Duration,
    /// Patrol is withheld for this long after a slew.
    pub slew_quiet: Duration,
    /// Wait after the patrol re-center command before sweeping.
    pub patrol_settle: Duration,
    /// Tilt direction flips this often while sweeping.
    pub patrol_flip: Duration,
    /// Tilt angle of the patrol re-center command.
    pub patrol_tilt_deg: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            hold_off: MAX_HOLD_OFF,
            slew_quiet: FIX_FRESH_FOR,
            patrol_settle: Duration::from_secs(2),
            patrol_flip: Duration::from_secs(2),
            patrol_tilt_deg: 35.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    LockedTracking,
    LockedCorrecting,
    CoordinateSlew,
    PatrolInit,
    PatrolSweep,
}

/// Dead-zone control law. Returns `(pan, tilt)`, each in {-SPEED, 0, +SPEED}.
///
/// A target right of center pans negative; a target low in the frame
/// (large y) tilts positive. Signs follow the mount's ISAPI conventions.
pub fn dead_zone_correction(x: f64, y: f64) -> (f64, f64) {
    let pan = if x > DEAD_ZONE_HIGH {
        -SPEED
    } else if x < DEAD_ZONE_LOW {
        SPEED
    } else {
        0.0
    };
    let tilt = if y > DEAD_ZONE_HIGH {
        SPEED
    } else if y < DEAD_ZONE_LOW {
        -SPEED
    } else {
        0.0
    };
    (pan, tilt)
}

pub struct Tracker {
    config: TrackerConfig,
    state: TrackerState,
    registry: TargetRegistry,
    lock: Option<LockState>,
    last_tick: Option<Instant>,
    released_at: Instant,
    last_slew: Option<Instant>,
    patrol_start: Option<Instant>,
    sweeping: bool,
    last_tilt_change: Instant,
    tilt_dir: f64,
}

impl Tracker {
    /// New tracker. The hold-off is counted from `now`, so nothing is emitted
    /// during the first `hold_off` of operation.
    pub fn new(config: TrackerConfig, now: Instant) -> Self {
        Self {
            config,
            state: TrackerState::Idle,
            registry: TargetRegistry::new(),
            lock: None,
            last_tick: None,
            released_at: now,
            last_slew: None,
            patrol_start: None,
            sweeping: false,
            last_tilt_change: now,
            tilt_dir: 1.0,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn locked(&self) -> Option<LockState> {
        self.lock
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Update the registry and lock from the newest frame's detections.
    pub fn observe(&mut self, now: Instant, detections: &[Detection]) {
        self.registry.update(detections);

        if let Some(lock) = self.lock {
            if !detections.iter().any(|d| d.track_id == lock.track_id) {
                log::info!("lost lock on track {}", lock.track_id);
                self.lock = None;
                self.released_at = now;
                self.state = TrackerState::Idle;
            }
        }

        if self.lock.is_none() {
            if let Some(track_id) = self.registry.best_candidate() {
                if let Some(det) = detections.iter().find(|d| d.track_id == track_id) {
                    log::info!(
                        "locked on track {} ({} hits)",
                        track_id,
                        self.registry.hits(track_id)
                    );
                    self.lock = Some(LockState {
                        track_id,
                        last_bbox: det.bbox,
                    });
                }
            }
        }

        if let Some(lock) = self.lock.as_mut() {
            if let Some(det) = detections.iter().find(|d| d.track_id == lock.track_id) {
                lock.last_bbox = det.bbox;
            }
        }
    }

    /// Evaluate one control step. Calls closer than `tick_interval` to the last
    /// evaluated tick are no-ops.
    pub fn tick(&mut self, now: Instant, shared: &SharedState) -> Option<PtzCommand> {
        if let Some(last) = self.last_tick {
            if now.saturating_duration_since(last) < self.config.tick_interval {
                return None;
            }
        }
        self.last_tick = Some(now);

        if let Some(lock) = self.lock {
            return Some(self.follow(lock));
        }

        if now.saturating_duration_since(self.released_at) < self.config.hold_off {
            self.state = TrackerState::Idle;
            return None;
        }

        if let Some(command) = self.slew(now, shared) {
            return Some(command);
        }

        if self.coordinates_active(now, shared) {
            // Recent coordinate traffic: stay put rather than start patrolling.
            self.reset_patrol();
            self.state = TrackerState::CoordinateSlew;
            return None;
        }

        self.patrol(now)
    }

    fn follow(&mut self, lock: LockState) -> PtzCommand {
        self.reset_patrol();
        let (x, y) = lock.last_bbox.center();
        let (pan, tilt) = dead_zone_correction(x, y);
        let settled = pan == 0.0 && tilt == 0.0;
        self.state = match (self.state, settled) {
            (TrackerState::LockedCorrecting, true) => TrackerState::LockedTracking,
            (TrackerState::LockedCorrecting, false) => TrackerState::LockedCorrecting,
            (_, false) => TrackerState::LockedCorrecting,
            (_, true) => TrackerState::LockedTracking,
        };
        PtzCommand::Continuous {
            pan,
            tilt,
            zoom: 0.0,
        }
    }

    fn slew(&mut self, now: Instant, shared: &SharedState) -> Option<PtzCommand> {
        let Some(position) = shared.position() else {
            if shared.latest_fix().is_some_and(|fix| fix.is_fresh(now) && !fix.consumed) {
                log::debug!("coordinate fix pending: no GPS position yet");
            }
            return None;
        };
        let fix = shared.consume_fresh_fix(now)?;
        let angle_offset = shared.heading().map_or(0.0, |h| h.angle_offset_deg);

        let (distance, bearing_rad) = cart2pol(fix.lon - position.lon, fix.lat - position.lat);
        let pan_deg = normalize_degrees(bearing_rad.to_degrees() + angle_offset);
        log::info!(
            "slewing to fix ({:.6}, {:.6}): bearing {:.1} deg, planar distance {:.6}",
            fix.lon,
            fix.lat,
            pan_deg,
            distance
        );

        self.reset_patrol();
        self.last_slew = Some(now);
        self.state = TrackerState::CoordinateSlew;
        Some(PtzCommand::Absolute {
            pan_deg,
            tilt_deg: 0.0,
            zoom: 1.0,
        })
    }

    fn coordinates_active(&self, now: Instant, shared: &SharedState) -> bool {
        let recently_slewed = self
            .last_slew
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.slew_quiet);
        recently_slewed || shared.latest_fix().is_some_and(|fix| fix.is_fresh(now))
    }

    fn patrol(&mut self, now: Instant) -> Option<PtzCommand> {
        let Some(start) = self.patrol_start else {
            self.patrol_start = Some(now);
            self.state = TrackerState::PatrolInit;
            log::info!("starting patrol");
            return Some(PtzCommand::Absolute {
                pan_deg: 0.0,
                tilt_deg: self.config.patrol_tilt_deg,
                zoom: 1.0,
            });
        };

        if now.saturating_duration_since(start) < self.config.patrol_settle {
            self.state = TrackerState::PatrolInit;
            return None;
        }

        if !self.sweeping {
            self.sweeping = true;
            self.last_tilt_change = now;
        } else if now.saturating_duration_since(self.last_tilt_change) >= self.config.patrol_flip
        {
            self.last_tilt_change = now;
            self.tilt_dir = -self.tilt_dir;
        }
        self.state = TrackerState::PatrolSweep;
        Some(PtzCommand::Continuous {
            pan: -SPEED,
            tilt: self.tilt_dir * SPEED,
            zoom: 0.0,
        })
    }

    fn reset_patrol(&mut self) {
        self.patrol_start = None;
        self.sweeping = false;
    }
}
