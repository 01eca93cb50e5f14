//! Mount sensors: IMU-derived heading and GPS-derived position.
//!
//! Register-level IMU access and NMEA parsing live behind the `ImuSource` and
//! `GpsSource` traits. The workers here only poll a source, run the matching
//! estimator and publish the result into `SharedState`.

mod heading;
mod position;

pub use heading::{instantaneous_heading, HeadingEstimator, HEADING_SMOOTHING};
pub use position::{PositionEstimator, POSITION_WINDOW};

use anyhow::Result;
use nalgebra::Vector3;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::shared::SharedState;

/// Nominal IMU sample period.
pub const IMU_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// GPS polling period.
pub const GPS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One simultaneous accelerometer + magnetometer reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImuSample {
    pub accel: Vector3<f64>,
    pub mag: Vector3<f64>,
}

pub trait ImuSource: Send {
    /// Read one sample. `Ok(None)` means no new data this period.
    fn read(&mut self) -> Result<Option<ImuSample>>;
}

pub trait GpsSource: Send {
    /// Read one raw `(lon, lat)` fix. `Ok(None)` means no fix this period.
    fn read(&mut self) -> Result<Option<(f64, f64)>>;
}

/// Stationary, level mount facing a fixed magnetic heading.
#[derive(Clone, Debug)]
pub struct FixedImu {
    sample: ImuSample,
}

impl FixedImu {
    pub fn facing(heading_deg: f64) -> Self {
        let rad = (-heading_deg).to_radians();
        Self {
            sample: ImuSample {
                accel: Vector3::new(0.0, 0.0, 9.81),
                // Include a vertical field component as a real magnetometer would.
                mag: Vector3::new(rad.cos(), rad.sin(), -0.8),
            },
        }
    }
}

impl ImuSource for FixedImu {
    fn read(&mut self) -> Result<Option<ImuSample>> {
        Ok(Some(self.sample))
    }
}

/// GPS receiver reporting a surveyed position.
#[derive(Clone, Debug)]
pub struct FixedGps {
    lon: f64,
    lat: f64,
}

impl FixedGps {
    pub fn at(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl GpsSource for FixedGps {
    fn read(&mut self) -> Result<Option<(f64, f64)>> {
        Ok(Some((self.lon, self.lat)))
    }
}

/// Poll `source` every `IMU_POLL_INTERVAL` until stop is requested, publishing
/// the filtered heading.
pub fn run_heading_worker(
    mut source: Box<dyn ImuSource>,
    mut estimator: HeadingEstimator,
    shared: Arc<SharedState>,
) {
    log::info!("heading worker started");
    while !shared.is_stop_requested() {
        match source.read() {
            Ok(Some(sample)) => match estimator.update(sample.accel, sample.mag) {
                Some(reading) => {
                    log::trace!(
                        "heading {:.1} deg, offset {:.1} deg",
                        reading.filtered_deg,
                        reading.angle_offset_deg
                    );
                    shared.set_heading(reading);
                }
                None => log::debug!("dropping degenerate IMU sample"),
            },
            Ok(None) => {}
            Err(e) => log::warn!("imu read failed: {:#}", e),
        }
        thread::sleep(IMU_POLL_INTERVAL);
    }
    log::info!(
        "heading worker stopped after {} samples",
        estimator.samples()
    );
}

/// Poll `source` every `GPS_POLL_INTERVAL` until stop is requested, publishing
/// the smoothed position.
pub fn run_position_worker(mut source: Box<dyn GpsSource>, shared: Arc<SharedState>) {
    let mut estimator = PositionEstimator::new();
    log::info!("position worker started");
    while !shared.is_stop_requested() {
        match source.read() {
            Ok(Some((lon, lat))) => {
                if let Some(position) = estimator.update(lon, lat) {
                    shared.set_position(position);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("gps read failed: {:#}", e),
        }
        thread::sleep(GPS_POLL_INTERVAL);
    }
    log::info!("position worker stopped");
}
