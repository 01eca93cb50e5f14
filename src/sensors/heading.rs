use nalgebra::Vector3;

use crate::geo::normalize_degrees;
use crate::shared::HeadingReading;

/// Weight of the previous filtered heading in the exponential filter.
pub const HEADING_SMOOTHING: f64 = 0.8;

/// Exponentially smoothed magnetic heading from accelerometer + magnetometer.
///
/// The magnetometer vector is projected onto the plane orthogonal to gravity
/// before taking its angle, so a tilted mount does not skew the reading.
#[derive(Clone, Debug)]
pub struct HeadingEstimator {
    device_mount_deg: f64,
    filtered_deg: f64,
    samples: u64,
}

impl HeadingEstimator {
    /// `device_mount_deg` is the mount's configured orientation relative to the
    /// camera's pan zero.
    pub fn new(device_mount_deg: f64) -> Self {
        Self {
            device_mount_deg,
            filtered_deg: 0.0,
            samples: 0,
        }
    }

    /// Fold in one IMU sample. Returns `None` (and leaves the filter alone) for
    /// a zero-length accelerometer vector or any non-finite component.
    pub fn update(&mut self, accel: Vector3<f64>, mag: Vector3<f64>) -> Option<HeadingReading> {
        let instant = instantaneous_heading(accel, mag)?;
        self.filtered_deg =
            HEADING_SMOOTHING * self.filtered_deg + (1.0 - HEADING_SMOOTHING) * instant;
        self.samples += 1;
        Some(self.reading())
    }

    pub fn filtered_deg(&self) -> f64 {
        self.filtered_deg
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Rotation from a GPS bearing into the camera pan frame, in [0, 360).
    pub fn angle_offset(&self) -> f64 {
        normalize_degrees(self.device_mount_deg - self.filtered_deg - 90.0)
    }

    pub fn reading(&self) -> HeadingReading {
        HeadingReading {
            filtered_deg: self.filtered_deg,
            angle_offset_deg: self.angle_offset(),
        }
    }
}

/// Heading in degrees from one accelerometer/magnetometer pair.
pub fn instantaneous_heading(accel: Vector3<f64>, mag: Vector3<f64>) -> Option<f64> {
    if !accel.iter().chain(mag.iter()).all(|v| v.is_finite()) {
        return None;
    }
    let gravity_sq = accel.dot(&accel);
    if gravity_sq <= f64::EPSILON {
        return None;
    }
    let rejection = mag - accel * (mag.dot(&accel) / gravity_sq);
    let heading = -rejection.y.atan2(rejection.x).to_degrees();
    heading.is_finite().then_some(heading)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn level_mount_heading_matches_field_direction() {
        let up = Vector3::new(0.0, 0.0, 1.0);
        assert!(approx(
            instantaneous_heading(up, Vector3::new(1.0, 0.0, 0.0)).unwrap(),
            0.0
        ));
        assert!(approx(
            instantaneous_heading(up, Vector3::new(0.0, -1.0, 0.0)).unwrap(),
            90.0
        ));
    }

    #[test]
    fn vertical_field_component_is_rejected() {
        let up = Vector3::new(0.0, 0.0, 9.81);
        let flat = instantaneous_heading(up, Vector3::new(0.3, -0.3, 0.0)).unwrap();
        let dipped = instantaneous_heading(up, Vector3::new(0.3, -0.3, -0.9)).unwrap();
        assert!(approx(flat, dipped));
        assert!(approx(flat, 45.0));
    }

    #[test]
    fn degenerate_samples_are_dropped() {
        let mut est = HeadingEstimator::new(0.0);
        assert!(est
            .update(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0))
            .is_none());
        assert!(est
            .update(Vector3::new(0.0, 0.0, 1.0), Vector3::new(f64::NAN, 0.0, 0.0))
            .is_none());
        assert_eq!(est.samples(), 0);
        assert_eq!(est.filtered_deg(), 0.0);
    }

    #[test]
    fn filter_converges_geometrically() {
        let mut est = HeadingEstimator::new(0.0);
        let up = Vector3::new(0.0, 0.0, 1.0);
        let east = Vector3::new(0.0, -1.0, 0.0);
        let first = est.update(up, east).unwrap();
        assert!(approx(first.filtered_deg, 18.0));
        for _ in 0..100 {
            est.update(up, east);
        }
        assert!((est.filtered_deg() - 90.0).abs() < 1e-6);
    }

    #[test]
    fn angle_offset_is_wrapped() {
        let mut est = HeadingEstimator::new(0.0);
        assert!(approx(est.angle_offset(), 270.0));

        est = HeadingEstimator::new(45.0);
        let up = Vector3::new(0.0, 0.0, 1.0);
        let field = Vector3::new(-1.0, 0.5, 0.2);
        for _ in 0..50 {
            let reading = est.update(up, field).unwrap();
            assert!((0.0..360.0).contains(&reading.angle_offset_deg));
        }
    }
}
