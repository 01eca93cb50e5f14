//! Planar geometry helpers shared by the tracker and the heading filter.

/// Cartesian -> polar. Returns `(rho, phi)` with `phi` in radians, (-pi, pi].
pub fn cart2pol(x: f64, y: f64) -> (f64, f64) {
    (x.hypot(y), y.atan2(x))
}

/// Polar -> Cartesian. Inverse of [`cart2pol`].
pub fn pol2cart(rho: f64, phi: f64) -> (f64, f64) {
    (rho * phi.cos(), rho * phi.sin())
}

/// Wrap an angle in degrees into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polar_round_trip() {
        for (x, y) in [
            (1.0, 0.0),
            (0.0, 1.0),
            (-3.5, 2.25),
            (-1e-6, -4.0),
            (1234.5, -0.001),
            (0.0, 0.0),
        ] {
            let (rho, phi) = cart2pol(x, y);
            let (rx, ry) = pol2cart(rho, phi);
            assert!((rx - x).abs() < 1e-9, "x mismatch for ({}, {})", x, y);
            assert!((ry - y).abs() < 1e-9, "y mismatch for ({}, {})", x, y);
        }
    }

    #[test]
    fn due_east_has_zero_bearing() {
        let (rho, phi) = cart2pol(1.0, 0.0);
        assert_eq!(rho, 1.0);
        assert_eq!(phi, 0.0);
    }

    #[test]
    fn normalization_stays_in_range() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        let tiny = normalize_degrees(-1e-15);
        assert!((0.0..360.0).contains(&tiny));
    }
}
