use std::collections::VecDeque;

use crate::shared::GeoPosition;

/// Samples averaged per axis.
pub const POSITION_WINDOW: usize = 20;

/// Moving average of the last `POSITION_WINDOW` GPS fixes, per axis.
#[derive(Clone, Debug, Default)]
pub struct PositionEstimator {
    lons: VecDeque<f64>,
    lats: VecDeque<f64>,
}

impl PositionEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one fix and return the new smoothed position. Non-finite fixes are
    /// dropped and yield `None`.
    pub fn update(&mut self, lon: f64, lat: f64) -> Option<GeoPosition> {
        if !lon.is_finite() || !lat.is_finite() {
            log::debug!("dropping non-finite GPS fix ({}, {})", lon, lat);
            return None;
        }
        push_bounded(&mut self.lons, lon);
        push_bounded(&mut self.lats, lat);
        self.smoothed()
    }

    pub fn smoothed(&self) -> Option<GeoPosition> {
        Some(GeoPosition {
            lon: mean(&self.lons)?,
            lat: mean(&self.lats)?,
        })
    }

    pub fn len(&self) -> usize {
        self.lons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lons.is_empty()
    }
}

fn push_bounded(window: &mut VecDeque<f64>, value: f64) {
    if window.len() >= POSITION_WINDOW {
        window.pop_front();
    }
    window.push_back(value);
}

fn mean(window: &VecDeque<f64>) -> Option<f64> {
    if window.is_empty() {
        return None;
    }
    Some(window.iter().sum::<f64>() / window.len() as f64)
}
