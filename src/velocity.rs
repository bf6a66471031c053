//! Moving-average angular velocity from a stream of angle samples.

use std::collections::VecDeque;
use std::time::Instant;

use crate::{angle::Angle, angle::FULL_SCALE_DEGREES, utils};

/// Default number of samples kept in the window
pub const DEFAULT_WINDOW: usize = 50;

/// Angular velocity estimator over a bounded window of samples
///
/// Consecutive samples are unwrapped across the 0/360 boundary using the
/// shortest path, so the sampling rate must be high enough that the shaft
/// turns less than half a revolution between samples.
#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    samples: VecDeque<(Instant, Angle)>,
    window: usize,
}

impl Default for VelocityEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl VelocityEstimator {
    /// Create an estimator keeping at most `window` samples (at least 2)
    #[must_use]
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Add a sample, dropping the oldest one when the window is full
    pub fn push(&mut self, at: Instant, angle: Angle) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back((at, angle));
    }

    /// Add a sample and return the updated velocity
    pub fn update(&mut self, at: Instant, angle: Angle) -> Option<f32> {
        self.push(at, angle);
        self.velocity()
    }

    /// Mean of the per-step velocities in the window, in degrees per second
    ///
    /// Returns `None` until two samples with distinct timestamps are present.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn velocity(&self) -> Option<f32> {
        let mut sum = 0.0_f64;
        let mut steps = 0_usize;
        for ((t0, a0), (t1, a1)) in self.samples.iter().zip(self.samples.iter().skip(1)) {
            let dt = t1.saturating_duration_since(*t0).as_secs_f64();
            if dt <= 0.0 {
                continue;
            }
            let counts = utils::shortest_delta(a0.raw(), a1.raw());
            let degrees = f64::from(counts) * f64::from(FULL_SCALE_DEGREES)
                / f64::from(utils::RESOLUTION);
            sum += degrees / dt;
            steps += 1;
        }
        (steps > 0).then(|| (sum / steps as f64) as f32)
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn needs_two_samples() {
        let mut estimator = VelocityEstimator::default();
        let t0 = Instant::now();
        assert_eq!(estimator.update(t0, Angle::from_raw(0)), None);
        assert!(estimator.update(t0 + Duration::from_millis(10), Angle::from_raw(0)).is_some());
    }

    #[test]
    fn constant_rotation() {
        let mut estimator = VelocityEstimator::new(10);
        let t0 = Instant::now();
        // 1024 counts = 90 degrees per 100 ms = 900 deg/s
        for step in 0..5u16 {
            estimator.push(
                t0 + Duration::from_millis(100 * u64::from(step)),
                Angle::from_raw(step * 1024),
            );
        }
        let velocity = estimator.velocity().unwrap();
        assert!((velocity - 900.0).abs() < 0.5, "{velocity}");
    }

    #[test]
    fn reverse_across_zero() {
        let mut estimator = VelocityEstimator::default();
        let t0 = Instant::now();
        estimator.push(t0, Angle::from_raw(10));
        estimator.push(t0 + Duration::from_secs(1), Angle::from_raw(4086));
        let velocity = estimator.velocity().unwrap();
        let expected = -20.0 * 360.0 / 4096.0;
        assert!((velocity - expected).abs() < 1e-3, "{velocity}");
    }

    #[test]
    fn window_is_bounded() {
        let mut estimator = VelocityEstimator::new(3);
        let t0 = Instant::now();
        for i in 0..10u16 {
            estimator.push(t0 + Duration::from_millis(u64::from(i)), Angle::from_raw(i));
        }
        assert_eq!(estimator.len(), 3);
        estimator.clear();
        assert!(estimator.is_empty());
    }

    #[test]
    fn window_larger_than_u16_steps() {
        let window = 70_000;
        let mut estimator = VelocityEstimator::new(window);
        let t0 = Instant::now();
        // one count per millisecond
        for i in 0..window {
            let raw = u16::try_from(i % 4096).unwrap();
            estimator.push(t0 + Duration::from_millis(i as u64), Angle::from_raw(raw));
        }
        assert_eq!(estimator.len(), window);

        let velocity = estimator.velocity().unwrap();
        let expected = 1000.0 * 360.0 / 4096.0;
        assert!((velocity - expected).abs() < 0.5, "{velocity}");
    }
}
