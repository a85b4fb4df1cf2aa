//! Fixed-timestep frame driver
//!
//! Wall time is accumulated and spent in fixed simulation ticks. Rendering
//! happens once per frame, plus whenever too many ticks run back to back, so a
//! slow frame cannot starve the display.

use std::time::{Duration, Instant};

use crate::config::DriverSettings;

/// What the driver advances.
pub trait FrameTarget {
    /// Advances the simulation by one fixed tick.
    fn step(&mut self);
    fn render(&mut self);
    fn close_requested(&self) -> bool;
}

/// Outcome of one [`FrameDriver::advance`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub steps: u32,
    /// Renders issued because the sequential tick cap was exceeded.
    pub forced_renders: u32,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub struct FrameDriver {
    timestep: f64,
    accumulator: f64,
    max_sequential_updates: u32,
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::from_settings(&DriverSettings::default())
    }
}

impl FrameDriver {
    pub fn new(timestep: f64, max_sequential_updates: u32) -> Self {
        Self {
            timestep,
            accumulator: 0.0,
            max_sequential_updates,
        }
    }

    pub fn from_settings(settings: &DriverSettings) -> Self {
        Self::new(settings.timestep as f64, settings.max_sequential_updates)
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    /// Unspent time carried into the next frame, in seconds.
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Drops unspent time, e.g. after the scene was rebuilt.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    /// Spends `elapsed` wall time on `target`.
    ///
    /// Close requests are honoured between ticks; once one is seen no further
    /// tick runs. The frame still ends with one render.
    pub fn advance(&mut self, elapsed: Duration, target: &mut impl FrameTarget) -> FrameReport {
        let mut report = FrameReport::default();
        if self.timestep <= 0.0 {
            log::warn!("Non-positive timestep {}, not stepping", self.timestep);
        } else {
            self.accumulator += elapsed.as_secs_f64();
        }

        let mut sequential = 0;
        while self.timestep > 0.0 && self.accumulator >= self.timestep {
            if target.close_requested() {
                report.closed = true;
                break;
            }

            target.step();
            self.accumulator -= self.timestep;
            report.steps += 1;
            sequential += 1;

            if sequential > self.max_sequential_updates {
                log::trace!("{} sequential updates, forcing a frame", sequential);
                target.render();
                report.forced_renders += 1;
                sequential = 0;
            }
        }

        report.closed |= target.close_requested();
        target.render();
        report
    }
}

/// Measures wall time between frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Time since the previous call (or since creation).
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed
    }

    pub fn restart(&mut self) {
        self.last = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingTarget {
        steps: u32,
        renders: u32,
        close_after: Option<u32>,
        /// Step count at each render.
        render_log: Vec<u32>,
    }

    impl FrameTarget for CountingTarget {
        fn step(&mut self) {
            self.steps += 1;
        }

        fn render(&mut self) {
            self.renders += 1;
            self.render_log.push(self.steps);
        }

        fn close_requested(&self) -> bool {
            self.close_after.is_some_and(|limit| self.steps >= limit)
        }
    }

    #[test]
    fn test_elapsed_time_becomes_ticks() {
        let mut driver = FrameDriver::new(0.01, 60);
        let mut target = CountingTarget::default();

        let report = driver.advance(Duration::from_millis(35), &mut target);
        assert_eq!(report.steps, 3);
        assert_eq!(target.renders, 1);
        assert!((driver.accumulator() - 0.005).abs() < 1e-6);
    }

    #[test]
    fn test_remainder_carries_over() {
        let mut driver = FrameDriver::new(0.01, 60);
        let mut target = CountingTarget::default();

        assert_eq!(driver.advance(Duration::from_millis(15), &mut target).steps, 1);
        assert_eq!(driver.advance(Duration::from_millis(6), &mut target).steps, 1);
        assert_eq!(target.steps, 2);
    }

    #[test]
    fn test_short_frame_still_renders() {
        let mut driver = FrameDriver::new(0.01, 60);
        let mut target = CountingTarget::default();

        let report = driver.advance(Duration::ZERO, &mut target);
        assert_eq!(report.steps, 0);
        assert_eq!(target.renders, 1);
    }

    #[test]
    fn test_sequential_cap_forces_renders() {
        let mut driver = FrameDriver::new(0.01, 2);
        let mut target = CountingTarget::default();

        let report = driver.advance(Duration::from_millis(75), &mut target);
        assert_eq!(report.steps, 7);
        assert_eq!(report.forced_renders, 2);
        assert_eq!(target.render_log, vec![3, 6, 7]);
    }

    #[test]
    fn test_close_is_checked_between_ticks() {
        let mut driver = FrameDriver::new(0.01, 60);
        let mut target = CountingTarget {
            close_after: Some(2),
            ..Default::default()
        };

        let report = driver.advance(Duration::from_millis(55), &mut target);
        assert!(report.closed);
        assert_eq!(report.steps, 2);
        assert_eq!(target.render_log, vec![2]);
    }

    #[test]
    fn test_close_before_first_tick_still_renders() {
        let mut driver = FrameDriver::new(0.01, 60);
        let mut target = CountingTarget {
            close_after: Some(0),
            ..Default::default()
        };

        let report = driver.advance(Duration::from_millis(30), &mut target);
        assert!(report.closed);
        assert_eq!(report.steps, 0);
        assert_eq!(target.renders, 1);
    }

    #[test]
    fn test_reset_drops_unspent_time() {
        let mut driver = FrameDriver::new(0.01, 60);
        let mut target = CountingTarget::default();

        driver.advance(Duration::from_millis(9), &mut target);
        driver.reset();
        assert_eq!(driver.advance(Duration::from_millis(2), &mut target).steps, 0);
    }

    #[test]
    fn test_default_cap_depends_on_build() {
        let driver = FrameDriver::default();
        let expected = if cfg!(debug_assertions) { 10 } else { 60 };
        assert_eq!(driver.max_sequential_updates, expected);
        assert!((driver.timestep() - 1.0 / 60.0).abs() < 1e-6);
    }
}
