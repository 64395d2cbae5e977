//! Time management for the simulation
//!
//! The simulated world advances in discrete physics steps. A fixed number of
//! steps forms one simulated second (240 by default, matching the 1/240 s
//! physics time step). This module provides deterministic step counting.

use serde::{Deserialize, Serialize};

/// Default physics rate in steps per simulated second
pub const DEFAULT_STEPS_PER_SECOND: u32 = 240;

/// Counts simulation steps and converts them to simulated time
///
/// # Example
/// ```
/// use panda_grasp_core::SimClock;
///
/// let mut clock = SimClock::new(240);
/// assert_eq!(clock.current_step(), 0);
///
/// clock.advance(240);
/// assert_eq!(clock.current_step(), 240);
/// assert!((clock.elapsed_seconds() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    /// Total steps elapsed since the world was created
    current_step: u64,
    /// Number of steps in one simulated second
    steps_per_second: u32,
}

impl SimClock {
    /// Create a new SimClock
    ///
    /// # Arguments
    /// * `steps_per_second` - Physics rate (inverse of the time step)
    ///
    /// # Panics
    ///
    /// Panics if `steps_per_second` is zero.
    pub fn new(steps_per_second: u32) -> Self {
        assert!(steps_per_second > 0, "steps_per_second must be positive");
        Self {
            current_step: 0,
            steps_per_second,
        }
    }

    /// Advance by a single step
    pub fn tick(&mut self) {
        self.current_step += 1;
    }

    /// Advance by `n` steps
    ///
    /// # Example
    /// ```
    /// use panda_grasp_core::SimClock;
    ///
    /// let mut clock = SimClock::new(240);
    /// clock.advance(120);
    /// assert_eq!(clock.current_step(), 120);
    /// ```
    pub fn advance(&mut self, n: u32) {
        self.current_step += u64::from(n);
    }

    /// Total steps since start
    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Length of one step in seconds
    pub fn time_step(&self) -> f64 {
        1.0 / f64::from(self.steps_per_second)
    }

    /// Simulated seconds elapsed since start
    pub fn elapsed_seconds(&self) -> f64 {
        self.current_step as f64 * self.time_step()
    }

    /// Get steps per second
    pub fn steps_per_second(&self) -> u32 {
        self.steps_per_second
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS_PER_SECOND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "steps_per_second must be positive")]
    fn test_zero_steps_per_second_panics() {
        SimClock::new(0);
    }

    #[test]
    fn test_time_step_matches_rate() {
        let clock = SimClock::default();
        assert!((clock.time_step() - 1.0 / 240.0).abs() < 1e-12);
    }
}
