//! Clock-domain alignment between continuous simulation time and the
//! discrete 25 / 800 / 1600 ns hardware grids.
//!
//! Independent front-end clock domains are phase-locked to a common
//! reference only up to a random per-run-start offset. The manager draws
//! one phase shift inside the 1600 ns trigger window per simulated event
//! and derives the reference clockticks and sub-tick shifts that the
//! encoding and decision stages share.

use crate::config::TimingConfig;
use crate::error::{Error, Result};
use crate::rng::UniformSource;

/// Per-event clock reference manager.
#[derive(Debug, Clone)]
pub struct ClockManager {
    timing: TimingConfig,
    initialized: bool,
    clocktick_ref: u32,
    shift_1600: f64,
    clocktick_25_ref: u32,
    shift_25: f64,
    clocktick_800_ref: u32,
    shift_800: f64,
}

impl ClockManager {
    /// Creates a manager with the reference at zero, not yet initialized.
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            initialized: false,
            clocktick_ref: 0,
            shift_1600: 0.0,
            clocktick_25_ref: 0,
            shift_25: 0.0,
            clocktick_800_ref: 0,
            shift_800: 0.0,
        }
    }

    /// Marks the manager ready. Fails on a second call or if the
    /// reference has drifted from zero.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized("clock manager"));
        }
        if self.clocktick_ref != 0 {
            return Err(Error::NonZeroReference);
        }
        self.initialized = true;
        Ok(())
    }

    /// Returns true once [`initialize`](Self::initialize) succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns to the uninitialized state.
    pub fn reset(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotInitialized("clock manager"));
        }
        self.initialized = false;
        self.shift_1600 = 0.0;
        self.clocktick_25_ref = 0;
        self.shift_25 = 0.0;
        self.clocktick_800_ref = 0;
        self.shift_800 = 0.0;
        Ok(())
    }

    /// Draws the per-event phase shift in `[0, trigger_clocktick)` and
    /// derives the 25 ns and 800 ns references from it.
    pub fn compute_reference<R: UniformSource + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.ensure_initialized()?;
        self.shift_1600 = rng.flat(0.0, f64::from(self.timing.trigger_clocktick));
        let main = f64::from(self.timing.main_clocktick);
        let tracker = f64::from(self.timing.tracker_clocktick);
        self.clocktick_25_ref = (self.shift_1600 / main) as u32;
        self.shift_25 = self.shift_1600 % main;
        self.clocktick_800_ref = (self.shift_1600 / tracker) as u32;
        self.shift_800 = self.shift_1600 % tracker;
        log::debug!(
            "clock reference: shift {:.2} ns, 25 ns tick {}, 800 ns tick {}",
            self.shift_1600,
            self.clocktick_25_ref,
            self.clocktick_800_ref
        );
        Ok(())
    }

    /// The drawn phase shift inside the 1600 ns window, ns.
    pub fn shift_1600(&self) -> Result<f64> {
        self.ensure_initialized()?;
        Ok(self.shift_1600)
    }

    /// Reference clocktick on the 25 ns grid.
    pub fn clocktick_25_ref(&self) -> Result<u32> {
        self.ensure_initialized()?;
        Ok(self.clocktick_25_ref)
    }

    /// Sub-tick shift on the 25 ns grid, ns.
    pub fn shift_25(&self) -> Result<f64> {
        self.ensure_initialized()?;
        Ok(self.shift_25)
    }

    /// Reference clocktick on the 800 ns grid.
    pub fn clocktick_800_ref(&self) -> Result<u32> {
        self.ensure_initialized()?;
        Ok(self.clocktick_800_ref)
    }

    /// Sub-tick shift on the 800 ns grid, ns.
    pub fn shift_800(&self) -> Result<f64> {
        self.ensure_initialized()?;
        Ok(self.shift_800)
    }

    /// Converts a 25 ns clocktick to the 1600 ns grid, including the
    /// trigger computing latency.
    #[inline]
    pub fn clocktick_25_to_1600(&self, clocktick_25: u32) -> u32 {
        clocktick_25 * self.timing.main_clocktick / self.timing.trigger_clocktick
            + self.timing.computing_shift
    }

    /// Converts an 800 ns clocktick to the 1600 ns grid, including the
    /// trigger computing latency.
    #[inline]
    pub fn clocktick_800_to_1600(&self, clocktick_800: u32) -> u32 {
        clocktick_800 * self.timing.tracker_clocktick / self.timing.trigger_clocktick
            + self.timing.computing_shift
    }

    /// The timing configuration this manager was built with.
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotInitialized("clock manager"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_accessors_fail_before_initialize() {
        let clock = ClockManager::new(TimingConfig::default());
        assert!(clock.clocktick_25_ref().is_err());
        assert!(clock.shift_800().is_err());
    }

    #[test]
    fn test_double_initialize_fails() {
        let mut clock = ClockManager::new(TimingConfig::default());
        clock.initialize().unwrap();
        assert!(clock.initialize().is_err());
    }

    #[test]
    fn test_reference_derivation_is_consistent() {
        let mut clock = ClockManager::new(TimingConfig::default());
        clock.initialize().unwrap();
        let mut rng = StdRng::seed_from_u64(314_159);
        clock.compute_reference(&mut rng).unwrap();

        let shift = clock.shift_1600().unwrap();
        assert!((0.0..1600.0).contains(&shift));
        assert_eq!(clock.clocktick_25_ref().unwrap(), (shift / 25.0) as u32);
        assert_eq!(clock.clocktick_800_ref().unwrap(), (shift / 800.0) as u32);
        assert!(clock.shift_25().unwrap() < 25.0);
        assert!(clock.shift_800().unwrap() < 800.0);
    }

    #[test]
    fn test_reference_is_deterministic_for_a_seed() {
        let mut a = ClockManager::new(TimingConfig::default());
        let mut b = ClockManager::new(TimingConfig::default());
        a.initialize().unwrap();
        b.initialize().unwrap();
        a.compute_reference(&mut StdRng::seed_from_u64(42)).unwrap();
        b.compute_reference(&mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a.shift_1600().unwrap(), b.shift_1600().unwrap());
        assert_eq!(a.clocktick_25_ref().unwrap(), b.clocktick_25_ref().unwrap());
    }

    #[test]
    fn test_conversion_to_1600ns_grid() {
        let clock = ClockManager::new(TimingConfig::default());
        // 64 ticks of 25 ns = 1600 ns = 1 trigger tick, plus computing shift 1.
        assert_eq!(clock.clocktick_25_to_1600(64), 2);
        assert_eq!(clock.clocktick_25_to_1600(0), 1);
        assert_eq!(clock.clocktick_25_to_1600(130), 3);
        // 2 ticks of 800 ns = 1600 ns, plus computing shift 1.
        assert_eq!(clock.clocktick_800_to_1600(2), 2);
        assert_eq!(clock.clocktick_800_to_1600(0), 1);
        assert_eq!(clock.clocktick_800_to_1600(5), 3);
    }
}
