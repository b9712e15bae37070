//! Timing and threshold configuration.
//!
//! All hardware reference numbers of the trigger electronics live in one
//! immutable [`TimingConfig`] injected at initialization, so an alternate
//! hardware revision is a configuration edit rather than a recompilation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sentinel for an unset clocktick.
pub const INVALID_CLOCKTICK: u32 = u32::MAX;

/// Timing grids, pipeline latencies, and analog front-end constants.
///
/// The defaults carry the reference values of the demonstrator hardware.
/// Clock-grid fields are in nanoseconds; latency fields are counted in
/// ticks of the grid they shift.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingConfig {
    /// Main (calorimeter) clock grid, ns.
    pub main_clocktick: u32,
    /// Tracker clock grid, ns.
    pub tracker_clocktick: u32,
    /// Trigger decision clock grid, ns.
    pub trigger_clocktick: u32,
    /// Calorimeter front-end board latency, in 25 ns ticks.
    pub calo_feb_shift: u32,
    /// Tracker front-end board latency, in 800 ns ticks.
    pub tracker_feb_shift: u32,
    /// Trigger computing latency added by every conversion to the
    /// 1600 ns grid, in 1600 ns ticks.
    pub computing_shift: u32,
    /// Lifetime of a previous-event record, in 1600 ns ticks (1 ms).
    pub previous_event_lifetime: u32,
    /// Scintillator-to-anode photomultiplier transit delay, ns.
    pub delayed_pm_time: f64,
    /// Maximum time window to combine two calorimeter step hits, ns.
    pub signal_max_time: f64,
    /// Linear energy-to-amplitude gain, mV per MeV.
    pub energy_to_amplitude_gain: f64,
    /// Calorimeter low threshold, mV.
    pub calo_low_threshold: f64,
    /// Calorimeter high threshold, mV.
    pub calo_high_threshold: f64,
    /// Tracker cell recovery (dead) time, ns.
    pub geiger_dead_time: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            main_clocktick: 25,
            tracker_clocktick: 800,
            trigger_clocktick: 1600,
            calo_feb_shift: 5,
            tracker_feb_shift: 5,
            computing_shift: 1,
            previous_event_lifetime: 625,
            delayed_pm_time: 62.35,
            signal_max_time: 400.0,
            energy_to_amplitude_gain: 300.0,
            calo_low_threshold: 30.0,
            calo_high_threshold: 50.0,
            geiger_dead_time: 1e6,
        }
    }
}

impl TimingConfig {
    /// Number of main clockticks per tracker clocktick (32 for the
    /// reference grids).
    #[inline]
    pub fn main_ticks_per_tracker_tick(&self) -> u32 {
        self.tracker_clocktick / self.main_clocktick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_grids() {
        let cfg = TimingConfig::default();
        assert_eq!(cfg.main_clocktick, 25);
        assert_eq!(cfg.tracker_clocktick, 800);
        assert_eq!(cfg.trigger_clocktick, 1600);
        assert_eq!(cfg.main_ticks_per_tracker_tick(), 32);
    }

    #[test]
    fn test_previous_event_lifetime_is_one_millisecond() {
        let cfg = TimingConfig::default();
        let lifetime_ns = u64::from(cfg.previous_event_lifetime) * u64::from(cfg.trigger_clocktick);
        assert_eq!(lifetime_ns, 1_000_000);
    }
}
