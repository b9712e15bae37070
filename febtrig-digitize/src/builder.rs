//! Signal builders: truth step hits to analog signals.

use febtrig_core::{Error as CoreError, HitCategory, SimulatedEvent, TimingConfig};

use crate::error::Result;
use crate::signal::{CaloSignal, SignalCollection, TrackerSignal};

/// Builds calorimeter signals from step hits.
///
/// Consecutive energy deposits in the same scintillator block pile up on
/// the photomultiplier anode when they fall inside the signal window, so
/// the builder merges them into one signal with the summed amplitude.
#[derive(Debug, Clone)]
pub struct CaloSignalBuilder {
    timing: TimingConfig,
    initialized: bool,
}

const CALO_CATEGORIES: [HitCategory; 3] =
    [HitCategory::Calo, HitCategory::XCalo, HitCategory::GVeto];

impl CaloSignalBuilder {
    /// Creates a builder, not yet initialized.
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            initialized: false,
        }
    }

    /// Marks the builder ready.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("calo signal builder").into());
        }
        self.initialized = true;
        Ok(())
    }

    /// Converts the calorimeter step hits of `event` into signals.
    pub fn process(&self, event: &SimulatedEvent, signals: &mut SignalCollection) -> Result<()> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("calo signal builder").into());
        }
        let gain = self.timing.energy_to_amplitude_gain;
        let pm_delay = self.timing.delayed_pm_time;
        let window = self.timing.signal_max_time;
        let mut next_id = u32::try_from(signals.calo_signals().len()).unwrap_or(u32::MAX);

        for category in CALO_CATEGORIES {
            for hit in event.step_hits(category) {
                let amplitude = hit.energy * gain;
                // When several signals on the cell admit the hit, it piles
                // up on the most recent one.
                let merged = signals
                    .calo_signals_mut()
                    .iter_mut()
                    .rev()
                    .find(|s| {
                        s.cell == hit.cell && hit.time_stop <= s.time - pm_delay + window
                    })
                    .map(|s| s.amplitude += amplitude)
                    .is_some();
                if !merged {
                    signals.push_calo(CaloSignal {
                        hit_id: next_id,
                        cell: hit.cell,
                        time: hit.time_stop + pm_delay,
                        amplitude,
                    });
                    next_id += 1;
                }
            }
        }
        log::debug!(
            "built {} calo signals from event",
            signals.calo_signals().len()
        );
        Ok(())
    }
}

/// Builds tracker anode signals from step hits.
///
/// A drift cell produces at most one avalanche per event; repeated hits
/// keep the earliest time. Cell recovery (dead time) is handled upstream
/// by the stimulus, not here.
#[derive(Debug, Clone)]
pub struct TrackerSignalBuilder {
    initialized: bool,
}

impl TrackerSignalBuilder {
    /// Creates a builder, not yet initialized.
    pub fn new() -> Self {
        Self { initialized: false }
    }

    /// Marks the builder ready.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("tracker signal builder").into());
        }
        self.initialized = true;
        Ok(())
    }

    /// Converts the tracker step hits of `event` into anode signals.
    pub fn process(&self, event: &SimulatedEvent, signals: &mut SignalCollection) -> Result<()> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("tracker signal builder").into());
        }
        let mut next_id = u32::try_from(signals.tracker_signals().len()).unwrap_or(u32::MAX);

        for hit in event.step_hits(HitCategory::Geiger) {
            let existing = signals
                .tracker_signals_mut()
                .iter_mut()
                .find(|s| s.cell == hit.cell);
            match existing {
                Some(signal) => {
                    if hit.time_start < signal.anode_avalanche_time {
                        signal.anode_avalanche_time = hit.time_start;
                    }
                }
                None => {
                    signals.push_tracker(TrackerSignal {
                        hit_id: next_id,
                        cell: hit.cell,
                        anode_avalanche_time: hit.time_start,
                    });
                    next_id += 1;
                }
            }
        }
        log::debug!(
            "built {} tracker signals from event",
            signals.tracker_signals().len()
        );
        Ok(())
    }
}

impl Default for TrackerSignalBuilder {
    fn default() -> Self {
        Self::new()
    }
}
