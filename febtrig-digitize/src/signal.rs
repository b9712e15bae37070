//! Analog signals reconstructed from truth step hits.
//!
//! Signals sit between the simulation record and the front-end boards:
//! continuous times and amplitudes, already attached to a detector cell
//! but not yet discretized onto a clock grid.

use serde::{Deserialize, Serialize};

use febtrig_core::CellAddress;

/// One calorimeter photomultiplier signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaloSignal {
    /// Per-event signal id, monotonically increasing.
    pub hit_id: u32,
    /// Scintillator block the signal comes from.
    pub cell: CellAddress,
    /// Signal time at the photomultiplier anode, ns.
    pub time: f64,
    /// Signal amplitude, mV.
    pub amplitude: f64,
}

/// One tracker cell anode signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSignal {
    /// Per-event signal id, monotonically increasing.
    pub hit_id: u32,
    /// Drift cell the avalanche happened in.
    pub cell: CellAddress,
    /// Anode avalanche time, ns.
    pub anode_avalanche_time: f64,
}

/// Per-event container for both signal families.
#[derive(Debug, Clone, Default)]
pub struct SignalCollection {
    calo: Vec<CaloSignal>,
    tracker: Vec<TrackerSignal>,
}

impl SignalCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a calorimeter signal.
    pub fn push_calo(&mut self, signal: CaloSignal) {
        self.calo.push(signal);
    }

    /// Appends a tracker signal.
    pub fn push_tracker(&mut self, signal: TrackerSignal) {
        self.tracker.push(signal);
    }

    /// The calorimeter signals of this event.
    #[inline]
    pub fn calo_signals(&self) -> &[CaloSignal] {
        &self.calo
    }

    /// Mutable access for in-place amplitude merging.
    pub(crate) fn calo_signals_mut(&mut self) -> &mut Vec<CaloSignal> {
        &mut self.calo
    }

    /// The tracker signals of this event.
    #[inline]
    pub fn tracker_signals(&self) -> &[TrackerSignal] {
        &self.tracker
    }

    pub(crate) fn tracker_signals_mut(&mut self) -> &mut Vec<TrackerSignal> {
        &mut self.tracker
    }

    /// True when at least one calorimeter signal was built.
    pub fn has_calo_signals(&self) -> bool {
        !self.calo.is_empty()
    }

    /// True when at least one tracker signal was built.
    pub fn has_tracker_signals(&self) -> bool {
        !self.tracker.is_empty()
    }

    /// Tracker signals with an avalanche time at or below `time_limit` ns.
    pub fn prompt_tracker_count(&self, time_limit: f64) -> usize {
        self.tracker
            .iter()
            .filter(|s| s.anode_avalanche_time <= time_limit)
            .count()
    }

    /// Tracker signals with an avalanche time above `time_limit` ns.
    pub fn delayed_tracker_count(&self, time_limit: f64) -> usize {
        self.tracker.len() - self.prompt_tracker_count(time_limit)
    }

    /// Clears both signal lists for the next event.
    pub fn reset(&mut self) {
        self.calo.clear();
        self.tracker.clear();
    }
}
