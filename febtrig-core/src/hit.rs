//! Simulated step hits, the input record of the digitization pipeline.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::address::{CellAddress, HitCategory};

/// One truth energy deposit in a detector cell.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepHit {
    /// Cell the energy was deposited in.
    pub cell: CellAddress,
    /// Deposited energy, MeV.
    pub energy: f64,
    /// Step start time relative to the event origin, ns.
    pub time_start: f64,
    /// Step stop time relative to the event origin, ns.
    pub time_stop: f64,
    /// Step position, mm.
    pub position: [f64; 3],
}

impl StepHit {
    /// Creates a step hit with a point-like position at the origin.
    pub fn new(cell: CellAddress, energy: f64, time_start: f64, time_stop: f64) -> Self {
        Self {
            cell,
            energy,
            time_start,
            time_stop,
            position: [0.0; 3],
        }
    }
}

/// One simulated event: step hits grouped by detector category.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulatedEvent {
    hits: HashMap<HitCategory, Vec<StepHit>>,
}

impl SimulatedEvent {
    /// Creates an empty event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step hit under its own category.
    pub fn add_step_hit(&mut self, hit: StepHit) {
        self.hits.entry(hit.cell.category).or_default().push(hit);
    }

    /// True when the event carries at least one hit of `category`.
    pub fn has_step_hits(&self, category: HitCategory) -> bool {
        self.hits.get(&category).is_some_and(|v| !v.is_empty())
    }

    /// The step hits of `category`, empty when none were recorded.
    pub fn step_hits(&self, category: HitCategory) -> &[StepHit] {
        self.hits.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Total number of step hits across all categories.
    pub fn len(&self) -> usize {
        self.hits.values().map(Vec::len).sum()
    }

    /// True when no step hits were recorded.
    pub fn is_empty(&self) -> bool {
        self.hits.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geiger_cell(row: u16) -> CellAddress {
        CellAddress::new(HitCategory::Geiger, 0, 0, row)
    }

    #[test]
    fn test_hits_group_by_category() {
        let mut event = SimulatedEvent::new();
        event.add_step_hit(StepHit::new(geiger_cell(4), 0.0, 10.0, 12.0));
        event.add_step_hit(StepHit::new(
            CellAddress::new(HitCategory::Calo, 0, 3, 2),
            1.0,
            5.0,
            6.0,
        ));

        assert!(event.has_step_hits(HitCategory::Geiger));
        assert!(event.has_step_hits(HitCategory::Calo));
        assert!(!event.has_step_hits(HitCategory::GVeto));
        assert_eq!(event.step_hits(HitCategory::Geiger).len(), 1);
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn test_empty_event() {
        let event = SimulatedEvent::new();
        assert!(event.is_empty());
        assert!(event.step_hits(HitCategory::Calo).is_empty());
    }
}
