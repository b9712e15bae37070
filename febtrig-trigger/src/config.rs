//! Trigger decision configuration.

use serde::{Deserialize, Serialize};

/// Knobs of the decision stages.
///
/// The defaults carry the nominal firmware settings; all sizes are
/// counted in ticks of the grid the stage runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Depth of the calorimeter sliding buffer, in 25 ns ticks.
    pub calo_buffer_depth: usize,
    /// Minimum summed high-threshold multiplicity for a calorimeter
    /// decision.
    pub calo_multiplicity_threshold: u8,
    /// Veto calorimeter decisions with activity on one side only.
    pub inhibit_single_side: bool,
    /// Veto calorimeter decisions with activity on both sides.
    pub inhibit_both_side: bool,
    /// Width of the calorimeter coincidence gate, in 1600 ns ticks.
    pub calorimeter_gate_size: u32,
    /// Width of the decision dead window: a new decision inside this many
    /// ticks of an earlier one is not re-issued.
    pub decision_gate_size: u32,
    /// Maximum number of live previous-event records.
    pub previous_event_buffer_depth: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            calo_buffer_depth: 4,
            calo_multiplicity_threshold: 1,
            inhibit_single_side: false,
            inhibit_both_side: false,
            calorimeter_gate_size: 5,
            decision_gate_size: 5,
            previous_event_buffer_depth: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_settings() {
        let cfg = TriggerConfig::default();
        assert_eq!(cfg.calo_buffer_depth, 4);
        assert_eq!(cfg.calo_multiplicity_threshold, 1);
        assert_eq!(cfg.calorimeter_gate_size, 5);
        assert!(!cfg.inhibit_single_side);
    }

    #[test]
    fn test_loads_from_json() {
        let json = r#"{
            "calo_buffer_depth": 2,
            "calo_multiplicity_threshold": 2,
            "inhibit_single_side": true,
            "inhibit_both_side": false,
            "calorimeter_gate_size": 8,
            "decision_gate_size": 5,
            "previous_event_buffer_depth": 4
        }"#;
        let cfg: TriggerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.calo_buffer_depth, 2);
        assert_eq!(cfg.calorimeter_gate_size, 8);
        assert!(cfg.inhibit_single_side);

        let round = serde_json::to_string(&cfg).unwrap();
        assert_eq!(serde_json::from_str::<TriggerConfig>(&round).unwrap(), cfg);
    }
}
