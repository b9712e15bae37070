//! Decision-stage records exchanged between the trigger sub-algorithms.

use serde::{Deserialize, Serialize};

/// Detector sides.
pub const NSIDES: usize = 2;
/// Trigger zones per side.
pub const NZONES: usize = 10;

/// Inner-layers bit of a zone's final data.
pub const ZONE_BIT_INNER: u8 = 0;
/// Outer-layers bit.
pub const ZONE_BIT_OUTER: u8 = 1;
/// Horizontal-pattern right bit.
pub const ZONE_BIT_RIGHT: u8 = 2;
/// Horizontal-pattern middle bit.
pub const ZONE_BIT_MIDDLE: u8 = 3;
/// Horizontal-pattern left bit.
pub const ZONE_BIT_LEFT: u8 = 4;
/// Near-source right bit.
pub const ZONE_BIT_NSZ_RIGHT: u8 = 5;
/// Near-source left bit.
pub const ZONE_BIT_NSZ_LEFT: u8 = 6;

/// The 7-bit final data of one tracker zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneData(u8);

impl ZoneData {
    /// Sets one of the `ZONE_BIT_*` flags.
    pub fn set(&mut self, bit: u8) {
        self.0 |= 1 << bit;
    }

    /// Tests one of the `ZONE_BIT_*` flags.
    #[inline]
    pub fn test(self, bit: u8) -> bool {
        self.0 & (1 << bit) != 0
    }

    /// True when any flag is set.
    #[inline]
    pub fn any(self) -> bool {
        self.0 != 0
    }

    /// True when any of the pattern flags (inner, outer, right, middle,
    /// left) is set.
    pub fn pattern_any(self) -> bool {
        self.0 & 0b1_1111 != 0
    }

    /// True when any horizontal-pattern flag (right, middle, left) is set.
    pub fn horizontal_any(self) -> bool {
        self.0 & 0b1_1100 != 0
    }

    /// True when any near-source flag is set.
    pub fn near_source_any(self) -> bool {
        self.0 & 0b110_0000 != 0
    }

    /// ORs another zone's flags into this one.
    pub fn merge(&mut self, other: ZoneData) {
        self.0 |= other.0;
    }
}

/// Calorimeter state of one 25 ns tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaloRecord {
    /// Tick this record was built for; `None` before the first fill.
    pub clocktick_25: Option<u32>,
    /// 10-bit zone activity per side.
    pub zoning_word: [u16; NSIDES],
    /// High-threshold multiplicity per side, saturating at 3.
    pub multiplicity_side: [u8; NSIDES],
    /// Low-threshold-only flag per side.
    pub lto_side: [bool; NSIDES],
    /// Gamma-veto high-threshold multiplicity, saturating at 3.
    pub multiplicity_gveto: u8,
    /// Gamma-veto low-threshold-only flag.
    pub lto_gveto: bool,
    /// External-trigger flag.
    pub xt: bool,
}

impl CaloRecord {
    /// True when no activity was recorded.
    pub fn is_empty(&self) -> bool {
        self.zoning_word == [0; NSIDES]
            && self.multiplicity_side == [0; NSIDES]
            && !self.lto_side.iter().any(|&b| b)
            && self.multiplicity_gveto == 0
            && !self.lto_gveto
            && !self.xt
    }

    /// ORs another record's activity into this one, keeping the larger
    /// multiplicities.
    pub fn merge(&mut self, other: &CaloRecord) {
        for side in 0..NSIDES {
            self.zoning_word[side] |= other.zoning_word[side];
            self.multiplicity_side[side] = self.multiplicity_side[side].max(other.multiplicity_side[side]);
            self.lto_side[side] |= other.lto_side[side];
        }
        self.multiplicity_gveto = self.multiplicity_gveto.max(other.multiplicity_gveto);
        self.lto_gveto |= other.lto_gveto;
        self.xt |= other.xt;
    }
}

/// Calorimeter record plus the per-tick decision summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaloSummaryRecord {
    /// Merged calorimeter state over the sliding buffer.
    pub record: CaloRecord,
    /// Activity confined to a single side.
    pub single_side_coinc: bool,
    /// Summed multiplicity reached the configured threshold.
    pub total_multiplicity_threshold: bool,
    /// Terminal calorimeter decision for this tick.
    pub decision: bool,
}

/// Tracker state of one 1600 ns tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerRecord {
    /// Tick this record was built for; `None` before the first fill.
    pub clocktick_1600: Option<u32>,
    /// Final data per side and zone.
    pub zones: [[ZoneData; NZONES]; NSIDES],
    /// Zones with a horizontal pattern, per side.
    pub zoning_word_pattern: [u16; NSIDES],
    /// Zones with near-source activity, per side.
    pub zoning_word_near_source: [u16; NSIDES],
    /// Terminal tracker decision for this tick.
    pub decision: bool,
}

impl TrackerRecord {
    /// True when no zone carries any flag.
    pub fn is_empty(&self) -> bool {
        self.zones
            .iter()
            .all(|side| side.iter().all(|z| !z.any()))
    }
}

/// Calorimeter state projected onto the 1600 ns coincidence grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoincidenceCaloRecord {
    /// 1600 ns tick of the open gate.
    pub clocktick_1600: u32,
    /// 10-bit zone activity per side.
    pub zoning_word: [u16; NSIDES],
    /// High-threshold multiplicity per side.
    pub multiplicity_side: [u8; NSIDES],
    /// Low-threshold-only flag per side.
    pub lto_side: [bool; NSIDES],
    /// Gamma-veto multiplicity.
    pub multiplicity_gveto: u8,
    /// Gamma-veto low-threshold-only flag.
    pub lto_gveto: bool,
    /// External-trigger flag.
    pub xt: bool,
    /// Activity confined to a single side.
    pub single_side_coinc: bool,
    /// Multiplicity threshold was reached.
    pub total_multiplicity_threshold: bool,
    /// A calorimeter decision opened this gate.
    pub decision: bool,
}

/// Matched trigger mode of a coincidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerMode {
    /// Prompt calorimeter/tracker coincidence.
    Caraco,
    /// Delayed tracker/tracker coincidence.
    Ape,
    /// Delayed near-source alpha veto coincidence.
    Dave,
}

/// One matched coincidence at a 1600 ns tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoincidenceRecord {
    /// Tick the coincidence fired at.
    pub clocktick_1600: u32,
    /// Zones where calorimeter and tracker activity overlapped.
    pub zoning_word: [u16; NSIDES],
    /// Calorimeter state of the gate, if one was open.
    pub calo: CoincidenceCaloRecord,
    /// Tracker final data at the tick.
    pub tracker_zones: [[ZoneData; NZONES]; NSIDES],
    /// Matched mode.
    pub mode: TriggerMode,
}

/// Terminal per-tick trigger decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    /// Matched mode.
    pub mode: TriggerMode,
    /// Tick the decision fired at.
    pub clocktick_1600: u32,
    /// Terminal decision flag.
    pub decision: bool,
}

/// Memory of a prompt decision, kept alive for the delayed coincidence
/// lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousEventRecord {
    /// Tick of the prompt decision.
    pub clocktick_1600: u32,
    /// Remaining lifetime in 1600 ns ticks; recomputed as the scan
    /// advances, zero once expired.
    pub counter_1600: u32,
    /// Coincidence zones of the prompt decision.
    pub zoning_word: [u16; NSIDES],
    /// Calorimeter zones of the prompt decision.
    pub calo_zoning_word: [u16; NSIDES],
    /// Tracker final data of the prompt decision.
    pub tracker_zones: [[ZoneData; NZONES]; NSIDES],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_data_bit_groups() {
        let mut zone = ZoneData::default();
        zone.set(ZONE_BIT_NSZ_LEFT);
        assert!(zone.any());
        assert!(zone.near_source_any());
        assert!(!zone.pattern_any());
        assert!(!zone.horizontal_any());

        zone.set(ZONE_BIT_MIDDLE);
        assert!(zone.pattern_any());
        assert!(zone.horizontal_any());
    }

    #[test]
    fn test_calo_record_merge_keeps_maxima() {
        let mut a = CaloRecord {
            multiplicity_side: [2, 0],
            zoning_word: [0b01, 0],
            ..CaloRecord::default()
        };
        let b = CaloRecord {
            multiplicity_side: [1, 3],
            zoning_word: [0b10, 0b100],
            lto_gveto: true,
            ..CaloRecord::default()
        };
        a.merge(&b);
        assert_eq!(a.multiplicity_side, [2, 3]);
        assert_eq!(a.zoning_word, [0b11, 0b100]);
        assert!(a.lto_gveto);
    }

    #[test]
    fn test_empty_records() {
        assert!(CaloRecord::default().is_empty());
        assert!(TrackerRecord::default().is_empty());
    }
}
