//! Calorimeter trigger stage, clocked at 25 ns.

use std::collections::VecDeque;

use febtrig_core::Error as CoreError;
use febtrig_digitize::calo_ctw::{CaloCtw, CaloCtwLayout};

use crate::config::TriggerConfig;
use crate::error::Result;
use crate::record::{CaloRecord, CaloSummaryRecord, NSIDES};

/// Per-tick calorimeter decision stage.
///
/// Each tick's crate trigger words are folded into a calorimeter record;
/// a sliding buffer retains the last few records so a pulse spread over
/// adjacent ticks is still seen as one coincidence, and the merged view
/// is thresholded into the per-tick decision.
#[derive(Debug, Clone)]
pub struct CaloTriggerStage {
    config: TriggerConfig,
    buffer: VecDeque<CaloRecord>,
    initialized: bool,
}

impl CaloTriggerStage {
    /// Creates a stage, not yet initialized.
    pub fn new(config: TriggerConfig) -> Self {
        let depth = config.calo_buffer_depth;
        Self {
            config,
            buffer: VecDeque::with_capacity(depth),
            initialized: false,
        }
    }

    /// Marks the stage ready.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("calo trigger stage").into());
        }
        self.initialized = true;
        Ok(())
    }

    /// Clears the sliding buffer between events.
    pub fn reset_data(&mut self) {
        self.buffer.clear();
    }

    /// Processes one 25 ns tick. `ctws` holds the crate trigger words
    /// stamped with `clocktick_25`; an absent tick passes an empty slice.
    pub fn process(&mut self, ctws: &[&CaloCtw], clocktick_25: u32) -> Result<CaloSummaryRecord> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("calo trigger stage").into());
        }
        let mut record = CaloRecord {
            clocktick_25: Some(clocktick_25),
            ..CaloRecord::default()
        };
        for ctw in ctws {
            Self::fold(ctw, &mut record)?;
        }

        if self.buffer.len() == self.config.calo_buffer_depth {
            self.buffer.pop_front();
        }
        self.buffer.push_back(record);

        Ok(self.summarize(clocktick_25))
    }

    fn fold(ctw: &CaloCtw, record: &mut CaloRecord) -> Result<()> {
        match ctw.layout() {
            CaloCtwLayout::MainWall => {
                let side = usize::from(ctw.crate_id);
                record.zoning_word[side] |= ctw.zoning_word()?;
                record.multiplicity_side[side] =
                    (record.multiplicity_side[side] + ctw.htm()?).min(3);
                record.lto_side[side] |= ctw.lto()?;
            }
            CaloCtwLayout::XWallGveto => {
                for side in 0..NSIDES {
                    let side_u8 = side as u8;
                    record.multiplicity_side[side] =
                        (record.multiplicity_side[side] + ctw.htm_side(side_u8)?).min(3);
                    record.lto_side[side] |= ctw.lto_side(side_u8)?;
                }
                record.multiplicity_gveto =
                    (record.multiplicity_gveto + ctw.htm_gveto()?).min(3);
                record.lto_gveto |= ctw.lto_gveto()?;
            }
        }
        record.xt |= ctw.xt();
        Ok(())
    }

    fn summarize(&self, clocktick_25: u32) -> CaloSummaryRecord {
        let mut merged = CaloRecord {
            clocktick_25: Some(clocktick_25),
            ..CaloRecord::default()
        };
        for buffered in &self.buffer {
            merged.merge(buffered);
        }

        let side_active: Vec<bool> = (0..NSIDES)
            .map(|s| merged.zoning_word[s] != 0 || merged.multiplicity_side[s] != 0)
            .collect();
        let single_side = side_active.iter().filter(|&&a| a).count() == 1;
        let both_side = side_active.iter().all(|&a| a);
        let total_multiplicity =
            merged.multiplicity_side.iter().map(|&m| u32::from(m)).sum::<u32>();
        let threshold_ok =
            total_multiplicity >= u32::from(self.config.calo_multiplicity_threshold);

        let decision = threshold_ok
            && !(single_side && self.config.inhibit_single_side)
            && !(both_side && self.config.inhibit_both_side);

        CaloSummaryRecord {
            record: merged,
            single_side_coinc: single_side,
            total_multiplicity_threshold: threshold_ok,
            decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_stage(config: TriggerConfig) -> CaloTriggerStage {
        let mut stage = CaloTriggerStage::new(config);
        stage.initialize().unwrap();
        stage
    }

    fn ht_ctw(crate_id: u8, clocktick: u32, zone: u8) -> CaloCtw {
        let mut ctw = CaloCtw::new(crate_id, clocktick);
        ctw.increment_htm().unwrap();
        ctw.set_zone_bit(zone).unwrap();
        ctw
    }

    #[test]
    fn test_single_ht_fires_the_default_threshold() {
        let mut stage = ready_stage(TriggerConfig::default());
        let ctw = ht_ctw(0, 120, 4);
        let summary = stage.process(&[&ctw], 120).unwrap();

        assert!(summary.decision);
        assert!(summary.total_multiplicity_threshold);
        assert!(summary.single_side_coinc);
        assert_eq!(summary.record.zoning_word[0], 1 << 4);
    }

    #[test]
    fn test_empty_tick_keeps_buffered_activity_alive() {
        let mut stage = ready_stage(TriggerConfig::default());
        let ctw = ht_ctw(1, 50, 7);
        stage.process(&[&ctw], 50).unwrap();

        // Three following empty ticks still see the pulse through the
        // depth-4 buffer; the fourth does not.
        for tick in 51..=53 {
            assert!(stage.process(&[], tick).unwrap().decision);
        }
        assert!(!stage.process(&[], 54).unwrap().decision);
    }

    #[test]
    fn test_single_side_inhibit() {
        let config = TriggerConfig {
            inhibit_single_side: true,
            ..TriggerConfig::default()
        };
        let mut stage = ready_stage(config);
        let ctw = ht_ctw(0, 10, 0);
        assert!(!stage.process(&[&ctw], 10).unwrap().decision);

        let other_side = ht_ctw(1, 11, 0);
        let summary = stage.process(&[&other_side], 11).unwrap();
        assert!(!summary.single_side_coinc);
        assert!(summary.decision);
    }

    #[test]
    fn test_multiplicity_threshold_of_two() {
        let config = TriggerConfig {
            calo_multiplicity_threshold: 2,
            ..TriggerConfig::default()
        };
        let mut stage = ready_stage(config);
        let a = ht_ctw(0, 5, 1);
        assert!(!stage.process(&[&a], 5).unwrap().decision);

        stage.reset_data();
        let b = ht_ctw(1, 5, 2);
        assert!(stage.process(&[&a, &b], 5).unwrap().decision);
    }

    #[test]
    fn test_reset_data_clears_the_buffer() {
        let mut stage = ready_stage(TriggerConfig::default());
        let ctw = ht_ctw(0, 1, 0);
        stage.process(&[&ctw], 1).unwrap();
        stage.reset_data();
        assert!(!stage.process(&[], 2).unwrap().decision);
    }
}
