//! Crate trigger word builders: trigger primitives aggregated per crate.

use febtrig_core::Error as CoreError;

use crate::calo_ctw::{CaloCtw, CaloCtwCollection, CaloCtwLayout};
use crate::calo_tp::CaloTpCollection;
use crate::error::Result;
use crate::tracker_ctw::{TrackerCtw, TrackerCtwCollection};
use crate::tracker_tp::TrackerTpCollection;

/// Aggregates the calorimeter trigger primitives of one crate.
///
/// Each builder instance emulates one control board, so it carries a
/// fixed crate number and ignores primitives of other crates.
#[derive(Debug, Clone)]
pub struct CaloCtwBuilder {
    crate_id: u8,
    initialized: bool,
}

impl CaloCtwBuilder {
    /// Creates a builder for `crate_id`, not yet initialized.
    pub fn new(crate_id: u8) -> Self {
        Self {
            crate_id,
            initialized: false,
        }
    }

    /// Marks the builder ready.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("calo ctw builder").into());
        }
        self.initialized = true;
        Ok(())
    }

    /// The crate this builder serves.
    #[inline]
    pub fn crate_id(&self) -> u8 {
        self.crate_id
    }

    /// Folds this crate's primitives into crate trigger words.
    pub fn process(&self, tps: &CaloTpCollection, ctws: &mut CaloCtwCollection) -> Result<()> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("calo ctw builder").into());
        }
        for tp in tps {
            if tp.board.crate_id != self.crate_id {
                continue;
            }
            let key = (self.crate_id, tp.clocktick_25);
            let mut applied = Ok(());
            ctws.upsert(
                key,
                || CaloCtw::new(self.crate_id, tp.clocktick_25),
                |ctw| applied = Self::fold(tp, ctw),
            );
            applied?;
        }
        ctws.check()?;
        Ok(())
    }

    fn fold(tp: &crate::calo_tp::CaloTp, ctw: &mut CaloCtw) -> Result<()> {
        match ctw.layout() {
            CaloCtwLayout::MainWall => {
                if tp.is_ht() {
                    ctw.increment_htm()?;
                    ctw.set_zone_bit(tp.board.slot_index() / 2)?;
                }
                if tp.is_lt_only() {
                    ctw.set_lto(true)?;
                }
            }
            CaloCtwLayout::XWallGveto => {
                if tp.board.board_id < 4 {
                    // X-wall boards sit in slots 0..=3, two per side.
                    let side = tp.board.board_id / 2;
                    if tp.is_ht() {
                        ctw.increment_htm_side(side)?;
                        ctw.set_xwall_zone_bit(tp.board.board_id)?;
                    }
                    if tp.is_lt_only() {
                        ctw.set_lto_side(side, true)?;
                    }
                } else {
                    if tp.is_ht() {
                        ctw.increment_htm_gveto()?;
                    }
                    if tp.is_lt_only() {
                        ctw.set_lto_gveto(true)?;
                    }
                }
            }
        }
        if tp.is_xt() {
            ctw.set_xt(true);
        }
        Ok(())
    }
}

/// Aggregates tracker trigger primitives into crate trigger words.
///
/// One builder serves all tracker crates: the primitive's self-identified
/// board routes it to the right slot, and a repeated primitive on an
/// existing (crate, tick) ORs into the stored slot.
#[derive(Debug, Clone)]
pub struct TrackerCtwBuilder {
    initialized: bool,
}

impl TrackerCtwBuilder {
    /// Creates a builder, not yet initialized.
    pub fn new() -> Self {
        Self { initialized: false }
    }

    /// Marks the builder ready.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("tracker ctw builder").into());
        }
        self.initialized = true;
        Ok(())
    }

    /// Folds the tracker primitives into crate trigger words.
    pub fn process(
        &self,
        tps: &TrackerTpCollection,
        ctws: &mut TrackerCtwCollection,
    ) -> Result<()> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("tracker ctw builder").into());
        }
        for tp in tps {
            let crate_id = tp.board.crate_id;
            let mut applied = Ok(());
            ctws.upsert(
                (crate_id, tp.clocktick_800),
                || TrackerCtw::new(crate_id, tp.clocktick_800),
                |ctw| applied = ctw.merge_board(tp.board.board_id, tp.word()),
            );
            applied?;
        }
        ctws.check()?;
        Ok(())
    }
}

impl Default for TrackerCtwBuilder {
    fn default() -> Self {
        Self::new()
    }
}
