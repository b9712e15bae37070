//! Tracker crate trigger word: 19 board slots of 100 bits each.

use serde::{Deserialize, Serialize};

use febtrig_core::address::{BoardAddress, CONTROL_BOARD_ID, TRACKER_BOARDS_PER_CRATE};

use crate::collection::{Keyed, KeyedCollection};
use crate::error::{Error, Result};
use crate::tracker_tp::{
    set_word_bits, word_bits, TRACKER_TP_HITS_OFFSET, TRACKER_TP_HITS_WIDTH,
};

/// Board slots per tracker crate trigger word.
pub const TRACKER_CTW_SLOTS: usize = TRACKER_BOARDS_PER_CRATE as usize;

/// Tracker crate trigger word.
///
/// The control board concatenates the 100-bit words of the 19 front-end
/// boards of its crate; the slot order follows the physical slots, with
/// the control board's own slot skipped in the board numbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerCtw {
    /// Emitting crate.
    pub crate_id: u8,
    /// 800 ns clocktick.
    pub clocktick_800: u32,
    slots: [u128; TRACKER_CTW_SLOTS],
}

impl TrackerCtw {
    /// Creates an all-zero word for `crate_id` at `clocktick_800`.
    pub fn new(crate_id: u8, clocktick_800: u32) -> Self {
        Self {
            crate_id,
            clocktick_800,
            slots: [0; TRACKER_CTW_SLOTS],
        }
    }

    fn slot_checked(&self, slot: usize) -> Result<usize> {
        if slot < TRACKER_CTW_SLOTS {
            Ok(slot)
        } else {
            Err(Error::InvalidBlockIndex {
                index: slot,
                max: TRACKER_CTW_SLOTS - 1,
            })
        }
    }

    /// The 100-bit word stored in `slot`.
    pub fn slot(&self, slot: usize) -> Result<u128> {
        Ok(self.slots[self.slot_checked(slot)?])
    }

    /// Replaces the word in `slot`.
    pub fn set_slot(&mut self, slot: usize, word: u128) -> Result<()> {
        let slot = self.slot_checked(slot)?;
        self.slots[slot] = word;
        Ok(())
    }

    /// ORs `word` into `slot`, preserving bits already set.
    pub fn merge_slot(&mut self, slot: usize, word: u128) -> Result<()> {
        let slot = self.slot_checked(slot)?;
        self.slots[slot] |= word;
        Ok(())
    }

    /// Reads a bit field of the word in `slot`.
    pub fn slot_bits(&self, slot: usize, offset: u32, width: u32) -> Result<u128> {
        Ok(word_bits(self.slots[self.slot_checked(slot)?], offset, width))
    }

    /// Writes a bit field of the word in `slot`.
    pub fn set_slot_bits(&mut self, slot: usize, offset: u32, width: u32, value: u128) -> Result<()> {
        let slot = self.slot_checked(slot)?;
        set_word_bits(&mut self.slots[slot], offset, width, value)
    }

    /// The word of front-end `board_id`, accounting for the control-board
    /// slot gap.
    pub fn board(&self, board_id: u8) -> Result<u128> {
        if board_id == CONTROL_BOARD_ID {
            return Err(Error::InvalidBlockIndex {
                index: usize::from(board_id),
                max: TRACKER_CTW_SLOTS - 1,
            });
        }
        self.slot(usize::from(BoardAddress::new(self.crate_id, board_id).slot_index()))
    }

    /// ORs `word` into the slot of front-end `board_id`.
    pub fn merge_board(&mut self, board_id: u8, word: u128) -> Result<()> {
        if board_id == CONTROL_BOARD_ID {
            return Err(Error::InvalidBlockIndex {
                index: usize::from(board_id),
                max: TRACKER_CTW_SLOTS - 1,
            });
        }
        self.merge_slot(
            usize::from(BoardAddress::new(self.crate_id, board_id).slot_index()),
            word,
        )
    }

    /// True when any slot carries at least one channel hit flag.
    pub fn has_trigger_primitives(&self) -> bool {
        self.slots
            .iter()
            .any(|&w| word_bits(w, TRACKER_TP_HITS_OFFSET, TRACKER_TP_HITS_WIDTH) != 0)
    }
}

impl Keyed for TrackerCtw {
    type Key = (u8, u32);

    fn key(&self) -> Self::Key {
        (self.crate_id, self.clocktick_800)
    }

    fn clocktick(&self) -> u32 {
        self.clocktick_800
    }
}

/// Per-event tracker crate trigger words, unique per (crate, tick).
pub type TrackerCtwCollection = KeyedCollection<TrackerCtw>;

/// Creates an empty tracker CTW collection.
pub fn tracker_ctw_collection() -> TrackerCtwCollection {
    KeyedCollection::new("tracker crate trigger word")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker_tp::{TrackerTp, TRACKER_TP_BOARD_ID_OFFSET, TRACKER_TP_BOARD_ID_WIDTH};

    #[test]
    fn test_slot_bits_round_trip() {
        let mut ctw = TrackerCtw::new(0, 12);
        ctw.set_slot_bits(4, 60, 5, 11).unwrap();
        ctw.set_slot_bits(4, 0, 55, 0b1010).unwrap();
        assert_eq!(ctw.slot_bits(4, 60, 5).unwrap(), 11);
        assert_eq!(ctw.slot_bits(4, 0, 55).unwrap(), 0b1010);
        assert_eq!(ctw.slot_bits(3, 60, 5).unwrap(), 0);
    }

    #[test]
    fn test_slot_index_out_of_range() {
        let ctw = TrackerCtw::new(0, 0);
        assert!(ctw.slot(TRACKER_CTW_SLOTS).is_err());
    }

    #[test]
    fn test_board_numbering_skips_control_board() {
        let mut ctw = TrackerCtw::new(1, 0);
        let tp = TrackerTp::new(BoardAddress::new(1, 11), 0);
        ctw.merge_board(11, tp.word()).unwrap();

        // Board 11 occupies slot 10; its id field reads back from the slot.
        assert_eq!(
            ctw.slot_bits(10, TRACKER_TP_BOARD_ID_OFFSET, TRACKER_TP_BOARD_ID_WIDTH)
                .unwrap(),
            11
        );
        assert!(ctw.merge_board(CONTROL_BOARD_ID, 1).is_err());
    }

    #[test]
    fn test_trigger_primitive_scan_ignores_header_fields() {
        let mut ctw = TrackerCtw::new(0, 0);
        let tp = TrackerTp::new(BoardAddress::new(0, 7), 0);
        ctw.merge_board(7, tp.word()).unwrap();
        // Board/crate id fields alone are not hits.
        assert!(!ctw.has_trigger_primitives());

        let mut tp = tp;
        tp.set_channel_hit(12).unwrap();
        ctw.merge_board(7, tp.word()).unwrap();
        assert!(ctw.has_trigger_primitives());
    }
}
