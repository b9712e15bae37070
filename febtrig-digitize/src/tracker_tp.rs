//! Tracker trigger primitive: the self-identifying 100-bit board word.

use serde::{Deserialize, Serialize};

use febtrig_core::BoardAddress;

use crate::collection::{Keyed, KeyedCollection};
use crate::error::{Error, Result};

/// Width of the full tracker board word.
pub const TRACKER_TP_WORD_BITS: u32 = 100;
/// Per-channel hit flags start.
pub const TRACKER_TP_HITS_OFFSET: u32 = 0;
/// Per-channel hit flags width (channels 0..=35 used in three-wires mode).
pub const TRACKER_TP_HITS_WIDTH: u32 = 55;
/// Hardware status field start (TRM0..2, spare, TTM).
pub const TRACKER_TP_STATUS_OFFSET: u32 = 55;
/// Hardware status field width.
pub const TRACKER_TP_STATUS_WIDTH: u32 = 5;
/// Board-id field start.
pub const TRACKER_TP_BOARD_ID_OFFSET: u32 = 60;
/// Board-id field width.
pub const TRACKER_TP_BOARD_ID_WIDTH: u32 = 5;
/// Crate-id field start.
pub const TRACKER_TP_CRATE_ID_OFFSET: u32 = 65;
/// Crate-id field width.
pub const TRACKER_TP_CRATE_ID_WIDTH: u32 = 2;
/// Trigger-tick-id field start.
pub const TRACKER_TP_TTID_OFFSET: u32 = 67;
/// Trigger-tick-id field width.
pub const TRACKER_TP_TTID_WIDTH: u32 = 15;
/// Control field start.
pub const TRACKER_TP_CONTROL_OFFSET: u32 = 82;
/// Control field width.
pub const TRACKER_TP_CONTROL_WIDTH: u32 = 18;

/// Writes `value` into `width` bits of `word` starting at `offset`.
///
/// Fails when the value does not fit the field. Offsets beyond bit 99 are
/// a programming error and fail the same way.
pub fn set_word_bits(word: &mut u128, offset: u32, width: u32, value: u128) -> Result<()> {
    if offset + width > TRACKER_TP_WORD_BITS || (width < 128 && value >> width != 0) {
        return Err(Error::ValueTooWide { value, width });
    }
    let mask = ((1u128 << width) - 1) << offset;
    *word = (*word & !mask) | (value << offset);
    Ok(())
}

/// Reads `width` bits of `word` starting at `offset`.
#[inline]
pub fn word_bits(word: u128, offset: u32, width: u32) -> u128 {
    (word >> offset) & ((1u128 << width) - 1)
}

/// Tracker trigger primitive.
///
/// One 800 ns tick of one front-end board. The word carries its own
/// board and crate ids so a crate trigger word slot can be decoded
/// without external context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerTp {
    /// Emitting front-end board.
    pub board: BoardAddress,
    /// 800 ns clocktick, front-end latency included.
    pub clocktick_800: u32,
    word: u128,
}

impl TrackerTp {
    /// Creates a primitive with the board/crate id fields written and no
    /// channel hit.
    pub fn new(board: BoardAddress, clocktick_800: u32) -> Self {
        let mut word = 0u128;
        // Board ids fit 5 bits (0..=19) and crate ids 2 bits (0..=2),
        // so the writes cannot fail.
        let _ = set_word_bits(
            &mut word,
            TRACKER_TP_BOARD_ID_OFFSET,
            TRACKER_TP_BOARD_ID_WIDTH,
            u128::from(board.board_id),
        );
        let _ = set_word_bits(
            &mut word,
            TRACKER_TP_CRATE_ID_OFFSET,
            TRACKER_TP_CRATE_ID_WIDTH,
            u128::from(board.crate_id),
        );
        Self {
            board,
            clocktick_800,
            word,
        }
    }

    /// The raw 100-bit word.
    #[inline]
    pub fn word(&self) -> u128 {
        self.word
    }

    /// Writes a bit field of the word.
    pub fn set_bits(&mut self, offset: u32, width: u32, value: u128) -> Result<()> {
        set_word_bits(&mut self.word, offset, width, value)
    }

    /// Reads a bit field of the word.
    #[inline]
    pub fn bits(&self, offset: u32, width: u32) -> u128 {
        word_bits(self.word, offset, width)
    }

    /// Flags a hit on front-end `channel`.
    pub fn set_channel_hit(&mut self, channel: u8) -> Result<()> {
        set_word_bits(&mut self.word, u32::from(channel), 1, 1)
    }

    /// True when `channel` carries a hit.
    #[inline]
    pub fn channel_hit(&self, channel: u8) -> bool {
        word_bits(self.word, u32::from(channel), 1) != 0
    }

    /// True when any channel flag is set.
    pub fn has_hits(&self) -> bool {
        self.bits(TRACKER_TP_HITS_OFFSET, TRACKER_TP_HITS_WIDTH) != 0
    }

    /// Board id read back from the word.
    #[inline]
    pub fn board_id_field(&self) -> u8 {
        self.bits(TRACKER_TP_BOARD_ID_OFFSET, TRACKER_TP_BOARD_ID_WIDTH) as u8
    }

    /// Crate id read back from the word.
    #[inline]
    pub fn crate_id_field(&self) -> u8 {
        self.bits(TRACKER_TP_CRATE_ID_OFFSET, TRACKER_TP_CRATE_ID_WIDTH) as u8
    }

    /// Writes the trigger-tick-id field.
    pub fn set_ttid(&mut self, ttid: u16) -> Result<()> {
        self.set_bits(TRACKER_TP_TTID_OFFSET, TRACKER_TP_TTID_WIDTH, u128::from(ttid))
    }
}

impl Keyed for TrackerTp {
    type Key = (BoardAddress, u32);

    fn key(&self) -> Self::Key {
        (self.board, self.clocktick_800)
    }

    fn clocktick(&self) -> u32 {
        self.clocktick_800
    }
}

/// Per-event tracker trigger primitives, unique per (board, tick).
pub type TrackerTpCollection = KeyedCollection<TrackerTp>;

/// Creates an empty tracker TP collection.
pub fn tracker_tp_collection() -> TrackerTpCollection {
    KeyedCollection::new("tracker trigger primitive")
}
