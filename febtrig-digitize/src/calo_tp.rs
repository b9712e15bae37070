//! Calorimeter trigger primitive: one front-end board, one 25 ns tick.

use serde::{Deserialize, Serialize};

use febtrig_core::BoardAddress;

use crate::collection::{Keyed, KeyedCollection};

/// Low-threshold bit.
pub const CALO_TP_LT_BIT: u8 = 0;
/// High-threshold bit.
pub const CALO_TP_HT_BIT: u8 = 1;
/// External-trigger bit.
pub const CALO_TP_XT_BIT: u8 = 2;
/// Spare bit.
pub const CALO_TP_SPARE_BIT: u8 = 3;
/// Status word width.
pub const CALO_TP_WORD_BITS: u8 = 5;

/// Calorimeter trigger primitive.
///
/// The hardware ships a 5-bit status word; the summed analog amplitude is
/// retained alongside so a later contribution on the same (board, tick)
/// can re-evaluate both threshold bits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaloTp {
    /// Emitting front-end board.
    pub board: BoardAddress,
    /// 25 ns clocktick, front-end latency included.
    pub clocktick_25: u32,
    word: u8,
    amplitude: f64,
}

impl CaloTp {
    /// Creates an all-zero primitive for `board` at `clocktick_25`.
    pub fn new(board: BoardAddress, clocktick_25: u32) -> Self {
        Self {
            board,
            clocktick_25,
            word: 0,
            amplitude: 0.0,
        }
    }

    /// Adds an amplitude contribution and re-evaluates the threshold bits
    /// against `low` / `high` (mV). XT and spare flags OR in.
    pub fn update(&mut self, amplitude: f64, xt: bool, spare: bool, low: f64, high: f64) {
        self.amplitude += amplitude;
        self.set_bit(CALO_TP_LT_BIT, self.amplitude >= low);
        self.set_bit(CALO_TP_HT_BIT, self.amplitude >= high);
        if xt {
            self.set_bit(CALO_TP_XT_BIT, true);
        }
        if spare {
            self.set_bit(CALO_TP_SPARE_BIT, true);
        }
    }

    /// Summed amplitude, mV.
    #[inline]
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// The raw 5-bit status word.
    #[inline]
    pub fn word(&self) -> u8 {
        self.word & ((1 << CALO_TP_WORD_BITS) - 1)
    }

    /// Low-threshold flag.
    #[inline]
    pub fn is_lt(&self) -> bool {
        self.bit(CALO_TP_LT_BIT)
    }

    /// High-threshold flag.
    #[inline]
    pub fn is_ht(&self) -> bool {
        self.bit(CALO_TP_HT_BIT)
    }

    /// Low threshold crossed without the high threshold.
    #[inline]
    pub fn is_lt_only(&self) -> bool {
        self.is_lt() && !self.is_ht()
    }

    /// External-trigger flag.
    #[inline]
    pub fn is_xt(&self) -> bool {
        self.bit(CALO_TP_XT_BIT)
    }

    fn set_bit(&mut self, bit: u8, value: bool) {
        if value {
            self.word |= 1 << bit;
        } else {
            self.word &= !(1 << bit);
        }
    }

    fn bit(&self, bit: u8) -> bool {
        self.word & (1 << bit) != 0
    }
}

impl Keyed for CaloTp {
    type Key = (BoardAddress, u32);

    fn key(&self) -> Self::Key {
        (self.board, self.clocktick_25)
    }

    fn clocktick(&self) -> u32 {
        self.clocktick_25
    }
}

/// Per-event calorimeter trigger primitives, unique per (board, tick).
pub type CaloTpCollection = KeyedCollection<CaloTp>;

/// Creates an empty calorimeter TP collection.
pub fn calo_tp_collection() -> CaloTpCollection {
    KeyedCollection::new("calo trigger primitive")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> BoardAddress {
        BoardAddress::new(0, 4)
    }

    #[test]
    fn test_threshold_bits_follow_summed_amplitude() {
        let mut tp = CaloTp::new(board(), 155);
        tp.update(35.0, false, false, 30.0, 50.0);
        assert!(tp.is_lt());
        assert!(!tp.is_ht());
        assert!(tp.is_lt_only());

        // A second contribution pushes the sum over the high threshold.
        tp.update(35.0, false, false, 30.0, 50.0);
        assert!(tp.is_ht());
        assert!(!tp.is_lt_only());
        assert_eq!(tp.amplitude(), 70.0);
    }

    #[test]
    fn test_xt_flag_ors_in() {
        let mut tp = CaloTp::new(board(), 0);
        tp.update(100.0, true, false, 30.0, 50.0);
        tp.update(10.0, false, false, 30.0, 50.0);
        assert!(tp.is_xt());
    }

    #[test]
    fn test_collection_key_is_board_and_tick() {
        let mut tps = calo_tp_collection();
        for _ in 0..3 {
            tps.upsert(
                (board(), 155),
                || CaloTp::new(board(), 155),
                |tp| tp.update(100.0, false, false, 30.0, 50.0),
            );
        }
        tps.upsert(
            (board(), 156),
            || CaloTp::new(board(), 156),
            |tp| tp.update(100.0, false, false, 30.0, 50.0),
        );

        assert_eq!(tps.len(), 2);
        assert_eq!(tps.get(&(board(), 155)).unwrap().amplitude(), 300.0);
    }
}
