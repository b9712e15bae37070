//! Calorimeter crate trigger word: one crate, one 25 ns tick, 18 bits.
//!
//! The two main-wall crates and the x-wall/gamma-veto crate ship the same
//! 18-bit frame with different field layouts, so every field accessor is
//! guarded by the crate layout.

use serde::{Deserialize, Serialize};

use crate::collection::{Keyed, KeyedCollection};
use crate::error::{Error, Result};

/// Word width on the wire.
pub const CALO_CTW_BITS: u32 = 18;
/// Main-wall zone count.
pub const CALO_CTW_ZONES: u8 = 10;
/// X-wall zone count.
pub const CALO_CTW_XWALL_ZONES: u8 = 4;
/// Saturation value of the 2-bit multiplicity fields.
pub const CALO_CTW_HTM_MAX: u8 = 3;

const XT_BIT: u32 = 13;
const CONTROL_OFFSET: u32 = 14;
const CONTROL_WIDTH: u32 = 4;
// Main-wall layout.
const MW_HTM_OFFSET: u32 = 0;
const MW_ZONING_OFFSET: u32 = 2;
const MW_LTO_BIT: u32 = 12;
// X-wall / gamma-veto layout.
const XG_HTM_SIDE_OFFSET: u32 = 0;
const XG_HTM_GVETO_OFFSET: u32 = 4;
const XG_ZONING_OFFSET: u32 = 6;
const XG_LTO_SIDE_OFFSET: u32 = 10;
const XG_LTO_GVETO_BIT: u32 = 12;

/// Field layout of a calorimeter crate trigger word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaloCtwLayout {
    /// Main calorimeter wall (crates 0 and 1).
    MainWall,
    /// X-wall plus gamma veto (crate 2).
    XWallGveto,
}

impl CaloCtwLayout {
    /// The layout wired to `crate_id`.
    pub fn for_crate(crate_id: u8) -> Self {
        if crate_id == febtrig_core::address::XWALL_GVETO_CRATE {
            CaloCtwLayout::XWallGveto
        } else {
            CaloCtwLayout::MainWall
        }
    }
}

/// Calorimeter crate trigger word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaloCtw {
    /// Emitting crate.
    pub crate_id: u8,
    /// 25 ns clocktick.
    pub clocktick_25: u32,
    layout: CaloCtwLayout,
    word: u32,
}

impl CaloCtw {
    /// Creates an all-zero word for `crate_id` at `clocktick_25`.
    pub fn new(crate_id: u8, clocktick_25: u32) -> Self {
        Self {
            crate_id,
            clocktick_25,
            layout: CaloCtwLayout::for_crate(crate_id),
            word: 0,
        }
    }

    /// This word's field layout.
    #[inline]
    pub fn layout(&self) -> CaloCtwLayout {
        self.layout
    }

    /// The raw 18-bit frame.
    #[inline]
    pub fn word(&self) -> u32 {
        self.word & ((1 << CALO_CTW_BITS) - 1)
    }

    fn require(&self, layout: CaloCtwLayout, field: &'static str) -> Result<()> {
        if self.layout == layout {
            Ok(())
        } else {
            Err(Error::LayoutMismatch {
                crate_id: self.crate_id,
                field,
            })
        }
    }

    fn field(&self, offset: u32, width: u32) -> u32 {
        (self.word >> offset) & ((1 << width) - 1)
    }

    fn set_field(&mut self, offset: u32, width: u32, value: u32) {
        let mask = ((1 << width) - 1) << offset;
        self.word = (self.word & !mask) | ((value << offset) & mask);
    }

    fn bump_multiplicity(&mut self, offset: u32) {
        let current = self.field(offset, 2) as u8;
        if current < CALO_CTW_HTM_MAX {
            self.set_field(offset, 2, u32::from(current + 1));
        }
    }

    // Fields shared by both layouts.

    /// External-trigger flag.
    #[inline]
    pub fn xt(&self) -> bool {
        self.field(XT_BIT, 1) != 0
    }

    /// Sets the external-trigger flag.
    pub fn set_xt(&mut self, value: bool) {
        self.set_field(XT_BIT, 1, u32::from(value));
    }

    /// The 4-bit control field.
    #[inline]
    pub fn control(&self) -> u32 {
        self.field(CONTROL_OFFSET, CONTROL_WIDTH)
    }

    /// Sets the 4-bit control field.
    pub fn set_control(&mut self, value: u32) {
        self.set_field(CONTROL_OFFSET, CONTROL_WIDTH, value);
    }

    // Main-wall layout.

    /// High-threshold multiplicity (saturating at 3).
    pub fn htm(&self) -> Result<u8> {
        self.require(CaloCtwLayout::MainWall, "htm")?;
        Ok(self.field(MW_HTM_OFFSET, 2) as u8)
    }

    /// Counts one more high-threshold primitive, saturating at 3.
    pub fn increment_htm(&mut self) -> Result<()> {
        self.require(CaloCtwLayout::MainWall, "htm")?;
        self.bump_multiplicity(MW_HTM_OFFSET);
        Ok(())
    }

    /// Flags activity in main-wall `zone` (0..=9).
    pub fn set_zone_bit(&mut self, zone: u8) -> Result<()> {
        self.require(CaloCtwLayout::MainWall, "zoning")?;
        if zone >= CALO_CTW_ZONES {
            return Err(Error::InvalidBlockIndex {
                index: usize::from(zone),
                max: usize::from(CALO_CTW_ZONES - 1),
            });
        }
        self.set_field(MW_ZONING_OFFSET + u32::from(zone), 1, 1);
        Ok(())
    }

    /// True when main-wall `zone` fired.
    pub fn zone_bit(&self, zone: u8) -> Result<bool> {
        self.require(CaloCtwLayout::MainWall, "zoning")?;
        Ok(self.field(MW_ZONING_OFFSET + u32::from(zone), 1) != 0)
    }

    /// The 10-bit main-wall zoning word.
    pub fn zoning_word(&self) -> Result<u16> {
        self.require(CaloCtwLayout::MainWall, "zoning")?;
        Ok(self.field(MW_ZONING_OFFSET, u32::from(CALO_CTW_ZONES)) as u16)
    }

    /// Low-threshold-only flag.
    pub fn lto(&self) -> Result<bool> {
        self.require(CaloCtwLayout::MainWall, "lto")?;
        Ok(self.field(MW_LTO_BIT, 1) != 0)
    }

    /// Sets the low-threshold-only flag.
    pub fn set_lto(&mut self, value: bool) -> Result<()> {
        self.require(CaloCtwLayout::MainWall, "lto")?;
        self.set_field(MW_LTO_BIT, 1, u32::from(value));
        Ok(())
    }

    // X-wall / gamma-veto layout.

    /// X-wall high-threshold multiplicity for `side`.
    pub fn htm_side(&self, side: u8) -> Result<u8> {
        self.require(CaloCtwLayout::XWallGveto, "htm per side")?;
        Ok(self.field(XG_HTM_SIDE_OFFSET + u32::from(side) * 2, 2) as u8)
    }

    /// Counts one more x-wall high-threshold primitive on `side`.
    pub fn increment_htm_side(&mut self, side: u8) -> Result<()> {
        self.require(CaloCtwLayout::XWallGveto, "htm per side")?;
        self.bump_multiplicity(XG_HTM_SIDE_OFFSET + u32::from(side) * 2);
        Ok(())
    }

    /// Gamma-veto high-threshold multiplicity.
    pub fn htm_gveto(&self) -> Result<u8> {
        self.require(CaloCtwLayout::XWallGveto, "gveto htm")?;
        Ok(self.field(XG_HTM_GVETO_OFFSET, 2) as u8)
    }

    /// Counts one more gamma-veto high-threshold primitive.
    pub fn increment_htm_gveto(&mut self) -> Result<()> {
        self.require(CaloCtwLayout::XWallGveto, "gveto htm")?;
        self.bump_multiplicity(XG_HTM_GVETO_OFFSET);
        Ok(())
    }

    /// Flags activity in x-wall `zone` (0..=3).
    pub fn set_xwall_zone_bit(&mut self, zone: u8) -> Result<()> {
        self.require(CaloCtwLayout::XWallGveto, "xwall zoning")?;
        if zone >= CALO_CTW_XWALL_ZONES {
            return Err(Error::InvalidBlockIndex {
                index: usize::from(zone),
                max: usize::from(CALO_CTW_XWALL_ZONES - 1),
            });
        }
        self.set_field(XG_ZONING_OFFSET + u32::from(zone), 1, 1);
        Ok(())
    }

    /// The 4-bit x-wall zoning word.
    pub fn xwall_zoning_word(&self) -> Result<u8> {
        self.require(CaloCtwLayout::XWallGveto, "xwall zoning")?;
        Ok(self.field(XG_ZONING_OFFSET, u32::from(CALO_CTW_XWALL_ZONES)) as u8)
    }

    /// X-wall low-threshold-only flag for `side`.
    pub fn lto_side(&self, side: u8) -> Result<bool> {
        self.require(CaloCtwLayout::XWallGveto, "lto per side")?;
        Ok(self.field(XG_LTO_SIDE_OFFSET + u32::from(side), 1) != 0)
    }

    /// Sets the x-wall low-threshold-only flag for `side`.
    pub fn set_lto_side(&mut self, side: u8, value: bool) -> Result<()> {
        self.require(CaloCtwLayout::XWallGveto, "lto per side")?;
        self.set_field(XG_LTO_SIDE_OFFSET + u32::from(side), 1, u32::from(value));
        Ok(())
    }

    /// Gamma-veto low-threshold-only flag.
    pub fn lto_gveto(&self) -> Result<bool> {
        self.require(CaloCtwLayout::XWallGveto, "gveto lto")?;
        Ok(self.field(XG_LTO_GVETO_BIT, 1) != 0)
    }

    /// Sets the gamma-veto low-threshold-only flag.
    pub fn set_lto_gveto(&mut self, value: bool) -> Result<()> {
        self.require(CaloCtwLayout::XWallGveto, "gveto lto")?;
        self.set_field(XG_LTO_GVETO_BIT, 1, u32::from(value));
        Ok(())
    }
}

impl Keyed for CaloCtw {
    type Key = (u8, u32);

    fn key(&self) -> Self::Key {
        (self.crate_id, self.clocktick_25)
    }

    fn clocktick(&self) -> u32 {
        self.clocktick_25
    }
}

/// Per-event calorimeter crate trigger words, unique per (crate, tick).
pub type CaloCtwCollection = KeyedCollection<CaloCtw>;

/// Creates an empty calorimeter CTW collection.
pub fn calo_ctw_collection() -> CaloCtwCollection {
    KeyedCollection::new("calo crate trigger word")
}
