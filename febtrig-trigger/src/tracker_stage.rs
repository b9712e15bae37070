//! Tracker trigger stage, clocked at 1600 ns.
//!
//! Crate trigger words are decoded back into a cell hit matrix, the
//! matrix is projected onto overlapping sliding zones, and the sliding
//! zones are classified into per-zone track patterns through the
//! programmable memories.

use std::sync::Arc;

use febtrig_core::address::{
    BoardAddress, ChannelAddress, CONTROL_BOARD_ID, TRACKER_BOARD_CHANNELS,
};
use febtrig_core::{AddressingMode, ElectronicMapping, Error as CoreError, HitCategory};
use febtrig_digitize::tracker_ctw::{TrackerCtw, TRACKER_CTW_SLOTS};
use febtrig_digitize::tracker_tp::{
    word_bits, TRACKER_TP_BOARD_ID_OFFSET, TRACKER_TP_BOARD_ID_WIDTH, TRACKER_TP_HITS_OFFSET,
    TRACKER_TP_HITS_WIDTH,
};

use crate::error::Result;
use crate::memory::PatternMemory;
use crate::record::{
    TrackerRecord, ZoneData, NSIDES, NZONES, ZONE_BIT_INNER, ZONE_BIT_LEFT, ZONE_BIT_MIDDLE,
    ZONE_BIT_NSZ_LEFT, ZONE_BIT_NSZ_RIGHT, ZONE_BIT_OUTER, ZONE_BIT_RIGHT,
};

/// Tracker cell layers per side.
pub const NLAYERS: usize = febtrig_core::address::TRACKER_LAYERS as usize;
/// Tracker cell rows per side.
pub const NROWS: usize = febtrig_core::address::TRACKER_ROWS as usize;
/// Overlapping sliding zones per side.
pub const NSLZONES: usize = 31;
/// Rows covered by one trigger zone.
pub const ZONE_ROWS: usize = 12;
/// Innermost layers counted for the near-source flags.
pub const NEAR_SOURCE_LAYERS: usize = 4;

/// First row of trigger zone `zone`.
#[inline]
pub fn zone_start_row(zone: usize) -> usize {
    zone * ZONE_ROWS
}

/// Last row of trigger zone `zone`.
#[inline]
pub fn zone_stop_row(zone: usize) -> usize {
    (zone * ZONE_ROWS + ZONE_ROWS - 1).min(NROWS - 1)
}

/// Row width of trigger zone `zone`.
#[inline]
pub fn zone_width(zone: usize) -> usize {
    zone_stop_row(zone) - zone_start_row(zone) + 1
}

/// Last row of sliding zone `szone`; the tail zones saturate at the
/// detector edge.
#[inline]
pub fn sliding_zone_stop_row(szone: usize) -> usize {
    (4 + szone * 4).min(NROWS - 1)
}

/// First row of sliding zone `szone`.
#[inline]
pub fn sliding_zone_start_row(szone: usize) -> usize {
    if szone == 0 {
        0
    } else {
        sliding_zone_stop_row(szone).saturating_sub(7)
    }
}

/// The five programmable memories of the tracker stage.
#[derive(Debug, Clone)]
pub struct TrackerMemories {
    /// Sliding-zone layer projection classifier (9 -> 2).
    pub sliding_zone_vertical: PatternMemory,
    /// Sliding-zone row projection classifier (8 -> 2).
    pub sliding_zone_horizontal: PatternMemory,
    /// Zone inner/outer classifier (8 -> 2).
    pub zone_vertical: PatternMemory,
    /// Zone left/middle/right classifier (8 -> 3).
    pub zone_horizontal: PatternMemory,
    /// Fallback left/middle/right classifier fed by the vertical
    /// projections (8 -> 3).
    pub zone_vertical_for_horizontal: PatternMemory,
}

impl TrackerMemories {
    /// Builds the nominal firmware content programmatically, so the
    /// stage runs without external memory files.
    pub fn nominal() -> Result<Self> {
        let mut sliding_zone_vertical = PatternMemory::new(9, 2)?;
        sliding_zone_vertical.fill_with(|addr| {
            let inner = u16::from(addr & 0b0_0000_1111 != 0);
            let outer = u16::from(addr & 0b1_1111_0000 != 0) << 1;
            inner | outer
        })?;

        let mut sliding_zone_horizontal = PatternMemory::new(8, 2)?;
        sliding_zone_horizontal.fill_with(|addr| {
            let left = u16::from(addr & 0x0f != 0);
            let right = u16::from(addr & 0xf0 != 0) << 1;
            left | right
        })?;

        // Zone addresses concatenate the four sliding-zone projections,
        // the outermost sliding zone in the low bit pair.
        let mut zone_vertical = PatternMemory::new(8, 2)?;
        zone_vertical.fill_with(|addr| {
            let inner = u16::from(addr & 0b0101_0101 != 0);
            let outer = u16::from(addr & 0b1010_1010 != 0) << 1;
            inner | outer
        })?;

        let mut zone_horizontal = PatternMemory::new(8, 3)?;
        zone_horizontal.fill_with(|addr| {
            let mut data = 0u16;
            for bit in 0..8u16 {
                if addr & (1 << bit) == 0 {
                    continue;
                }
                // Ordinal position across the zone, left to right.
                let ordinal = (3 - bit / 2) * 2 + (bit % 2);
                match ordinal {
                    0..=2 => data |= 0b100,
                    3..=4 => data |= 0b010,
                    _ => data |= 0b001,
                }
            }
            data
        })?;

        let mut zone_vertical_for_horizontal = PatternMemory::new(8, 3)?;
        zone_vertical_for_horizontal.fill_with(|addr| u16::from(addr != 0) << 1)?;

        Ok(Self {
            sliding_zone_vertical,
            sliding_zone_horizontal,
            zone_vertical,
            zone_horizontal,
            zone_vertical_for_horizontal,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SlidingZoneProj {
    io: u8,
    lr: u8,
}

/// Per-tick tracker decision stage.
pub struct TrackerTriggerStage {
    mapping: Option<Arc<dyn ElectronicMapping>>,
    memories: TrackerMemories,
    initialized: bool,
    matrix: [[[bool; NROWS]; NLAYERS]; NSIDES],
    sliding: [[SlidingZoneProj; NSLZONES]; NSIDES],
}

impl TrackerTriggerStage {
    /// Creates a stage with the given memories, not yet initialized.
    pub fn new(memories: TrackerMemories) -> Self {
        Self {
            mapping: None,
            memories,
            initialized: false,
            matrix: [[[false; NROWS]; NLAYERS]; NSIDES],
            sliding: [[SlidingZoneProj::default(); NSLZONES]; NSIDES],
        }
    }

    /// Wires in the cabling collaborator.
    pub fn set_mapping(&mut self, mapping: Arc<dyn ElectronicMapping>) {
        self.mapping = Some(mapping);
    }

    /// Marks the stage ready; fails when the cabling is missing.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("tracker trigger stage").into());
        }
        if self.mapping.is_none() {
            return Err(CoreError::MissingCollaborator("electronic mapping").into());
        }
        self.initialized = true;
        Ok(())
    }

    /// Clears the cell matrix and projections between ticks.
    pub fn reset_data(&mut self) {
        self.matrix = [[[false; NROWS]; NLAYERS]; NSIDES];
        self.sliding = [[SlidingZoneProj::default(); NSLZONES]; NSIDES];
    }

    /// The cell hit matrix decoded from the last processed tick.
    pub fn cell_matrix(&self) -> &[[[bool; NROWS]; NLAYERS]; NSIDES] {
        &self.matrix
    }

    /// Processes one 1600 ns tick. `ctws` holds the crate trigger words
    /// mapped to `clocktick_1600`; an absent tick passes an empty slice.
    pub fn process(
        &mut self,
        ctws: &[&TrackerCtw],
        clocktick_1600: u32,
    ) -> Result<TrackerRecord> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("tracker trigger stage").into());
        }
        self.reset_data();
        for ctw in ctws {
            self.fill_matrix(ctw)?;
        }
        self.build_sliding_zones();

        let mut record = TrackerRecord {
            clocktick_1600: Some(clocktick_1600),
            ..TrackerRecord::default()
        };
        for side in 0..NSIDES {
            for zone in 0..NZONES {
                record.zones[side][zone] = self.build_zone(side, zone);
                if record.zones[side][zone].horizontal_any() {
                    record.zoning_word_pattern[side] |= 1 << zone;
                }
                if record.zones[side][zone].near_source_any() {
                    record.zoning_word_near_source[side] |= 1 << zone;
                }
                if record.zones[side][zone].pattern_any() {
                    record.decision = true;
                }
            }
        }
        Ok(record)
    }

    fn fill_matrix(&mut self, ctw: &TrackerCtw) -> Result<()> {
        let mapping = self
            .mapping
            .as_deref()
            .ok_or(CoreError::MissingCollaborator("electronic mapping"))?;
        for slot in 0..TRACKER_CTW_SLOTS {
            let word = ctw.slot(slot)?;
            if word_bits(word, TRACKER_TP_HITS_OFFSET, TRACKER_TP_HITS_WIDTH) == 0 {
                continue;
            }
            // The slot self-identifies its board; a bad id is a per-tick
            // anomaly, not a fatal error.
            let board_id =
                word_bits(word, TRACKER_TP_BOARD_ID_OFFSET, TRACKER_TP_BOARD_ID_WIDTH) as u8;
            if board_id == CONTROL_BOARD_ID || board_id > 19 {
                log::warn!(
                    "skipping slot {slot} of crate {} at tick {}: invalid board id {board_id}",
                    ctw.crate_id,
                    ctw.clocktick_800
                );
                continue;
            }
            for channel in 0..TRACKER_BOARD_CHANNELS {
                if word_bits(word, u32::from(channel), 1) == 0 {
                    continue;
                }
                let addr = ChannelAddress {
                    board: BoardAddress::new(ctw.crate_id, board_id),
                    channel,
                };
                match mapping.channel_to_cell(AddressingMode::ThreeWires, &addr) {
                    Ok(cell) if cell.category == HitCategory::Geiger => {
                        self.matrix[usize::from(cell.side)][usize::from(cell.layer)]
                            [usize::from(cell.row)] = true;
                    }
                    Ok(_) | Err(_) => {
                        log::warn!(
                            "skipping channel {channel} of board {board_id} in crate {}: no tracker cell",
                            ctw.crate_id
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn build_sliding_zones(&mut self) {
        for side in 0..NSIDES {
            for szone in 0..NSLZONES {
                let start = sliding_zone_start_row(szone);
                let stop = sliding_zone_stop_row(szone);
                let mut layer_addr: u16 = 0;
                let mut row_addr: u16 = 0;
                for (layer, rows) in self.matrix[side].iter().enumerate() {
                    for row in start..=stop {
                        if rows[row] {
                            layer_addr |= 1 << layer;
                            row_addr |= 1 << (row - start);
                        }
                    }
                }
                self.sliding[side][szone] = SlidingZoneProj {
                    io: self.memories.sliding_zone_vertical.fetch(layer_addr) as u8,
                    lr: self.memories.sliding_zone_horizontal.fetch(row_addr) as u8,
                };
            }
        }
    }

    fn build_zone(&self, side: usize, zone: usize) -> ZoneData {
        // Concatenate the projections of the four sliding zones spanning
        // this zone, outermost (highest rows) in the low bit pair.
        let mut io_addr: u16 = 0;
        let mut lr_addr: u16 = 0;
        for k in 0..4 {
            let szone = zone * 3 + (3 - k);
            io_addr |= u16::from(self.sliding[side][szone].io & 0b11) << (2 * k);
            lr_addr |= u16::from(self.sliding[side][szone].lr & 0b11) << (2 * k);
        }

        let in_out = self.memories.zone_vertical.fetch(io_addr);
        let lmr = if lr_addr != 0 {
            self.memories.zone_horizontal.fetch(lr_addr)
        } else {
            self.memories.zone_vertical_for_horizontal.fetch(io_addr)
        };

        let mut data = ZoneData::default();
        if in_out & 0b01 != 0 {
            data.set(ZONE_BIT_INNER);
        }
        if in_out & 0b10 != 0 {
            data.set(ZONE_BIT_OUTER);
        }
        if lmr & 0b001 != 0 {
            data.set(ZONE_BIT_RIGHT);
        }
        if lmr & 0b010 != 0 {
            data.set(ZONE_BIT_MIDDLE);
        }
        if lmr & 0b100 != 0 {
            data.set(ZONE_BIT_LEFT);
        }
        self.build_near_source(side, zone, &mut data);
        data
    }

    fn build_near_source(&self, side: usize, zone: usize, data: &mut ZoneData) {
        let start = zone_start_row(zone);
        let width = zone_width(zone);
        let middle = width / 2;

        for layer in 0..NEAR_SOURCE_LAYERS {
            for irow in 0..width {
                if !self.matrix[side][layer][start + irow] {
                    continue;
                }
                if middle % 2 == 1 {
                    if irow <= middle {
                        data.set(ZONE_BIT_NSZ_LEFT);
                    }
                    if irow >= middle {
                        data.set(ZONE_BIT_NSZ_RIGHT);
                    }
                } else {
                    if (zone == 0 || zone == 5 || zone == 9) && irow == middle {
                        data.set(ZONE_BIT_NSZ_LEFT);
                        data.set(ZONE_BIT_NSZ_RIGHT);
                    }
                    if irow < middle {
                        data.set(ZONE_BIT_NSZ_LEFT);
                    } else {
                        data.set(ZONE_BIT_NSZ_RIGHT);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use febtrig_core::{CellAddress, DemonstratorMapping};
    use febtrig_digitize::tracker_ctw::tracker_ctw_collection;
    use febtrig_digitize::tracker_tp::TrackerTp;

    fn ready_stage() -> TrackerTriggerStage {
        let mut stage = TrackerTriggerStage::new(TrackerMemories::nominal().unwrap());
        stage.set_mapping(Arc::new(DemonstratorMapping::new()));
        stage.initialize().unwrap();
        stage
    }

    fn ctw_with_cells(cells: &[(u8, u16, u16)]) -> Vec<TrackerCtw> {
        let mapping = DemonstratorMapping::new();
        let mut tps = febtrig_digitize::tracker_tp::tracker_tp_collection();
        for &(side, layer, row) in cells {
            let cell = CellAddress::new(HitCategory::Geiger, side, layer, row);
            let addr = mapping
                .cell_to_channel(AddressingMode::ThreeWires, &cell)
                .unwrap();
            tps.upsert(
                (addr.board, 0),
                || TrackerTp::new(addr.board, 0),
                |tp| tp.set_channel_hit(addr.channel).unwrap(),
            );
        }
        let mut builder = febtrig_digitize::TrackerCtwBuilder::new();
        builder.initialize().unwrap();
        let mut ctws = tracker_ctw_collection();
        builder.process(&tps, &mut ctws).unwrap();
        ctws.iter().cloned().collect()
    }

    #[test]
    fn test_zone_geometry_covers_all_rows() {
        assert_eq!(zone_start_row(0), 0);
        assert_eq!(zone_stop_row(8), 107);
        assert_eq!(zone_stop_row(9), NROWS - 1);
        for zone in 1..NZONES {
            assert_eq!(zone_start_row(zone), zone_stop_row(zone - 1) + 1);
        }
    }

    #[test]
    fn test_full_track_fires_its_zone() {
        let mut stage = ready_stage();
        // A straight track through all nine layers of zone 3.
        let cells: Vec<(u8, u16, u16)> = (0..9).map(|layer| (0u8, layer as u16, 40u16)).collect();
        let ctws = ctw_with_cells(&cells);
        let refs: Vec<&TrackerCtw> = ctws.iter().collect();
        let record = stage.process(&refs, 7).unwrap();

        assert!(record.decision);
        let zone = record.zones[0][40 / ZONE_ROWS];
        assert!(zone.test(ZONE_BIT_INNER));
        assert!(zone.test(ZONE_BIT_OUTER));
        assert!(zone.horizontal_any());
        assert_eq!(record.zoning_word_pattern[0] & (1 << 3), 1 << 3);
        assert_eq!(record.zoning_word_pattern[1], 0);
    }

    #[test]
    fn test_inner_hits_only_set_near_source() {
        let mut stage = ready_stage();
        // Two hits in the innermost layers, left half of zone 0.
        let ctws = ctw_with_cells(&[(0, 0, 2), (0, 1, 2)]);
        let refs: Vec<&TrackerCtw> = ctws.iter().collect();
        let record = stage.process(&refs, 1).unwrap();

        let zone = record.zones[0][0];
        assert!(zone.test(ZONE_BIT_NSZ_LEFT));
        assert!(!zone.test(ZONE_BIT_NSZ_RIGHT));
        assert!(!zone.test(ZONE_BIT_OUTER));
        assert_eq!(record.zoning_word_near_source[0], 1);
    }

    #[test]
    fn test_empty_tick_yields_empty_record() {
        let mut stage = ready_stage();
        let record = stage.process(&[], 42).unwrap();
        assert!(record.is_empty());
        assert!(!record.decision);
        assert_eq!(record.clocktick_1600, Some(42));
    }

    #[test]
    fn test_invalid_board_slot_is_skipped() {
        let mut stage = ready_stage();
        let mut ctw = TrackerCtw::new(0, 0);
        // Channel hit in a slot whose id field claims the control board.
        ctw.set_slot_bits(4, 0, 1, 1).unwrap();
        ctw.set_slot_bits(4, 60, 5, u128::from(CONTROL_BOARD_ID)).unwrap();
        let record = stage.process(&[&ctw], 0).unwrap();
        assert!(record.is_empty());
    }
}
