//! Trigger-primitive encoders: analog signals onto the clock grids.

use std::sync::Arc;

use febtrig_core::{
    AddressingMode, ClockManager, ElectronicMapping, Error as CoreError, TimingConfig,
};

use crate::calo_tp::{CaloTp, CaloTpCollection};
use crate::error::Result;
use crate::signal::SignalCollection;
use crate::tracker_tp::{TrackerTp, TrackerTpCollection};

/// Encodes calorimeter signals into trigger primitives.
///
/// A signal above the low threshold is routed to its front-end board via
/// the cabling and stamped with the 25 ns clocktick of its arrival,
/// front-end latency included. Two signals landing on the same
/// (board, tick) update one primitive in place.
pub struct CaloTpEncoder {
    timing: TimingConfig,
    mapping: Option<Arc<dyn ElectronicMapping>>,
    initialized: bool,
}

impl CaloTpEncoder {
    /// Creates an encoder, not yet initialized.
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            mapping: None,
            initialized: false,
        }
    }

    /// Wires in the cabling collaborator.
    pub fn set_mapping(&mut self, mapping: Arc<dyn ElectronicMapping>) {
        self.mapping = Some(mapping);
    }

    /// Marks the encoder ready; fails when the cabling is missing.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("calo tp encoder").into());
        }
        if self.mapping.is_none() {
            return Err(CoreError::MissingCollaborator("electronic mapping").into());
        }
        self.initialized = true;
        Ok(())
    }

    /// Encodes the calorimeter signals of one event.
    pub fn process(
        &self,
        clock: &ClockManager,
        signals: &SignalCollection,
        tps: &mut CaloTpCollection,
    ) -> Result<()> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("calo tp encoder").into());
        }
        let mapping = self
            .mapping
            .as_deref()
            .ok_or(CoreError::MissingCollaborator("electronic mapping"))?;
        let clocktick_25_ref = clock.clocktick_25_ref()?;
        let main = self.timing.main_clocktick;
        let low = self.timing.calo_low_threshold;
        let high = self.timing.calo_high_threshold;

        for signal in signals.calo_signals() {
            if signal.amplitude < low {
                continue;
            }
            let addr = mapping.cell_to_channel(AddressingMode::ThreeWires, &signal.cell)?;
            let tick_offset = if signal.time > f64::from(main) {
                signal.time as u32 / main
            } else {
                0
            };
            let clocktick = clocktick_25_ref + self.timing.calo_feb_shift + tick_offset;
            let amplitude = signal.amplitude;
            tps.upsert(
                (addr.board, clocktick),
                || CaloTp::new(addr.board, clocktick),
                |tp| tp.update(amplitude, false, false, low, high),
            );
        }
        log::debug!("encoded {} calo trigger primitives", tps.len());
        Ok(())
    }
}

/// Encodes tracker anode signals into trigger primitives.
pub struct TrackerTpEncoder {
    timing: TimingConfig,
    mapping: Option<Arc<dyn ElectronicMapping>>,
    initialized: bool,
}

impl TrackerTpEncoder {
    /// Creates an encoder, not yet initialized.
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            mapping: None,
            initialized: false,
        }
    }

    /// Wires in the cabling collaborator.
    pub fn set_mapping(&mut self, mapping: Arc<dyn ElectronicMapping>) {
        self.mapping = Some(mapping);
    }

    /// Marks the encoder ready; fails when the cabling is missing.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("tracker tp encoder").into());
        }
        if self.mapping.is_none() {
            return Err(CoreError::MissingCollaborator("electronic mapping").into());
        }
        self.initialized = true;
        Ok(())
    }

    /// Encodes the tracker signals of one event.
    ///
    /// A repeated signal on an existing (board, tick) ORs its channel bit
    /// into the stored word.
    pub fn process(
        &self,
        clock: &ClockManager,
        signals: &SignalCollection,
        tps: &mut TrackerTpCollection,
    ) -> Result<()> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("tracker tp encoder").into());
        }
        let mapping = self
            .mapping
            .as_deref()
            .ok_or(CoreError::MissingCollaborator("electronic mapping"))?;
        let clocktick_800_ref = clock.clocktick_800_ref()?;
        let tracker = self.timing.tracker_clocktick;

        for signal in signals.tracker_signals() {
            let addr = mapping.cell_to_channel(AddressingMode::ThreeWires, &signal.cell)?;
            let clocktick = clocktick_800_ref
                + self.timing.tracker_feb_shift
                + signal.anode_avalanche_time as u32 / tracker;
            let channel = addr.channel;
            let mut write = Ok(());
            tps.upsert(
                (addr.board, clocktick),
                || TrackerTp::new(addr.board, clocktick),
                |tp| write = tp.set_channel_hit(channel),
            );
            write?;
        }
        log::debug!("encoded {} tracker trigger primitives", tps.len());
        Ok(())
    }
}
