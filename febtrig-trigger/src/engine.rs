//! Trigger engine: the decision pipeline over one event's crate trigger
//! words.

use std::collections::BTreeMap;
use std::sync::Arc;

use febtrig_core::{ElectronicMapping, Error as CoreError, TimingConfig};
use febtrig_digitize::{CaloCtwCollection, TrackerCtwCollection};

use crate::calo_stage::CaloTriggerStage;
use crate::coincidence::CoincidenceStage;
use crate::config::TriggerConfig;
use crate::error::Result;
use crate::record::TriggerRecord;
use crate::tracker_stage::{TrackerMemories, TrackerTriggerStage};

/// Per-event trigger decision pipeline.
///
/// The engine drives the calorimeter stage over the 25 ns ticks of the
/// event, projects its decisions onto the 1600 ns coincidence grid, then
/// walks the coincidence grid running the tracker stage and the prompt
/// and delayed matchers.
pub struct TriggerEngine {
    timing: TimingConfig,
    config: TriggerConfig,
    mapping: Option<Arc<dyn ElectronicMapping>>,
    memories: Option<TrackerMemories>,
    calo_stage: CaloTriggerStage,
    tracker_stage: Option<TrackerTriggerStage>,
    coincidence: CoincidenceStage,
    initialized: bool,
}

impl TriggerEngine {
    /// Creates an engine, not yet initialized.
    pub fn new(timing: TimingConfig, config: TriggerConfig) -> Self {
        let coincidence = CoincidenceStage::new(config.clone(), timing.previous_event_lifetime);
        Self {
            timing,
            mapping: None,
            memories: None,
            calo_stage: CaloTriggerStage::new(config.clone()),
            config,
            tracker_stage: None,
            coincidence,
            initialized: false,
        }
    }

    /// Wires in the cabling collaborator.
    pub fn set_mapping(&mut self, mapping: Arc<dyn ElectronicMapping>) {
        self.mapping = Some(mapping);
    }

    /// Overrides the nominal tracker memories before initialization.
    pub fn set_memories(&mut self, memories: TrackerMemories) {
        self.memories = Some(memories);
    }

    /// Builds and readies the decision stages; fails when the cabling is
    /// missing.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("trigger engine").into());
        }
        let mapping = self
            .mapping
            .clone()
            .ok_or(CoreError::MissingCollaborator("electronic mapping"))?;
        let memories = match self.memories.take() {
            Some(memories) => memories,
            None => TrackerMemories::nominal()?,
        };
        let mut tracker_stage = TrackerTriggerStage::new(memories);
        tracker_stage.set_mapping(mapping);
        tracker_stage.initialize()?;
        self.tracker_stage = Some(tracker_stage);
        self.calo_stage.initialize()?;
        self.coincidence.initialize()?;
        self.initialized = true;
        Ok(())
    }

    /// Clears all per-event state.
    pub fn reset_data(&mut self) {
        self.calo_stage.reset_data();
        if let Some(stage) = &mut self.tracker_stage {
            stage.reset_data();
        }
        self.coincidence.reset_data();
    }

    /// A prompt coincidence fired during the last processed event.
    pub fn caraco_decision(&self) -> bool {
        self.coincidence.caraco_decision()
    }

    /// A delayed coincidence fired during the last processed event.
    pub fn delayed_decision(&self) -> bool {
        self.coincidence.delayed_decision()
    }

    /// Runs the decision pipeline over one event's crate trigger words.
    ///
    /// State is reset on entry, so replaying the same words yields the
    /// same decisions.
    pub fn process(
        &mut self,
        calo_ctws: &CaloCtwCollection,
        tracker_ctws: &TrackerCtwCollection,
    ) -> Result<Vec<TriggerRecord>> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("trigger engine").into());
        }
        self.reset_data();

        self.scan_calorimeter(calo_ctws)?;

        // Tracker words regrouped from the 800 ns grid onto the
        // coincidence grid.
        let mut tracker_by_tick: BTreeMap<u32, Vec<&febtrig_digitize::TrackerCtw>> =
            BTreeMap::new();
        for ctw in tracker_ctws {
            tracker_by_tick
                .entry(self.clocktick_800_to_1600(ctw.clocktick_800))
                .or_default()
                .push(ctw);
        }

        let mut ticks: Vec<u32> = self
            .coincidence
            .gate_ticks()
            .chain(tracker_by_tick.keys().copied())
            .collect();
        ticks.sort_unstable();
        ticks.dedup();

        let tracker_stage = self
            .tracker_stage
            .as_mut()
            .ok_or(CoreError::MissingCollaborator("tracker trigger stage"))?;

        let mut records = Vec::new();
        for tick in ticks {
            let ctws = tracker_by_tick.get(&tick).map_or(&[][..], Vec::as_slice);
            let tracker_record = tracker_stage.process(ctws, tick)?;
            if let Some(coincidence) = self.coincidence.process_tick(tick, &tracker_record)? {
                log::debug!(
                    "trigger decision {:?} at clocktick 1600 = {}",
                    coincidence.mode,
                    coincidence.clocktick_1600
                );
                records.push(TriggerRecord {
                    mode: coincidence.mode,
                    clocktick_1600: coincidence.clocktick_1600,
                    decision: true,
                });
            }
        }
        Ok(records)
    }

    /// Runs the calorimeter stage tick by tick and opens coincidence
    /// gates from its decisions.
    fn scan_calorimeter(&mut self, calo_ctws: &CaloCtwCollection) -> Result<()> {
        if calo_ctws.is_empty() {
            return Ok(());
        }
        let first = calo_ctws.clocktick_min()?;
        let last = calo_ctws.clocktick_max()?;
        // The buffer keeps a decision alive for depth - 1 empty ticks, so
        // the scan overshoots by the depth to drain it.
        let drain = self.config.calo_buffer_depth as u32;
        for tick in first..=last.saturating_add(drain) {
            let ctws = calo_ctws.at_clocktick(tick);
            let summary = self.calo_stage.process(&ctws, tick)?;
            if summary.decision {
                let gate_tick = self.clocktick_25_to_1600(tick);
                self.coincidence.open_gate(&summary, gate_tick)?;
            }
        }
        Ok(())
    }

    #[inline]
    fn clocktick_25_to_1600(&self, clocktick_25: u32) -> u32 {
        clocktick_25 * self.timing.main_clocktick / self.timing.trigger_clocktick
            + self.timing.computing_shift
    }

    #[inline]
    fn clocktick_800_to_1600(&self, clocktick_800: u32) -> u32 {
        clocktick_800 * self.timing.tracker_clocktick / self.timing.trigger_clocktick
            + self.timing.computing_shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use febtrig_core::{
        AddressingMode, CellAddress, DemonstratorMapping, HitCategory,
    };
    use febtrig_digitize::calo_ctw::calo_ctw_collection;
    use febtrig_digitize::tracker_ctw::tracker_ctw_collection;
    use febtrig_digitize::tracker_tp::{tracker_tp_collection, TrackerTp};
    use febtrig_digitize::{CaloCtw, Keyed, TrackerCtwBuilder};

    use crate::record::TriggerMode;

    fn ready_engine() -> TriggerEngine {
        let mut engine = TriggerEngine::new(TimingConfig::default(), TriggerConfig::default());
        engine.set_mapping(Arc::new(DemonstratorMapping::new()));
        engine.initialize().unwrap();
        engine
    }

    /// One high-threshold pulse in main-wall zone 3 at 25 ns tick 128.
    fn calo_ctws_zone_3() -> CaloCtwCollection {
        let mut ctw = CaloCtw::new(0, 128);
        ctw.increment_htm().unwrap();
        ctw.set_zone_bit(3).unwrap();
        let mut ctws = calo_ctw_collection();
        ctws.upsert(ctw.key(), || ctw.clone(), |_| ());
        ctws
    }

    /// A straight track through row 40 (zone 3) at 800 ns tick 4, which
    /// regroups onto coincidence tick 3 alongside the calorimeter gate.
    fn tracker_ctws_zone_3() -> TrackerCtwCollection {
        let mapping = DemonstratorMapping::new();
        let mut tps = tracker_tp_collection();
        for layer in 0..9u16 {
            let cell = CellAddress::new(HitCategory::Geiger, 0, layer, 40);
            let addr = mapping
                .cell_to_channel(AddressingMode::ThreeWires, &cell)
                .unwrap();
            tps.upsert(
                (addr.board, 4),
                || TrackerTp::new(addr.board, 4),
                |tp| tp.set_channel_hit(addr.channel).unwrap(),
            );
        }
        let mut builder = TrackerCtwBuilder::new();
        builder.initialize().unwrap();
        let mut ctws = tracker_ctw_collection();
        builder.process(&tps, &mut ctws).unwrap();
        ctws
    }

    #[test]
    fn test_initialize_without_mapping_fails() {
        let mut engine = TriggerEngine::new(TimingConfig::default(), TriggerConfig::default());
        assert!(engine.initialize().is_err());
    }

    #[test]
    fn test_prompt_coincidence_end_to_end() {
        let mut engine = ready_engine();
        let records = engine
            .process(&calo_ctws_zone_3(), &tracker_ctws_zone_3())
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mode, TriggerMode::Caraco);
        assert_eq!(records[0].clocktick_1600, 3);
        assert!(engine.caraco_decision());
        assert!(!engine.delayed_decision());
    }

    #[test]
    fn test_replaying_an_event_yields_the_same_decisions() {
        let mut engine = ready_engine();
        let calo = calo_ctws_zone_3();
        let tracker = tracker_ctws_zone_3();
        let first = engine.process(&calo, &tracker).unwrap();
        let second = engine.process(&calo, &tracker).unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_calorimeter_alone_does_not_trigger() {
        let mut engine = ready_engine();
        let records = engine
            .process(&calo_ctws_zone_3(), &tracker_ctw_collection())
            .unwrap();
        assert!(records.is_empty());
        assert!(!engine.caraco_decision());
    }

    #[test]
    fn test_tracker_alone_does_not_trigger() {
        let mut engine = ready_engine();
        let records = engine
            .process(&calo_ctw_collection(), &tracker_ctws_zone_3())
            .unwrap();
        assert!(records.is_empty());
        assert!(!engine.caraco_decision());
        assert!(!engine.delayed_decision());
    }
}
