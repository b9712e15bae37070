//! Coincidence stage, clocked at 1600 ns.
//!
//! Calorimeter decisions open gates on the coincidence grid; each tick
//! the tracker record is matched against the open gate (prompt mode) or
//! against the remembered previous events (delayed modes).

use std::collections::HashMap;

use febtrig_core::Error as CoreError;

use crate::config::TriggerConfig;
use crate::error::Result;
use crate::record::{
    CaloSummaryRecord, CoincidenceCaloRecord, CoincidenceRecord, PreviousEventRecord,
    TrackerRecord, TriggerMode, ZoneData, NSIDES, NZONES, ZONE_BIT_LEFT, ZONE_BIT_RIGHT,
};

/// Prompt and delayed coincidence matching.
pub struct CoincidenceStage {
    config: TriggerConfig,
    previous_event_lifetime: u32,
    gates: HashMap<u32, CoincidenceCaloRecord>,
    previous_events: Vec<PreviousEventRecord>,
    decisions: Vec<(u32, TriggerMode)>,
    caraco_decision: bool,
    delayed_decision: bool,
    initialized: bool,
}

impl CoincidenceStage {
    /// Creates a stage, not yet initialized. `previous_event_lifetime` is
    /// the delayed lookback window in 1600 ns ticks.
    pub fn new(config: TriggerConfig, previous_event_lifetime: u32) -> Self {
        Self {
            config,
            previous_event_lifetime,
            gates: HashMap::new(),
            previous_events: Vec::new(),
            decisions: Vec::new(),
            caraco_decision: false,
            delayed_decision: false,
            initialized: false,
        }
    }

    /// Marks the stage ready.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(CoreError::AlreadyInitialized("coincidence stage").into());
        }
        self.initialized = true;
        Ok(())
    }

    /// Clears gates, previous events, and decisions between events.
    pub fn reset_data(&mut self) {
        self.gates.clear();
        self.previous_events.clear();
        self.decisions.clear();
        self.caraco_decision = false;
        self.delayed_decision = false;
    }

    /// A prompt coincidence fired during the current event.
    #[inline]
    pub fn caraco_decision(&self) -> bool {
        self.caraco_decision
    }

    /// A delayed coincidence fired during the current event.
    #[inline]
    pub fn delayed_decision(&self) -> bool {
        self.delayed_decision
    }

    /// Decisions issued so far, oldest first.
    pub fn decisions(&self) -> &[(u32, TriggerMode)] {
        &self.decisions
    }

    /// Ticks with an open calorimeter gate, unordered.
    pub fn gate_ticks(&self) -> impl Iterator<Item = u32> + '_ {
        self.gates.keys().copied()
    }

    /// Projects a calorimeter decision onto the coincidence grid, opening
    /// (or extending) a gate of `calorimeter_gate_size` ticks.
    pub fn open_gate(&mut self, summary: &CaloSummaryRecord, clocktick_1600: u32) -> Result<()> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("coincidence stage").into());
        }
        if !summary.decision {
            return Ok(());
        }
        for tick in clocktick_1600..clocktick_1600.saturating_add(self.config.calorimeter_gate_size)
        {
            let gate = self
                .gates
                .entry(tick)
                .or_insert_with(|| CoincidenceCaloRecord {
                    clocktick_1600: tick,
                    ..CoincidenceCaloRecord::default()
                });
            Self::merge_into_gate(gate, summary);
        }
        Ok(())
    }

    fn merge_into_gate(gate: &mut CoincidenceCaloRecord, summary: &CaloSummaryRecord) {
        let record = &summary.record;
        for side in 0..NSIDES {
            gate.zoning_word[side] |= record.zoning_word[side];
            // Distinct fired zones refine the multiplicity a single crate
            // word saturated away.
            let zone_count = gate.zoning_word[side].count_ones().min(3) as u8;
            gate.multiplicity_side[side] = gate.multiplicity_side[side]
                .max(record.multiplicity_side[side])
                .max(zone_count);
            gate.lto_side[side] |= record.lto_side[side];
        }
        gate.multiplicity_gveto = gate.multiplicity_gveto.max(record.multiplicity_gveto);
        gate.lto_gveto |= record.lto_gveto;
        gate.xt |= record.xt;

        let active: Vec<bool> = (0..NSIDES)
            .map(|s| gate.zoning_word[s] != 0 || gate.multiplicity_side[s] != 0)
            .collect();
        gate.single_side_coinc = active.iter().filter(|&&a| a).count() == 1;
        gate.total_multiplicity_threshold |= summary.total_multiplicity_threshold;
        gate.decision |= summary.decision;
    }

    /// Matches the tracker record of one tick against the open gate and
    /// the previous events. Returns the coincidence when one fires.
    pub fn process_tick(
        &mut self,
        clocktick_1600: u32,
        tracker: &TrackerRecord,
    ) -> Result<Option<CoincidenceRecord>> {
        if !self.initialized {
            return Err(CoreError::NotInitialized("coincidence stage").into());
        }
        self.age_previous_events(clocktick_1600);

        let mut matched = None;
        if let Some(gate) = self.gates.get(&clocktick_1600) {
            if gate.decision {
                if let Some(zoning) = Self::match_caraco(gate, tracker) {
                    matched = Some(CoincidenceRecord {
                        clocktick_1600,
                        zoning_word: zoning,
                        calo: gate.clone(),
                        tracker_zones: tracker.zones,
                        mode: TriggerMode::Caraco,
                    });
                }
            }
        }
        if matched.is_none() {
            matched = self.match_delayed(clocktick_1600, tracker);
        }

        let Some(record) = matched else {
            return Ok(None);
        };

        // One physical coincidence spans several ticks; re-issues inside
        // the decision window are swallowed.
        if let Some(&(last_tick, _)) = self.decisions.last() {
            if clocktick_1600 < last_tick.saturating_add(self.config.decision_gate_size) {
                return Ok(None);
            }
        }

        self.decisions.push((clocktick_1600, record.mode));
        match record.mode {
            TriggerMode::Caraco => {
                self.caraco_decision = true;
                self.remember_previous_event(&record);
            }
            TriggerMode::Ape | TriggerMode::Dave => self.delayed_decision = true,
        }
        Ok(Some(record))
    }

    fn age_previous_events(&mut self, clocktick_1600: u32) {
        let lifetime = self.previous_event_lifetime;
        for per in &mut self.previous_events {
            let elapsed = clocktick_1600.saturating_sub(per.clocktick_1600);
            per.counter_1600 = lifetime.saturating_sub(elapsed);
        }
        self.previous_events.retain(|per| per.counter_1600 > 0);
    }

    fn remember_previous_event(&mut self, record: &CoincidenceRecord) {
        if self.previous_events.len() == self.config.previous_event_buffer_depth {
            self.previous_events.remove(0);
        }
        self.previous_events.push(PreviousEventRecord {
            clocktick_1600: record.clocktick_1600,
            counter_1600: self.previous_event_lifetime,
            zoning_word: record.zoning_word,
            calo_zoning_word: record.calo.zoning_word,
            tracker_zones: record.tracker_zones,
        });
    }

    /// Prompt matching: a tracker pattern pointing at a fired calorimeter
    /// zone of the same side. Middle patterns point at their own zone,
    /// right patterns also at the next zone, left patterns also at the
    /// previous one.
    fn match_caraco(
        gate: &CoincidenceCaloRecord,
        tracker: &TrackerRecord,
    ) -> Option<[u16; NSIDES]> {
        let mut zoning = [0u16; NSIDES];
        let mut fired = false;
        for side in 0..NSIDES {
            let calo = gate.zoning_word[side];
            for zone in 0..NZONES {
                let data = tracker.zones[side][zone];
                if !data.horizontal_any() {
                    continue;
                }
                let mut calo_zones = 1u16 << zone;
                if data.test(ZONE_BIT_RIGHT) && zone + 1 < NZONES {
                    calo_zones |= 1 << (zone + 1);
                }
                if data.test(ZONE_BIT_LEFT) && zone > 0 {
                    calo_zones |= 1 << (zone - 1);
                }
                let overlap = calo & calo_zones;
                if overlap != 0 {
                    zoning[side] |= overlap;
                    fired = true;
                }
            }
        }
        fired.then_some(zoning)
    }

    fn match_delayed(
        &self,
        clocktick_1600: u32,
        tracker: &TrackerRecord,
    ) -> Option<CoincidenceRecord> {
        if self.previous_events.is_empty() || tracker.is_empty() {
            return None;
        }
        for per in &self.previous_events {
            // The prompt event itself is not its own delayed partner.
            if per.clocktick_1600 == clocktick_1600 {
                continue;
            }
            if let Some(zoning) = Self::match_zone_overlap(per, tracker, ZoneData::horizontal_any)
            {
                return Some(Self::delayed_record(
                    clocktick_1600,
                    zoning,
                    tracker,
                    TriggerMode::Ape,
                ));
            }
        }
        for per in &self.previous_events {
            if per.clocktick_1600 == clocktick_1600 {
                continue;
            }
            if let Some(zoning) = Self::match_zone_overlap(per, tracker, ZoneData::near_source_any)
            {
                return Some(Self::delayed_record(
                    clocktick_1600,
                    zoning,
                    tracker,
                    TriggerMode::Dave,
                ));
            }
        }
        None
    }

    /// Delayed matching: a current tracker zone flagged by `flag` next to
    /// (same zone or an adjacent one, either side) a zone the previous
    /// event flagged the same way.
    fn match_zone_overlap(
        per: &PreviousEventRecord,
        tracker: &TrackerRecord,
        flag: impl Fn(ZoneData) -> bool,
    ) -> Option<[u16; NSIDES]> {
        let mut zoning = [0u16; NSIDES];
        let mut fired = false;
        for side in 0..NSIDES {
            for zone in 0..NZONES {
                if !flag(tracker.zones[side][zone]) {
                    continue;
                }
                let lo = zone.saturating_sub(1);
                let hi = (zone + 1).min(NZONES - 1);
                let near_per = (0..NSIDES).any(|per_side| {
                    (lo..=hi).any(|z| flag(per.tracker_zones[per_side][z]))
                });
                if near_per {
                    zoning[side] |= 1 << zone;
                    fired = true;
                }
            }
        }
        fired.then_some(zoning)
    }

    fn delayed_record(
        clocktick_1600: u32,
        zoning_word: [u16; NSIDES],
        tracker: &TrackerRecord,
        mode: TriggerMode,
    ) -> CoincidenceRecord {
        CoincidenceRecord {
            clocktick_1600,
            zoning_word,
            calo: CoincidenceCaloRecord {
                clocktick_1600,
                ..CoincidenceCaloRecord::default()
            },
            tracker_zones: tracker.zones,
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        CaloRecord, ZONE_BIT_INNER, ZONE_BIT_MIDDLE, ZONE_BIT_NSZ_LEFT, ZONE_BIT_OUTER,
    };

    const LIFETIME: u32 = 625;

    fn ready_stage() -> CoincidenceStage {
        let mut stage = CoincidenceStage::new(TriggerConfig::default(), LIFETIME);
        stage.initialize().unwrap();
        stage
    }

    fn calo_summary(side: usize, zone: u8) -> CaloSummaryRecord {
        let mut record = CaloRecord::default();
        record.zoning_word[side] = 1 << zone;
        record.multiplicity_side[side] = 1;
        CaloSummaryRecord {
            record,
            single_side_coinc: true,
            total_multiplicity_threshold: true,
            decision: true,
        }
    }

    fn tracker_with_zone(side: usize, zone: usize, bits: &[u8]) -> TrackerRecord {
        let mut record = TrackerRecord::default();
        for &bit in bits {
            record.zones[side][zone].set(bit);
        }
        record.decision = record.zones[side][zone].pattern_any();
        record
    }

    #[test]
    fn test_caraco_matches_middle_pattern_in_fired_zone() {
        let mut stage = ready_stage();
        stage.open_gate(&calo_summary(0, 4), 100).unwrap();

        let tracker = tracker_with_zone(0, 4, &[ZONE_BIT_INNER, ZONE_BIT_OUTER, ZONE_BIT_MIDDLE]);
        let record = stage.process_tick(100, &tracker).unwrap().unwrap();
        assert_eq!(record.mode, TriggerMode::Caraco);
        assert_eq!(record.zoning_word[0], 1 << 4);
        assert!(stage.caraco_decision());
        assert!(!stage.delayed_decision());
    }

    #[test]
    fn test_caraco_right_pattern_reaches_the_next_zone() {
        let mut stage = ready_stage();
        stage.open_gate(&calo_summary(1, 5), 10).unwrap();

        let tracker = tracker_with_zone(1, 4, &[ZONE_BIT_RIGHT]);
        let record = stage.process_tick(10, &tracker).unwrap().unwrap();
        assert_eq!(record.zoning_word[1], 1 << 5);

        // A left pattern in the same zone does not reach zone 5.
        stage.reset_data();
        stage.open_gate(&calo_summary(1, 5), 10).unwrap();
        let tracker = tracker_with_zone(1, 4, &[ZONE_BIT_LEFT]);
        assert!(stage.process_tick(10, &tracker).unwrap().is_none());
    }

    #[test]
    fn test_caraco_requires_same_side() {
        let mut stage = ready_stage();
        stage.open_gate(&calo_summary(0, 3), 20).unwrap();
        let tracker = tracker_with_zone(1, 3, &[ZONE_BIT_MIDDLE]);
        assert!(stage.process_tick(20, &tracker).unwrap().is_none());
    }

    #[test]
    fn test_gate_covers_following_ticks() {
        let mut stage = ready_stage();
        stage.open_gate(&calo_summary(0, 2), 50).unwrap();

        let tracker = tracker_with_zone(0, 2, &[ZONE_BIT_MIDDLE]);
        // Default gate size 5: ticks 50..=54 match, 55 does not.
        assert!(stage.process_tick(54, &tracker).unwrap().is_some());
        assert!(stage.process_tick(55, &tracker).unwrap().is_none());
    }

    #[test]
    fn test_decision_window_swallows_reissues() {
        let mut stage = ready_stage();
        stage.open_gate(&calo_summary(0, 1), 30).unwrap();
        let tracker = tracker_with_zone(0, 1, &[ZONE_BIT_MIDDLE]);

        assert!(stage.process_tick(30, &tracker).unwrap().is_some());
        assert!(stage.process_tick(32, &tracker).unwrap().is_none());
        assert_eq!(stage.decisions().len(), 1);
    }

    #[test]
    fn test_ape_fires_on_delayed_tracker_activity() {
        let mut stage = ready_stage();
        stage.open_gate(&calo_summary(0, 6), 100).unwrap();
        let prompt = tracker_with_zone(0, 6, &[ZONE_BIT_MIDDLE]);
        stage.process_tick(100, &prompt).unwrap().unwrap();

        // Delayed activity in the adjacent zone, within the lifetime.
        let delayed = tracker_with_zone(0, 7, &[ZONE_BIT_LEFT]);
        let record = stage.process_tick(300, &delayed).unwrap().unwrap();
        assert_eq!(record.mode, TriggerMode::Ape);
        assert_eq!(record.zoning_word[0], 1 << 7);
        assert!(stage.delayed_decision());
    }

    #[test]
    fn test_previous_event_expires_after_its_lifetime() {
        let mut stage = ready_stage();
        stage.open_gate(&calo_summary(0, 6), 100).unwrap();
        let prompt = tracker_with_zone(0, 6, &[ZONE_BIT_MIDDLE]);
        stage.process_tick(100, &prompt).unwrap().unwrap();

        let delayed = tracker_with_zone(0, 6, &[ZONE_BIT_MIDDLE]);
        assert!(stage
            .process_tick(100 + LIFETIME, &delayed)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_dave_fires_on_near_source_only_activity() {
        let mut stage = ready_stage();
        stage.open_gate(&calo_summary(0, 3), 40).unwrap();
        let mut prompt = tracker_with_zone(0, 3, &[ZONE_BIT_MIDDLE]);
        prompt.zones[0][3].set(ZONE_BIT_NSZ_LEFT);
        stage.process_tick(40, &prompt).unwrap().unwrap();

        // Near-source flags only: APE has nothing to match, DAVE does.
        let mut delayed = TrackerRecord::default();
        delayed.zones[0][3].set(ZONE_BIT_NSZ_LEFT);
        let record = stage.process_tick(200, &delayed).unwrap().unwrap();
        assert_eq!(record.mode, TriggerMode::Dave);
    }

    #[test]
    fn test_no_previous_event_means_no_delayed_match() {
        let mut stage = ready_stage();
        let delayed = tracker_with_zone(0, 2, &[ZONE_BIT_MIDDLE]);
        assert!(stage.process_tick(500, &delayed).unwrap().is_none());
    }
}
