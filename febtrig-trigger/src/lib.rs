//! febtrig-trigger: the trigger decision stages.
//!
//! Consumes the crate trigger words built by `febtrig-digitize` and runs
//! the firmware decision logic: the 25 ns calorimeter stage, the 1600 ns
//! tracker stage with its programmable pattern memories, and the prompt
//! (CARACO) and delayed (APE, DAVE) coincidence matchers. The batch
//! driver runs the whole emulation chain over a set of simulated events
//! in parallel.

pub mod batch;
pub mod calo_stage;
pub mod coincidence;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod record;
pub mod tracker_stage;

pub use batch::{process_events, EventDecision};
pub use calo_stage::CaloTriggerStage;
pub use coincidence::CoincidenceStage;
pub use config::TriggerConfig;
pub use engine::TriggerEngine;
pub use error::{Error, Result};
pub use memory::PatternMemory;
pub use record::{
    CaloRecord, CaloSummaryRecord, CoincidenceCaloRecord, CoincidenceRecord, PreviousEventRecord,
    TrackerRecord, TriggerMode, TriggerRecord, ZoneData, NSIDES, NZONES,
};
pub use tracker_stage::{TrackerMemories, TrackerTriggerStage};
