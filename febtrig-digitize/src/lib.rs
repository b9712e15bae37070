//! febtrig-digitize: signal building and trigger-primitive encoding.
//!
//! The digitization chain of the front-end electronics emulation:
//! truth step hits become analog signals, signals become per-board
//! trigger primitives on the 25 ns and 800 ns grids, and the primitives
//! of each crate are aggregated into crate trigger words for the
//! decision stages.

pub mod builder;
pub mod calo_ctw;
pub mod calo_tp;
pub mod collection;
pub mod ctw_builder;
pub mod encoder;
pub mod error;
pub mod signal;
pub mod tracker_ctw;
pub mod tracker_tp;

pub use builder::{CaloSignalBuilder, TrackerSignalBuilder};
pub use calo_ctw::{calo_ctw_collection, CaloCtw, CaloCtwCollection, CaloCtwLayout};
pub use calo_tp::{calo_tp_collection, CaloTp, CaloTpCollection};
pub use collection::{Keyed, KeyedCollection};
pub use ctw_builder::{CaloCtwBuilder, TrackerCtwBuilder};
pub use encoder::{CaloTpEncoder, TrackerTpEncoder};
pub use error::{Error, Result};
pub use signal::{CaloSignal, SignalCollection, TrackerSignal};
pub use tracker_ctw::{tracker_ctw_collection, TrackerCtw, TrackerCtwCollection};
pub use tracker_tp::{tracker_tp_collection, TrackerTp, TrackerTpCollection};
