//! febtrig-core: Core types for front-end trigger electronics emulation.
//!
//! This crate provides the shared vocabulary of the digitization pipeline:
//! clock-domain bookkeeping, detector-cell and electronics addressing,
//! simulated step hits, and the immutable timing configuration.
//!

pub mod address;
pub mod clock;
pub mod config;
pub mod error;
pub mod hit;
pub mod rng;

pub use address::{
    AddressingMode, BoardAddress, CellAddress, ChannelAddress, DemonstratorMapping,
    ElectronicMapping, HitCategory,
};
pub use clock::ClockManager;
pub use config::{TimingConfig, INVALID_CLOCKTICK};
pub use error::{Error, Result};
pub use hit::{SimulatedEvent, StepHit};
pub use rng::UniformSource;
