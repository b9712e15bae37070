//! Error types for febtrig-digitize.

use thiserror::Error;

/// Result type alias for digitization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Digitization pipeline errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Error raised by the core layer (clock, mapping, configuration).
    #[error(transparent)]
    Core(#[from] febtrig_core::Error),

    /// A keyed collection holds two entries with the same key.
    #[error("duplicate entry for crate {crate_id} at clocktick {clocktick}")]
    DuplicateKey { crate_id: u8, clocktick: u32 },

    /// A board slot index outside the crate trigger word.
    #[error("block index {index} out of range (max {max})")]
    InvalidBlockIndex { index: usize, max: usize },

    /// A clocktick aggregate was queried on an empty collection.
    #[error("{0} collection is empty")]
    EmptyCollection(&'static str),

    /// A field operation was applied to a trigger word of the wrong
    /// crate layout.
    #[error("crate {crate_id} trigger word has no {field} field")]
    LayoutMismatch { crate_id: u8, field: &'static str },

    /// A bit-field write wider than the field allows.
    #[error("value {value} does not fit in {width} bits")]
    ValueTooWide { value: u128, width: u32 },
}
