//! Error types for febtrig-core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the trigger emulation pipeline.
///
/// Configuration errors (use before initialize, double initialize, missing
/// collaborators) are fatal and abort the current event. Recoverable
/// per-tick anomalies are never expressed through this enum.
#[derive(Error, Debug)]
pub enum Error {
    /// A component was initialized twice.
    #[error("{0} is already initialized")]
    AlreadyInitialized(&'static str),

    /// A component was used before initialization.
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    /// A mandatory collaborator was not wired in before initialization.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// The clocktick reference was nonzero when the clock manager was set up.
    #[error("clocktick reference must be zero before initialization")]
    NonZeroReference,

    /// A detector cell has no electronics channel in the mapping.
    #[error("no electronics channel for {category:?} cell (side {side}, layer {layer}, row {row})")]
    UnmappedCell {
        category: crate::address::HitCategory,
        side: u8,
        layer: u16,
        row: u16,
    },

    /// An electronics channel has no detector cell in the mapping.
    #[error("no detector cell for channel {channel} of board {board_id} in crate {crate_id}")]
    UnmappedChannel {
        crate_id: u8,
        board_id: u8,
        channel: u8,
    },

    /// Configuration error with a free-form message.
    #[error("configuration error: {0}")]
    Config(String),
}
