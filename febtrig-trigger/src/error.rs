//! Error types for febtrig-trigger.

use thiserror::Error;

/// Result type alias for trigger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Trigger stage and engine errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Error raised by the core layer.
    #[error(transparent)]
    Core(#[from] febtrig_core::Error),

    /// Error raised by the digitization layer.
    #[error(transparent)]
    Digitize(#[from] febtrig_digitize::Error),

    /// I/O failure while loading a pattern memory file.
    #[error("memory file i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed pattern memory file.
    #[error("memory file line {line}: {reason}")]
    MemoryFormat { line: usize, reason: String },

    /// A memory address or data word outside the programmed geometry.
    #[error("memory value {value:#x} does not fit in {bits} bits")]
    MemoryRange { value: u32, bits: u32 },
}
