//! Engine error types.

use thiserror::Error;

use crate::controller::EngineState;

/// Status flag a wait was polling for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AwaitedFlag {
    /// `Status::IDLE`, before programming the control register.
    Idle,
    /// `Status::INPUT_READY`, before writing a block.
    InputReady,
    /// `Status::OUTPUT_VALID`, before reading a block.
    OutputValid,
}

impl core::fmt::Display for AwaitedFlag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::InputReady => "INPUT_READY",
            Self::OutputValid => "OUTPUT_VALID",
        };
        f.write_str(name)
    }
}

/// Errors reported by the controller and the sequencing disciplines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The configuration cannot be run on this core. Fatal to the session.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was rejected.
        reason: String,
    },

    /// A status flag never asserted. The controller is halted until `clear`.
    #[error("engine timeout waiting for {flag} on block {block} after {polls} polls")]
    EngineTimeout {
        /// Flag that was being polled.
        flag: AwaitedFlag,
        /// Index (within the session) of the block being transferred.
        block: u64,
        /// Status reads performed before giving up.
        polls: u32,
    },

    /// An operation was called out of order.
    #[error("`{operation}` not allowed in state {state:?}")]
    InvalidState {
        /// Rejected operation.
        operation: &'static str,
        /// State the controller was in.
        state: EngineState,
    },

    /// A submission would exceed the pipeline depth.
    #[error("pipeline full: {depth} blocks already in flight")]
    PipelineFull {
        /// Configured depth.
        depth: usize,
    },

    /// The output buffer cannot hold the result.
    #[error("output buffer holds {output} blocks but input has {input}")]
    BufferLength {
        /// Input block count.
        input: usize,
        /// Output block capacity.
        output: usize,
    },
}

impl EngineError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// `true` for errors that leave the controller halted.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::EngineTimeout { .. })
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
