//! Session and controller configuration.

use serde::{Deserialize, Serialize};

use crate::block::KeyLength;

/// Deepest pipeline the engine's double-buffered input supports.
pub const MAX_PIPELINE_DEPTH: usize = 2;

/// Cipher direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Plaintext in, ciphertext out.
    Encrypt,
    /// Ciphertext in, plaintext out.
    Decrypt,
}

impl Operation {
    /// The opposite direction.
    pub const fn inverse(self) -> Self {
        match self {
            Self::Encrypt => Self::Decrypt,
            Self::Decrypt => Self::Encrypt,
        }
    }
}

/// What `init` programs into the control register.
///
/// Fixed for the lifetime of a session; a different configuration needs a
/// `clear` followed by a fresh `init`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cipher direction.
    pub operation: Operation,
    /// Key length the core expects.
    pub key_length: KeyLength,
    /// `true` for trigger-paced operation, `false` for automatic start.
    pub manual_operation: bool,
}

impl EngineConfig {
    /// AES-128 encryption in automatic mode.
    pub const fn encrypt_128() -> Self {
        Self {
            operation: Operation::Encrypt,
            key_length: KeyLength::Aes128,
            manual_operation: false,
        }
    }

    /// Returns a copy with the pacing mode replaced.
    pub const fn with_manual_operation(mut self, manual: bool) -> Self {
        self.manual_operation = manual;
        self
    }

    /// Returns a copy with the direction replaced.
    pub const fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::encrypt_128()
    }
}

/// Limits applied by the controller itself rather than the hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Status reads allowed per wait before giving up with a timeout.
    pub poll_limit: u32,
    /// Blocks that may be submitted but not yet retrieved (1..=2).
    pub pipeline_depth: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_limit: 10_000,
            pipeline_depth: MAX_PIPELINE_DEPTH,
        }
    }
}
