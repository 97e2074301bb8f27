//! Control protocol for a fixed-function AES block engine.
//!
//! The engine takes one 16-byte block at a time through a small register
//! file. This crate provides:
//! - [`EngineController`]: the guarded state machine around the engine's
//!   busy/ready handshake, with bounded waits instead of open-ended polls.
//! - [`Manual`] and [`Pipelined`] pacing disciplines for multi-block
//!   streams, selectable at runtime through [`Pacing`].
//! - NIST SP 800-38A known-answer fixtures and byte-exact verification.
//!
//! The cipher itself lives in hardware. Anything that implements
//! [`EngineRegisters`] can stand in for it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod block;
mod config;
mod controller;
mod error;
pub mod fixture;
mod regs;
mod sequencing;
pub mod wait;

pub use crate::block::{
    block_to_words, le_bytes, le_words, words_to_block, Block, Key, KeyLength, BLOCK_SIZE,
    BLOCK_WORDS, KEY_WORDS,
};
pub use crate::config::{ControllerConfig, EngineConfig, Operation, MAX_PIPELINE_DEPTH};
pub use crate::controller::{EngineController, EngineState};
pub use crate::error::{AwaitedFlag, EngineError, EngineResult};
pub use crate::fixture::{VectorFixture, VerificationMismatch};
pub use crate::regs::{Control, EngineRegisters, Features, Status, Trigger};
pub use crate::sequencing::{run_session, Manual, Pacing, Pipelined, SequencingPolicy};
