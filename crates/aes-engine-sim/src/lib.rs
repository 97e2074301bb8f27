//! Cycle-stepped model of the AES block engine.
//!
//! [`SimCore`] implements [`EngineRegisters`] with the same handshake as the
//! hardware: a one-block input register, a processing stage with a fixed
//! latency, and a one-block output register. A finished block that cannot
//! move to a full output register stalls the core until the output is read.
//! Time only advances when software reads the status register, so a model
//! run is deterministic.
//!
//! Faults can be injected to exercise the controller's timeout paths.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod model;

pub use crate::model::{Fault, SimConfig, SimCore, SimStats};
