//! Pacing disciplines for multi-block streams.
//!
//! Both disciplines drive the same controller primitives and must produce
//! identical output for identical input; they differ only in how much work
//! the core has queued at once.

use core::fmt;
use core::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::block::{Block, Key, BLOCK_SIZE};
use crate::config::EngineConfig;
use crate::controller::{EngineController, EngineState};
use crate::error::{EngineError, EngineResult};
use crate::regs::EngineRegisters;

/// Drives a block stream through a keyed controller.
pub trait SequencingPolicy {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Pacing mode the session must have been configured with.
    fn manual_operation(&self) -> bool;

    /// Processes `input` in order, writing one output block per input block
    /// into the front of `output`.
    fn drive<R: EngineRegisters>(
        &self,
        engine: &mut EngineController<R>,
        input: &[Block],
        output: &mut [Block],
    ) -> EngineResult<()>;

    /// Like [`drive`](Self::drive), allocating the output.
    fn run<R: EngineRegisters>(
        &self,
        engine: &mut EngineController<R>,
        input: &[Block],
    ) -> EngineResult<Vec<Block>> {
        let mut output = vec![[0u8; BLOCK_SIZE]; input.len()];
        self.drive(engine, input, &mut output)?;
        Ok(output)
    }
}

/// Submit, trigger, retrieve; one block at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Manual;

/// Keeps up to the controller's pipeline depth of blocks queued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pipelined;

fn preflight<R: EngineRegisters>(
    engine: &EngineController<R>,
    operation: &'static str,
    manual: bool,
    input: &[Block],
    output: &[Block],
) -> EngineResult<()> {
    if output.len() < input.len() {
        return Err(EngineError::BufferLength {
            input: input.len(),
            output: output.len(),
        });
    }
    let state = engine.state();
    let usable = engine
        .config()
        .is_some_and(|cfg| cfg.manual_operation == manual)
        && state == EngineState::KeyLoaded;
    if !usable {
        return Err(EngineError::InvalidState { operation, state });
    }
    Ok(())
}

impl SequencingPolicy for Manual {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn manual_operation(&self) -> bool {
        true
    }

    fn drive<R: EngineRegisters>(
        &self,
        engine: &mut EngineController<R>,
        input: &[Block],
        output: &mut [Block],
    ) -> EngineResult<()> {
        preflight(engine, "manual", true, input, output)?;
        for (i, (block, out)) in input.iter().zip(output.iter_mut()).enumerate() {
            engine.submit_block_wait(block)?;
            engine.trigger()?;
            *out = engine.retrieve_block_wait()?;
            debug!("got data for block {i}");
        }
        Ok(())
    }
}

impl SequencingPolicy for Pipelined {
    fn name(&self) -> &'static str {
        "pipelined"
    }

    fn manual_operation(&self) -> bool {
        false
    }

    fn drive<R: EngineRegisters>(
        &self,
        engine: &mut EngineController<R>,
        input: &[Block],
        output: &mut [Block],
    ) -> EngineResult<()> {
        preflight(engine, "pipelined", false, input, output)?;
        let depth = engine.limits().pipeline_depth;

        let mut next = 0;
        while next < input.len() && next < depth {
            engine.submit_block_wait(&input[next])?;
            next += 1;
        }
        debug!("wrote initial {next} blocks");

        for (i, out) in output[..input.len()].iter_mut().enumerate() {
            *out = engine.retrieve_block_wait()?;
            debug!("got data for block {i}");
            // Refill the slot just freed before waiting on the next output.
            if next < input.len() {
                engine.submit_block_wait(&input[next])?;
                debug!("write for block {next}");
                next += 1;
            }
        }
        Ok(())
    }
}

/// Runtime choice between the two disciplines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// [`Manual`].
    Manual,
    /// [`Pipelined`].
    #[default]
    Pipelined,
}

impl Pacing {
    /// Both disciplines, manual first.
    pub const ALL: [Pacing; 2] = [Pacing::Manual, Pacing::Pipelined];

    /// `config` with its pacing flag set to match this discipline.
    pub fn configure(self, config: EngineConfig) -> EngineConfig {
        config.with_manual_operation(self.manual_operation())
    }
}

impl SequencingPolicy for Pacing {
    fn name(&self) -> &'static str {
        match self {
            Self::Manual => Manual.name(),
            Self::Pipelined => Pipelined.name(),
        }
    }

    fn manual_operation(&self) -> bool {
        matches!(self, Self::Manual)
    }

    fn drive<R: EngineRegisters>(
        &self,
        engine: &mut EngineController<R>,
        input: &[Block],
        output: &mut [Block],
    ) -> EngineResult<()> {
        match self {
            Self::Manual => Manual.drive(engine, input, output),
            Self::Pipelined => Pipelined.drive(engine, input, output),
        }
    }
}

impl fmt::Display for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" | "trigger" => Ok(Self::Manual),
            "pipelined" | "auto" | "automatic" => Ok(Self::Pipelined),
            other => Err(format!("unknown pacing `{other}` (expected manual or pipelined)")),
        }
    }
}

/// Starts a fresh session sized for `policy` and streams `input` through it.
///
/// Runs `clear`, `init` (with the pacing flag taken from `policy`) and
/// `load_key` first, so earlier sessions cannot influence the result. The
/// controller is left keyed with nothing in flight.
pub fn run_session<R, P>(
    engine: &mut EngineController<R>,
    config: EngineConfig,
    key: &Key,
    policy: &P,
    input: &[Block],
) -> EngineResult<Vec<Block>>
where
    R: EngineRegisters,
    P: SequencingPolicy,
{
    let config = config.with_manual_operation(policy.manual_operation());
    engine.restart(config, key)?;
    debug!("{} session over {} blocks", policy.name(), input.len());
    policy.run(engine, input)
}
