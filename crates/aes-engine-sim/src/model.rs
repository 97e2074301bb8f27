//! Register-level behaviour of the modelled engine.

use aes::cipher::consts::U16;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use aes::Aes128;
use aes_engine::{
    block_to_words, le_bytes, words_to_block, Block, Control, EngineRegisters, Features, KeyLength,
    Operation, Status, Trigger, BLOCK_WORDS, KEY_WORDS,
};
use log::{trace, warn};
use serde::{Deserialize, Serialize};

/// Model parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Status reads a block spends in the processing stage.
    pub latency: u32,
    /// Whether this revision has a decryption datapath.
    pub decrypt: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            latency: 4,
            decrypt: true,
        }
    }
}

/// Injected misbehaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fault {
    /// Behaves like the hardware.
    #[default]
    None,
    /// Status reads only ever report `BUSY`; nothing progresses.
    StuckBusy,
    /// Blocks start but never finish.
    NeverFinish,
}

/// Counters for checking how the model was driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Status register reads (one per simulated cycle).
    pub status_reads: u64,
    /// Blocks that entered the processing stage.
    pub started: u64,
    /// Blocks that reached the output register.
    pub completed: u64,
    /// Complete output reads.
    pub retrieved: u64,
    /// Input writes dropped because the input register was full.
    pub overruns: u64,
    /// Complete output reads while `OUTPUT_VALID` was low.
    pub stale_reads: u64,
    /// Control writes ignored because the core was not idle.
    pub ignored_ctrl_writes: u64,
}

#[derive(Clone, Copy, Debug)]
struct Job {
    block: Block,
    remaining: u32,
}

/// Software model of the block engine.
pub struct SimCore {
    config: SimConfig,
    fault: Fault,
    ctrl: Control,
    key: [u32; KEY_WORDS],
    data_in: [u32; BLOCK_WORDS],
    data_in_written: [bool; BLOCK_WORDS],
    input: Option<Block>,
    job: Option<Job>,
    data_out: [u32; BLOCK_WORDS],
    data_out_read: [bool; BLOCK_WORDS],
    output_valid: bool,
    stats: SimStats,
}

impl Default for SimCore {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCore {
    /// Creates a model with default parameters.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Creates a model with explicit parameters.
    pub fn with_config(config: SimConfig) -> Self {
        Self {
            config,
            fault: Fault::None,
            ctrl: Control::empty(),
            key: [0; KEY_WORDS],
            data_in: [0; BLOCK_WORDS],
            data_in_written: [false; BLOCK_WORDS],
            input: None,
            job: None,
            data_out: [0; BLOCK_WORDS],
            data_out_read: [false; BLOCK_WORDS],
            output_valid: false,
            stats: SimStats::default(),
        }
    }

    /// Model parameters.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Injects (or with [`Fault::None`] removes) a fault.
    pub fn inject(&mut self, fault: Fault) {
        self.fault = fault;
    }

    /// Counters since construction.
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Blocks currently held by the model (input, processing and output).
    pub fn occupancy(&self) -> usize {
        usize::from(self.input.is_some())
            + usize::from(self.job.is_some())
            + usize::from(self.output_valid)
    }

    /// Advances one cycle.
    fn tick(&mut self) {
        if self.fault == Fault::NeverFinish {
            return;
        }
        if let Some(job) = self.job.as_mut() {
            job.remaining = job.remaining.saturating_sub(1);
        }
        self.settle();
    }

    /// Moves blocks between stages without consuming a cycle.
    fn settle(&mut self) {
        if let Some(job) = self.job {
            if job.remaining == 0 && !self.output_valid && self.fault != Fault::NeverFinish {
                let result = self.transform(&job.block);
                self.data_out = block_to_words(&result);
                self.data_out_read = [false; BLOCK_WORDS];
                self.output_valid = true;
                self.job = None;
                self.stats.completed += 1;
                trace!("block {} completed", self.stats.completed - 1);
            }
        }
        if !self.ctrl.is_manual() {
            self.start();
        }
    }

    /// Moves the input register into the processing stage if it is free.
    fn start(&mut self) {
        if self.job.is_some() {
            return;
        }
        if let Some(block) = self.input.take() {
            self.job = Some(Job {
                block,
                remaining: self.config.latency,
            });
            self.stats.started += 1;
            trace!("block {} started", self.stats.started - 1);
            self.settle_completed();
        }
    }

    // A zero-latency block finishes as soon as it starts.
    fn settle_completed(&mut self) {
        if self.job.is_some_and(|job| job.remaining == 0) && !self.output_valid {
            self.settle();
        }
    }

    fn key_bytes(&self) -> [u8; 4 * KEY_WORDS] {
        let mut bytes = [0u8; 4 * KEY_WORDS];
        le_bytes(&self.key, &mut bytes);
        bytes
    }

    fn transform(&self, block: &Block) -> Block {
        let (Some(operation), Some(KeyLength::Aes128)) =
            (self.ctrl.operation(), self.ctrl.key_length())
        else {
            warn!("control register {:#x} not runnable; passing block through", self.ctrl.bits());
            return *block;
        };
        let key = self.key_bytes();
        let mut buf = GenericArray::clone_from_slice(block);
        apply::<Aes128>(&key[..KeyLength::Aes128.bytes()], operation, &mut buf);
        let mut out = [0u8; 16];
        out.copy_from_slice(&buf);
        out
    }

    fn is_idle(&self) -> bool {
        self.job.is_none() && self.input.is_none()
    }
}

fn apply<C>(key: &[u8], operation: Operation, block: &mut aes::Block)
where
    C: KeyInit + BlockEncrypt + BlockDecrypt + BlockSizeUser<BlockSize = U16>,
{
    let cipher = C::new(GenericArray::from_slice(key));
    match operation {
        Operation::Encrypt => cipher.encrypt_block(block),
        Operation::Decrypt => cipher.decrypt_block(block),
    }
}

impl EngineRegisters for SimCore {
    fn status(&mut self) -> Status {
        self.stats.status_reads += 1;
        if self.fault == Fault::StuckBusy {
            return Status::BUSY;
        }
        self.tick();

        let mut status = Status::empty();
        if self.is_idle() {
            status |= Status::IDLE;
        }
        if self.input.is_none() {
            status |= Status::INPUT_READY;
        }
        if self.output_valid {
            status |= Status::OUTPUT_VALID;
        }
        if let Some(job) = self.job {
            status |= Status::BUSY;
            if job.remaining == 0 && self.output_valid {
                status |= Status::STALL;
            }
        }
        status
    }

    fn features(&self) -> Features {
        let mut features = Features::ENCRYPT | Features::KEY_128;
        if self.config.decrypt {
            features |= Features::DECRYPT;
        }
        features
    }

    fn write_ctrl(&mut self, ctrl: Control) {
        if !self.is_idle() {
            self.stats.ignored_ctrl_writes += 1;
            warn!("control write {:#x} ignored while busy", ctrl.bits());
            return;
        }
        self.ctrl = ctrl;
    }

    fn write_trigger(&mut self, trigger: Trigger) {
        if trigger.contains(Trigger::KEY_IV_DATA_IN_CLEAR) {
            self.key = [0; KEY_WORDS];
            self.data_in = [0; BLOCK_WORDS];
            self.data_in_written = [false; BLOCK_WORDS];
            self.input = None;
            self.job = None;
        }
        if trigger.contains(Trigger::DATA_OUT_CLEAR) {
            self.data_out = [0; BLOCK_WORDS];
            self.data_out_read = [false; BLOCK_WORDS];
            self.output_valid = false;
        }
        if trigger.contains(Trigger::START) && self.ctrl.is_manual() {
            self.start();
        }
    }

    fn write_key(&mut self, index: usize, word: u32) {
        self.key[index] = word;
    }

    fn write_data_in(&mut self, index: usize, word: u32) {
        self.data_in[index] = word;
        self.data_in_written[index] = true;
        if !self.data_in_written.iter().all(|&w| w) {
            return;
        }
        self.data_in_written = [false; BLOCK_WORDS];
        if self.input.is_some() {
            self.stats.overruns += 1;
            warn!("input register full; block dropped");
            return;
        }
        self.input = Some(words_to_block(&self.data_in));
        self.settle();
    }

    fn read_data_out(&mut self, index: usize) -> u32 {
        let word = self.data_out[index];
        self.data_out_read[index] = true;
        if self.data_out_read.iter().all(|&r| r) {
            self.data_out_read = [false; BLOCK_WORDS];
            if self.output_valid {
                self.output_valid = false;
                self.stats.retrieved += 1;
                self.settle();
            } else {
                self.stats.stale_reads += 1;
            }
        }
        word
    }
}
