//! Register interface of the block engine.
//!
//! The layout follows the OpenTitan-style AES block: a status register, a
//! one-hot control register, a self-clearing trigger register, eight key
//! words, and four words each of input and output data. How those registers
//! are reached (MMIO, a bus model, a test double) is left to implementors of
//! [`EngineRegisters`].

use bitflags::bitflags;

use crate::block::KeyLength;
use crate::config::{EngineConfig, Operation};

bitflags! {
    /// Status register.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Core is idle and its control register may be written
        const IDLE         = 1 << 0;
        /// Core holds a finished block it cannot move to the output register
        const STALL        = 1 << 1;
        /// An output block was overwritten before it was read
        const OUTPUT_LOST  = 1 << 2;
        /// Output register holds a finished block (cleared by reading all words)
        const OUTPUT_VALID = 1 << 3;
        /// Input register can accept a new block
        const INPUT_READY  = 1 << 4;
        /// Core is processing a block
        const BUSY         = 1 << 5;
    }
}

bitflags! {
    /// Control register. Only writable while the core is idle.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Control: u32 {
        /// Encrypt
        const OP_ENCRYPT       = 1 << 0;
        /// Decrypt
        const OP_DECRYPT       = 1 << 1;
        /// Electronic codebook
        const MODE_ECB         = 1 << 2;
        /// 128-bit key
        const KEY_128          = 1 << 8;
        /// 192-bit key
        const KEY_192          = 1 << 9;
        /// 256-bit key
        const KEY_256          = 1 << 10;
        /// Blocks start on `Trigger::START` instead of on input
        const MANUAL_OPERATION = 1 << 15;
    }
}

bitflags! {
    /// Trigger register. Bits self-clear once the core acts on them.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Trigger: u32 {
        /// Start processing the block in the input register (manual mode)
        const START                = 1 << 0;
        /// Wipe key, IV and input data
        const KEY_IV_DATA_IN_CLEAR = 1 << 1;
        /// Wipe output data
        const DATA_OUT_CLEAR       = 1 << 2;
    }
}

bitflags! {
    /// Feature register, fixed per hardware revision.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Features: u32 {
        /// Encryption datapath present
        const ENCRYPT = 1 << 0;
        /// Decryption datapath present
        const DECRYPT = 1 << 1;
        /// 128-bit key schedule present
        const KEY_128 = 1 << 8;
        /// 192-bit key schedule present
        const KEY_192 = 1 << 9;
        /// 256-bit key schedule present
        const KEY_256 = 1 << 10;
    }
}

impl Control {
    /// Encodes a session configuration (ECB is the only mode driven).
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut ctrl = Self::MODE_ECB;
        ctrl |= match config.operation {
            Operation::Encrypt => Self::OP_ENCRYPT,
            Operation::Decrypt => Self::OP_DECRYPT,
        };
        ctrl |= match config.key_length {
            KeyLength::Aes128 => Self::KEY_128,
            KeyLength::Aes192 => Self::KEY_192,
            KeyLength::Aes256 => Self::KEY_256,
        };
        if config.manual_operation {
            ctrl |= Self::MANUAL_OPERATION;
        }
        ctrl
    }

    /// Decoded direction, if exactly one OP bit is set.
    pub fn operation(&self) -> Option<Operation> {
        match (self.contains(Self::OP_ENCRYPT), self.contains(Self::OP_DECRYPT)) {
            (true, false) => Some(Operation::Encrypt),
            (false, true) => Some(Operation::Decrypt),
            _ => None,
        }
    }

    /// Decoded key length, if exactly one KEY bit is set.
    pub fn key_length(&self) -> Option<KeyLength> {
        let keys = self.intersection(Self::KEY_128 | Self::KEY_192 | Self::KEY_256);
        if keys == Self::KEY_128 {
            Some(KeyLength::Aes128)
        } else if keys == Self::KEY_192 {
            Some(KeyLength::Aes192)
        } else if keys == Self::KEY_256 {
            Some(KeyLength::Aes256)
        } else {
            None
        }
    }

    /// `true` when blocks wait for `Trigger::START`.
    pub fn is_manual(&self) -> bool {
        self.contains(Self::MANUAL_OPERATION)
    }
}

impl Features {
    /// Whether this revision implements the given direction.
    pub fn supports_operation(&self, operation: Operation) -> bool {
        match operation {
            Operation::Encrypt => self.contains(Self::ENCRYPT),
            Operation::Decrypt => self.contains(Self::DECRYPT),
        }
    }

    /// Whether this revision implements the given key length.
    pub fn supports_key_length(&self, key_length: KeyLength) -> bool {
        match key_length {
            KeyLength::Aes128 => self.contains(Self::KEY_128),
            KeyLength::Aes192 => self.contains(Self::KEY_192),
            KeyLength::Aes256 => self.contains(Self::KEY_256),
        }
    }
}

/// Access to the engine's registers.
///
/// `status` takes `&mut self` because a status read is a volatile access
/// with side effects on real hardware and advances time in a model.
pub trait EngineRegisters {
    /// Reads the status register.
    fn status(&mut self) -> Status;
    /// Reads the feature register.
    fn features(&self) -> Features;
    /// Writes the control register.
    fn write_ctrl(&mut self, ctrl: Control);
    /// Writes the trigger register.
    fn write_trigger(&mut self, trigger: Trigger);
    /// Writes key register `index` (0..8).
    fn write_key(&mut self, index: usize, word: u32);
    /// Writes input data register `index` (0..4).
    fn write_data_in(&mut self, index: usize, word: u32);
    /// Reads output data register `index` (0..4).
    fn read_data_out(&mut self, index: usize) -> u32;
}

impl<T: EngineRegisters + ?Sized> EngineRegisters for &mut T {
    fn status(&mut self) -> Status {
        (**self).status()
    }

    fn features(&self) -> Features {
        (**self).features()
    }

    fn write_ctrl(&mut self, ctrl: Control) {
        (**self).write_ctrl(ctrl)
    }

    fn write_trigger(&mut self, trigger: Trigger) {
        (**self).write_trigger(trigger)
    }

    fn write_key(&mut self, index: usize, word: u32) {
        (**self).write_key(index, word)
    }

    fn write_data_in(&mut self, index: usize, word: u32) {
        (**self).write_data_in(index, word)
    }

    fn read_data_out(&mut self, index: usize) -> u32 {
        (**self).read_data_out(index)
    }
}
