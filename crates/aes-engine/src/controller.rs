//! Block-level handshake with the engine.
//!
//! [`EngineController`] owns the register interface and a small state
//! machine:
//!
//! ```text
//! Idle --init--> Configured --load_key--> KeyLoaded <--> Processing(1..=depth)
//!   ^                                                        |
//!   +------------------------- clear ------------------------+  (from any state)
//! ```
//!
//! A wait that runs out of polls moves the controller to `Halted`, where
//! only `clear` is accepted. The controller never decides ordering across
//! blocks; that is the job of a [`SequencingPolicy`](crate::SequencingPolicy).

use log::{debug, info, trace, warn};

use crate::block::{block_to_words, words_to_block, Block, Key, BLOCK_WORDS};
use crate::config::{ControllerConfig, EngineConfig, MAX_PIPELINE_DEPTH};
use crate::error::{AwaitedFlag, EngineError, EngineResult};
use crate::regs::{Control, EngineRegisters, Status, Trigger};
use crate::wait::{self, TimedOut};

/// Externally visible controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// No configuration programmed.
    Idle,
    /// Control register programmed, no key yet.
    Configured,
    /// Key loaded, nothing in flight.
    KeyLoaded,
    /// Blocks submitted and not yet retrieved.
    Processing {
        /// Number of blocks in flight.
        in_flight: usize,
    },
    /// A wait timed out; only `clear` is accepted.
    Halted,
}

#[derive(Debug)]
struct Session {
    config: EngineConfig,
    key_loaded: bool,
    in_flight: usize,
    awaiting_trigger: bool,
    submitted: u64,
    retrieved: u64,
    halted: bool,
}

impl Session {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            key_loaded: false,
            in_flight: 0,
            awaiting_trigger: false,
            submitted: 0,
            retrieved: 0,
            halted: false,
        }
    }
}

/// Stateful driver for one physical engine.
pub struct EngineController<R: EngineRegisters> {
    regs: R,
    limits: ControllerConfig,
    session: Option<Session>,
}

impl<R: EngineRegisters> EngineController<R> {
    /// Creates a controller with default limits. The core is not touched
    /// until [`clear`](Self::clear) or [`init`](Self::init).
    pub fn new(regs: R) -> Self {
        Self {
            regs,
            limits: ControllerConfig::default(),
            session: None,
        }
    }

    /// Creates a controller with explicit limits.
    pub fn with_config(regs: R, limits: ControllerConfig) -> EngineResult<Self> {
        if limits.pipeline_depth == 0 || limits.pipeline_depth > MAX_PIPELINE_DEPTH {
            return Err(EngineError::invalid_config(format!(
                "pipeline depth {} outside 1..={}",
                limits.pipeline_depth, MAX_PIPELINE_DEPTH
            )));
        }
        // A zero budget times out before the first status read.
        if limits.poll_limit == 0 {
            return Err(EngineError::invalid_config("poll limit must be at least 1"));
        }
        Ok(Self {
            regs,
            limits,
            session: None,
        })
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        match &self.session {
            None => EngineState::Idle,
            Some(s) if s.halted => EngineState::Halted,
            Some(s) if !s.key_loaded => EngineState::Configured,
            Some(s) if s.in_flight == 0 => EngineState::KeyLoaded,
            Some(s) => EngineState::Processing {
                in_flight: s.in_flight,
            },
        }
    }

    /// Session configuration, if `init` has run since the last `clear`.
    pub fn config(&self) -> Option<&EngineConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    /// Controller limits.
    pub fn limits(&self) -> &ControllerConfig {
        &self.limits
    }

    /// Blocks submitted and not yet retrieved.
    pub fn in_flight(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.in_flight)
    }

    /// Shared access to the register interface.
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Exclusive access to the register interface.
    ///
    /// Writing registers behind the controller's back invalidates its
    /// bookkeeping; call [`clear`](Self::clear) afterwards.
    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Releases the register interface.
    pub fn into_inner(self) -> R {
        self.regs
    }

    /// Returns the core to idle, discarding key material and any blocks in
    /// flight. Always succeeds.
    pub fn clear(&mut self) {
        self.regs
            .write_trigger(Trigger::KEY_IV_DATA_IN_CLEAR | Trigger::DATA_OUT_CLEAR);
        if let Some(session) = self.session.take() {
            info!(
                "engine cleared ({} submitted, {} retrieved, {} dropped)",
                session.submitted, session.retrieved, session.in_flight
            );
        }
    }

    /// Programs direction, key length and pacing mode.
    pub fn init(&mut self, config: EngineConfig) -> EngineResult<()> {
        self.expect_state("init", |state| state == EngineState::Idle)?;

        let features = self.regs.features();
        if !features.supports_operation(config.operation) {
            return Err(EngineError::invalid_config(format!(
                "{:?} not supported by this core",
                config.operation
            )));
        }
        if !features.supports_key_length(config.key_length) {
            return Err(EngineError::invalid_config(format!(
                "{} not supported by this core",
                config.key_length
            )));
        }

        // The control register ignores writes while the core is busy.
        self.wait_for(Status::IDLE, AwaitedFlag::Idle, 0)?;
        self.regs.write_ctrl(Control::from_config(&config));
        info!(
            "engine configured: {:?} {} {}",
            config.operation,
            config.key_length,
            if config.manual_operation { "manual" } else { "automatic" }
        );
        self.session = Some(Session::new(config));
        Ok(())
    }

    /// Writes key material. Replaces any previously loaded key.
    pub fn load_key(&mut self, key: &Key) -> EngineResult<()> {
        self.expect_state("load_key", |state| {
            matches!(state, EngineState::Configured | EngineState::KeyLoaded)
        })?;
        let session = self.session_mut("load_key")?;
        if key.length() != session.config.key_length {
            return Err(EngineError::invalid_config(format!(
                "{} key loaded into a {} session",
                key.length(),
                session.config.key_length
            )));
        }
        session.key_loaded = true;

        for (index, word) in key.to_words().iter().enumerate() {
            self.regs.write_key(index, *word);
        }
        debug!("{} key loaded", key.length());
        Ok(())
    }

    /// Writes one block without checking `INPUT_READY`.
    ///
    /// Only safe when readiness is already known, e.g. right after a
    /// retrieval freed the input register.
    pub fn submit_block(&mut self, block: &Block) -> EngineResult<()> {
        self.check_submit("submit_block")?;
        self.write_block(block);
        Ok(())
    }

    /// Waits for `INPUT_READY`, then writes one block.
    pub fn submit_block_wait(&mut self, block: &Block) -> EngineResult<()> {
        self.check_submit("submit_block_wait")?;
        let index = self.session.as_ref().map_or(0, |s| s.submitted);
        self.wait_for(Status::INPUT_READY, AwaitedFlag::InputReady, index)?;
        self.write_block(block);
        Ok(())
    }

    /// Starts the most recently submitted block (manual mode only).
    pub fn trigger(&mut self) -> EngineResult<()> {
        let state = self.state();
        let armed = self
            .session
            .as_ref()
            .is_some_and(|s| s.config.manual_operation && s.awaiting_trigger && !s.halted);
        if !armed {
            return Err(EngineError::InvalidState {
                operation: "trigger",
                state,
            });
        }
        self.regs.write_trigger(Trigger::START);
        let session = self.session_mut("trigger")?;
        session.awaiting_trigger = false;
        trace!("triggered block {}", session.submitted - 1);
        Ok(())
    }

    /// Reads one block without checking `OUTPUT_VALID`.
    ///
    /// Returns whatever the output register holds; stale if the block has
    /// not finished.
    pub fn retrieve_block(&mut self) -> EngineResult<Block> {
        self.check_retrieve("retrieve_block")?;
        Ok(self.read_block())
    }

    /// Waits for `OUTPUT_VALID`, then reads one block.
    pub fn retrieve_block_wait(&mut self) -> EngineResult<Block> {
        self.check_retrieve("retrieve_block_wait")?;
        let index = self.session.as_ref().map_or(0, |s| s.retrieved);
        self.wait_for(Status::OUTPUT_VALID, AwaitedFlag::OutputValid, index)?;
        Ok(self.read_block())
    }

    /// Runs the recovery sequence: `clear`, `init`, `load_key`.
    pub fn restart(&mut self, config: EngineConfig, key: &Key) -> EngineResult<()> {
        self.clear();
        self.init(config)?;
        self.load_key(key)
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: impl Fn(EngineState) -> bool,
    ) -> EngineResult<()> {
        let state = self.state();
        if allowed(state) {
            Ok(())
        } else {
            Err(EngineError::InvalidState { operation, state })
        }
    }

    fn session_mut(&mut self, operation: &'static str) -> EngineResult<&mut Session> {
        self.session.as_mut().ok_or(EngineError::InvalidState {
            operation,
            state: EngineState::Idle,
        })
    }

    fn check_submit(&self, operation: &'static str) -> EngineResult<()> {
        let state = self.state();
        let Some(session) = self.session.as_ref() else {
            return Err(EngineError::InvalidState { operation, state });
        };
        match state {
            EngineState::KeyLoaded => Ok(()),
            EngineState::Processing { in_flight } => {
                if session.config.manual_operation {
                    // One block at a time: submit, trigger, retrieve.
                    Err(EngineError::InvalidState { operation, state })
                } else if in_flight >= self.limits.pipeline_depth {
                    Err(EngineError::PipelineFull {
                        depth: self.limits.pipeline_depth,
                    })
                } else {
                    Ok(())
                }
            }
            _ => Err(EngineError::InvalidState { operation, state }),
        }
    }

    fn check_retrieve(&self, operation: &'static str) -> EngineResult<()> {
        let state = self.state();
        match (&self.session, state) {
            (Some(s), EngineState::Processing { .. }) if !s.awaiting_trigger => Ok(()),
            _ => Err(EngineError::InvalidState { operation, state }),
        }
    }

    fn wait_for(&mut self, flag: Status, awaited: AwaitedFlag, block: u64) -> EngineResult<()> {
        let regs = &mut self.regs;
        match wait::until(self.limits.poll_limit, || regs.status().contains(flag)) {
            Ok(polls) => {
                trace!("{awaited} after {polls} polls");
                Ok(())
            }
            Err(TimedOut { polls }) => {
                if let Some(session) = self.session.as_mut() {
                    session.halted = true;
                }
                warn!("timed out waiting for {awaited} on block {block} ({polls} polls)");
                Err(EngineError::EngineTimeout {
                    flag: awaited,
                    block,
                    polls,
                })
            }
        }
    }

    fn write_block(&mut self, block: &Block) {
        for (index, word) in block_to_words(block).iter().enumerate() {
            self.regs.write_data_in(index, *word);
        }
        if let Some(session) = self.session.as_mut() {
            session.in_flight += 1;
            session.submitted += 1;
            session.awaiting_trigger = session.config.manual_operation;
        }
    }

    fn read_block(&mut self) -> Block {
        let mut words = [0u32; BLOCK_WORDS];
        for (index, word) in words.iter_mut().enumerate() {
            *word = self.regs.read_data_out(index);
        }
        if let Some(session) = self.session.as_mut() {
            session.in_flight -= 1;
            session.retrieved += 1;
        }
        words_to_block(&words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{KeyLength, KEY_WORDS};
    use crate::config::Operation;
    use crate::regs::Features;

    /// Register double with a fixed status value that records every write.
    struct FakeRegs {
        features: Features,
        status: Status,
        status_reads: u32,
        ctrl: Vec<Control>,
        triggers: Vec<Trigger>,
        key: [u32; KEY_WORDS],
        data_in: Vec<u32>,
        data_out: [u32; BLOCK_WORDS],
    }

    impl FakeRegs {
        fn ready() -> Self {
            Self {
                features: Features::ENCRYPT | Features::DECRYPT | Features::KEY_128,
                status: Status::IDLE | Status::INPUT_READY | Status::OUTPUT_VALID,
                status_reads: 0,
                ctrl: Vec::new(),
                triggers: Vec::new(),
                key: [0; KEY_WORDS],
                data_in: Vec::new(),
                data_out: [0; BLOCK_WORDS],
            }
        }
    }

    impl EngineRegisters for FakeRegs {
        fn status(&mut self) -> Status {
            self.status_reads += 1;
            self.status
        }

        fn features(&self) -> Features {
            self.features
        }

        fn write_ctrl(&mut self, ctrl: Control) {
            self.ctrl.push(ctrl);
        }

        fn write_trigger(&mut self, trigger: Trigger) {
            self.triggers.push(trigger);
        }

        fn write_key(&mut self, index: usize, word: u32) {
            self.key[index] = word;
        }

        fn write_data_in(&mut self, _index: usize, word: u32) {
            self.data_in.push(word);
        }

        fn read_data_out(&mut self, index: usize) -> u32 {
            self.data_out[index]
        }
    }

    const KEY: [u8; 16] = [0x11; 16];

    fn keyed(config: EngineConfig) -> EngineController<FakeRegs> {
        let mut engine = EngineController::new(FakeRegs::ready());
        engine.restart(config, &Key::from(KEY)).unwrap();
        engine
    }

    #[test]
    fn walks_the_state_machine() {
        let mut engine = EngineController::new(FakeRegs::ready());
        assert_eq!(engine.state(), EngineState::Idle);

        engine.init(EngineConfig::encrypt_128()).unwrap();
        assert_eq!(engine.state(), EngineState::Configured);
        assert_eq!(engine.regs().ctrl, vec![Control::from_config(&EngineConfig::encrypt_128())]);

        engine.load_key(&Key::from(KEY)).unwrap();
        assert_eq!(engine.state(), EngineState::KeyLoaded);
        assert_eq!(engine.regs().key[0], 0x1111_1111);

        engine.submit_block_wait(&[0u8; 16]).unwrap();
        assert_eq!(engine.state(), EngineState::Processing { in_flight: 1 });
        engine.submit_block_wait(&[1u8; 16]).unwrap();
        assert_eq!(engine.state(), EngineState::Processing { in_flight: 2 });

        engine.retrieve_block_wait().unwrap();
        engine.retrieve_block_wait().unwrap();
        assert_eq!(engine.state(), EngineState::KeyLoaded);

        engine.clear();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.config().is_none());
    }

    #[test]
    fn rejects_data_before_key() {
        let mut engine = EngineController::new(FakeRegs::ready());
        let err = engine.submit_block_wait(&[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidState {
                operation: "submit_block_wait",
                state: EngineState::Idle
            }
        );

        engine.init(EngineConfig::encrypt_128()).unwrap();
        assert!(matches!(
            engine.submit_block(&[0u8; 16]),
            Err(EngineError::InvalidState {
                state: EngineState::Configured,
                ..
            })
        ));
        assert!(engine.regs().data_in.is_empty());
    }

    #[test]
    fn init_requires_idle() {
        let mut engine = keyed(EngineConfig::encrypt_128());
        assert!(matches!(
            engine.init(EngineConfig::encrypt_128()),
            Err(EngineError::InvalidState { operation: "init", .. })
        ));
    }

    #[test]
    fn init_rejects_unsupported_key_length() {
        let mut engine = EngineController::new(FakeRegs::ready());
        let config = EngineConfig {
            key_length: KeyLength::Aes256,
            ..EngineConfig::encrypt_128()
        };
        assert!(matches!(engine.init(config), Err(EngineError::InvalidConfig { .. })));
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.regs().ctrl.is_empty());
    }

    #[test]
    fn init_rejects_unsupported_operation() {
        let mut regs = FakeRegs::ready();
        regs.features = Features::ENCRYPT | Features::KEY_128;
        let mut engine = EngineController::new(regs);
        let config = EngineConfig::encrypt_128().with_operation(Operation::Decrypt);
        assert!(matches!(engine.init(config), Err(EngineError::InvalidConfig { .. })));
    }

    #[test]
    fn key_length_must_match_session() {
        let mut engine = EngineController::new(FakeRegs::ready());
        engine.init(EngineConfig::encrypt_128()).unwrap();
        let err = engine.load_key(&Key::Aes256([0; 32])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
        assert_eq!(engine.state(), EngineState::Configured);
    }

    #[test]
    fn key_cannot_change_mid_stream() {
        let mut engine = keyed(EngineConfig::encrypt_128());
        engine.submit_block_wait(&[0u8; 16]).unwrap();
        assert!(matches!(
            engine.load_key(&Key::from(KEY)),
            Err(EngineError::InvalidState { .. })
        ));
    }

    #[test]
    fn pipeline_depth_is_enforced() {
        let mut engine = keyed(EngineConfig::encrypt_128());
        engine.submit_block_wait(&[0u8; 16]).unwrap();
        engine.submit_block(&[1u8; 16]).unwrap();
        let written = engine.regs().data_in.len();

        assert_eq!(
            engine.submit_block_wait(&[2u8; 16]),
            Err(EngineError::PipelineFull { depth: 2 })
        );
        assert_eq!(engine.regs().data_in.len(), written);
        assert_eq!(engine.state(), EngineState::Processing { in_flight: 2 });
    }

    #[test]
    fn depth_one_serialises_automatic_mode() {
        let limits = ControllerConfig {
            pipeline_depth: 1,
            ..ControllerConfig::default()
        };
        let mut engine = EngineController::with_config(FakeRegs::ready(), limits).unwrap();
        engine
            .restart(EngineConfig::encrypt_128(), &Key::from(KEY))
            .unwrap();
        engine.submit_block_wait(&[0u8; 16]).unwrap();
        assert_eq!(
            engine.submit_block_wait(&[0u8; 16]),
            Err(EngineError::PipelineFull { depth: 1 })
        );
    }

    #[test]
    fn invalid_depth_is_rejected() {
        for depth in [0, 3] {
            let limits = ControllerConfig {
                pipeline_depth: depth,
                ..ControllerConfig::default()
            };
            assert!(matches!(
                EngineController::with_config(FakeRegs::ready(), limits),
                Err(EngineError::InvalidConfig { .. })
            ));
        }
    }

    #[test]
    fn zero_poll_limit_is_rejected() {
        let limits = ControllerConfig {
            poll_limit: 0,
            ..ControllerConfig::default()
        };
        assert!(matches!(
            EngineController::with_config(FakeRegs::ready(), limits),
            Err(EngineError::InvalidConfig { .. })
        ));

        let limits = ControllerConfig {
            poll_limit: 1,
            ..ControllerConfig::default()
        };
        let mut engine = EngineController::with_config(FakeRegs::ready(), limits).unwrap();
        engine.init(EngineConfig::encrypt_128()).unwrap();
        assert_eq!(engine.regs().status_reads, 1);
    }

    #[test]
    fn manual_mode_needs_trigger_before_retrieve() {
        let mut engine = keyed(EngineConfig::encrypt_128().with_manual_operation(true));
        engine.submit_block_wait(&[0u8; 16]).unwrap();

        assert!(matches!(
            engine.retrieve_block_wait(),
            Err(EngineError::InvalidState { .. })
        ));
        assert!(matches!(
            engine.submit_block_wait(&[0u8; 16]),
            Err(EngineError::InvalidState { .. })
        ));

        engine.trigger().unwrap();
        assert_eq!(engine.regs().triggers.last(), Some(&Trigger::START));
        assert!(matches!(engine.trigger(), Err(EngineError::InvalidState { .. })));

        engine.retrieve_block_wait().unwrap();
        assert_eq!(engine.state(), EngineState::KeyLoaded);
    }

    #[test]
    fn trigger_is_rejected_in_automatic_mode() {
        let mut engine = keyed(EngineConfig::encrypt_128());
        engine.submit_block_wait(&[0u8; 16]).unwrap();
        assert!(matches!(
            engine.trigger(),
            Err(EngineError::InvalidState { operation: "trigger", .. })
        ));
        assert!(!engine.regs().triggers.contains(&Trigger::START));
    }

    #[test]
    fn retrieve_with_nothing_in_flight_is_rejected() {
        let mut engine = keyed(EngineConfig::encrypt_128());
        assert!(matches!(
            engine.retrieve_block(),
            Err(EngineError::InvalidState {
                state: EngineState::KeyLoaded,
                ..
            })
        ));
    }

    #[test]
    fn timeout_is_bounded_and_halts() {
        let mut engine = keyed(EngineConfig::encrypt_128());
        engine.regs_mut().status = Status::BUSY;
        let before = engine.regs().status_reads;

        let err = engine.submit_block_wait(&[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            EngineError::EngineTimeout {
                flag: AwaitedFlag::InputReady,
                block: 0,
                polls: ControllerConfig::default().poll_limit,
            }
        );
        assert_eq!(
            engine.regs().status_reads - before,
            ControllerConfig::default().poll_limit
        );
        assert_eq!(engine.state(), EngineState::Halted);
        assert!(matches!(
            engine.submit_block(&[0u8; 16]),
            Err(EngineError::InvalidState {
                state: EngineState::Halted,
                ..
            })
        ));

        engine.regs_mut().status = Status::IDLE | Status::INPUT_READY;
        engine
            .restart(EngineConfig::encrypt_128(), &Key::from(KEY))
            .unwrap();
        assert_eq!(engine.state(), EngineState::KeyLoaded);
    }

    #[test]
    fn retrieve_timeout_names_the_block() {
        let mut engine = keyed(EngineConfig::encrypt_128());
        engine.submit_block_wait(&[0u8; 16]).unwrap();
        engine.retrieve_block_wait().unwrap();
        engine.submit_block_wait(&[0u8; 16]).unwrap();
        engine.regs_mut().status = Status::BUSY;

        match engine.retrieve_block_wait() {
            Err(EngineError::EngineTimeout { flag, block, .. }) => {
                assert_eq!(flag, AwaitedFlag::OutputValid);
                assert_eq!(block, 1);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn clear_is_idempotent_and_always_writes_clear_bits() {
        let mut engine = EngineController::new(FakeRegs::ready());
        engine.clear();
        engine.clear();
        let clear = Trigger::KEY_IV_DATA_IN_CLEAR | Trigger::DATA_OUT_CLEAR;
        assert_eq!(engine.regs().triggers, vec![clear, clear]);
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn blocks_cross_the_registers_as_le_words() {
        let mut engine = keyed(EngineConfig::encrypt_128());
        let block: Block = core::array::from_fn(|i| i as u8);
        engine.submit_block(&block).unwrap();
        assert_eq!(engine.regs().data_in[0], 0x0302_0100);

        engine.regs_mut().data_out = [0x0302_0100, 0x0706_0504, 0x0b0a_0908, 0x0f0e_0d0c];
        assert_eq!(engine.retrieve_block().unwrap(), block);
    }
}
