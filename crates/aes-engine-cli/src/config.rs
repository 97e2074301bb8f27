//! Harness configuration.
//!
//! Loaded from (highest priority first):
//! 1. Command-line overrides
//! 2. The file named by `--config`
//! 3. Project-local `./aes-engine.toml`
//! 4. Built-in defaults
//!
//! ```toml
//! pacing = "pipelined"
//!
//! [engine]
//! operation = "encrypt"
//! key_length = "128"
//!
//! [controller]
//! poll_limit = 10000
//! pipeline_depth = 2
//!
//! [sim]
//! latency = 4
//! decrypt = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use aes_engine::{ControllerConfig, EngineConfig, Pacing};
use aes_engine_sim::SimConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File picked up from the working directory when `--config` is absent.
pub const LOCAL_CONFIG: &str = "aes-engine.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub pacing: Pacing,
    pub engine: EngineConfig,
    pub controller: ControllerConfig,
    pub sim: SimConfig,
}

/// Values given on the command line; `None` keeps the file/default value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub latency: Option<u32>,
    pub poll_limit: Option<u32>,
    pub pipeline_depth: Option<usize>,
}

impl HarnessConfig {
    /// Resolves the effective configuration.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let local = PathBuf::from(LOCAL_CONFIG);
                if local.is_file() {
                    Self::from_file(&local)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply(overrides);
        log::debug!("effective configuration: {config:?}");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parse {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        config.reconcile_pacing();
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serialize configuration")
    }

    /// `pacing` decides the manual-operation flag; a disagreeing
    /// `[engine] manual_operation` is replaced.
    fn reconcile_pacing(&mut self) {
        let paced = self.pacing.configure(self.engine);
        if paced != self.engine {
            log::warn!(
                "[engine] manual_operation = {} ignored, {} pacing sets it to {}",
                self.engine.manual_operation,
                self.pacing,
                paced.manual_operation
            );
            self.engine = paced;
        }
    }

    fn apply(&mut self, overrides: &Overrides) {
        if let Some(latency) = overrides.latency {
            self.sim.latency = latency;
        }
        if let Some(poll_limit) = overrides.poll_limit {
            self.controller.poll_limit = poll_limit;
        }
        if let Some(depth) = overrides.pipeline_depth {
            self.controller.pipeline_depth = depth;
        }
    }
}
