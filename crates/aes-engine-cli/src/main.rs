//! Command-line harness for the AES engine controller.

#![forbid(unsafe_code)]

mod config;

use std::fs;
use std::path::PathBuf;

use aes_engine::fixture::{self, VectorFixture};
use aes_engine::{
    run_session, Block, EngineController, Key, Operation, Pacing, SequencingPolicy, BLOCK_SIZE,
};
use aes_engine_sim::SimCore;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use crate::config::{HarnessConfig, Overrides};

/// Drives the simulated AES engine through its control protocol.
#[derive(Parser)]
#[command(name = "aes-engine", version, about = "AES engine controller harness")]
struct Cli {
    /// TOML configuration file (defaults to ./aes-engine.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Core latency in cycles.
    #[arg(long, global = true)]
    latency: Option<u32>,
    /// Status reads allowed per wait before timing out.
    #[arg(long, global = true)]
    poll_limit: Option<u32>,
    /// Blocks kept in flight by the pipelined discipline (1 or 2).
    #[arg(long, global = true)]
    depth: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the SP 800-38A ECB-AES128 vectors through the engine.
    Nist {
        /// Discipline(s) to exercise.
        #[arg(long, value_enum, default_value_t = Which::Both)]
        pacing: Which,
        /// Direction(s) to exercise.
        #[arg(long, value_enum, default_value_t = Direction::Both)]
        direction: Direction,
    },
    /// Process blocks with a given key and print the results as hex.
    Run {
        /// AES key as hex (32 characters for AES-128).
        #[arg(long, value_name = "HEX")]
        key_hex: String,
        /// Decrypt instead of using the configured operation.
        #[arg(long, default_value_t = false)]
        decrypt: bool,
        /// Discipline, overriding the configured one.
        #[arg(long)]
        pacing: Option<Pacing>,
        /// Text file of whitespace-separated hex blocks.
        #[arg(long, value_name = "FILE", conflicts_with = "blocks")]
        input: Option<PathBuf>,
        /// Blocks as 32 hex characters each.
        #[arg(value_name = "BLOCK")]
        blocks: Vec<String>,
    },
    /// Print the effective configuration as TOML.
    ShowConfig,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Which {
    Manual,
    Pipelined,
    Both,
}

impl Which {
    fn pacings(self) -> Vec<Pacing> {
        match self {
            Self::Manual => vec![Pacing::Manual],
            Self::Pipelined => vec![Pacing::Pipelined],
            Self::Both => Pacing::ALL.to_vec(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Direction {
    Encrypt,
    Decrypt,
    Both,
}

impl Direction {
    fn fixtures(self) -> Vec<VectorFixture> {
        match self {
            Self::Encrypt => vec![fixture::ecb_aes128_encrypt()],
            Self::Decrypt => vec![fixture::ecb_aes128_decrypt()],
            Self::Both => vec![fixture::ecb_aes128_encrypt(), fixture::ecb_aes128_decrypt()],
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let overrides = Overrides {
        latency: cli.latency,
        poll_limit: cli.poll_limit,
        pipeline_depth: cli.depth,
    };
    let config = HarnessConfig::load(cli.config.as_deref(), &overrides)?;

    match cli.command {
        Commands::Nist { pacing, direction } => cmd_nist(&config, pacing, direction),
        Commands::Run {
            key_hex,
            decrypt,
            pacing,
            input,
            blocks,
        } => cmd_run(&config, &key_hex, decrypt, pacing, input, &blocks),
        Commands::ShowConfig => cmd_show_config(&config),
    }
}

fn engine(config: &HarnessConfig) -> Result<EngineController<SimCore>> {
    let sim = SimCore::with_config(config.sim);
    EngineController::with_config(sim, config.controller).context("controller configuration")
}

fn cmd_nist(config: &HarnessConfig, which: Which, direction: Direction) -> Result<()> {
    let mut failures = 0usize;
    for fx in direction.fixtures() {
        for pacing in which.pacings() {
            let mut engine = engine(config)?;
            let engine_config = config.engine.with_operation(fx.operation);
            let out = run_session(&mut engine, engine_config, &fx.key, &pacing, &fx.input)
                .with_context(|| format!("{} ({pacing})", fx.name))?;
            match fx.verify(&out) {
                Ok(()) => info!("PASS {} ({pacing}, {} blocks)", fx.name, out.len()),
                Err(mismatch) => {
                    error!("FAIL {} ({pacing}): {mismatch}", fx.name);
                    failures += 1;
                }
            }
            let stats = engine.regs().stats();
            info!(
                "  {} status reads, {} started, {} retrieved",
                stats.status_reads, stats.started, stats.retrieved
            );
        }
    }
    if failures > 0 {
        bail!("{failures} vector run(s) failed");
    }
    Ok(())
}

fn cmd_run(
    config: &HarnessConfig,
    key_hex: &str,
    decrypt: bool,
    pacing: Option<Pacing>,
    input: Option<PathBuf>,
    blocks: &[String],
) -> Result<()> {
    let key_bytes = hex::decode(key_hex.trim()).context("key must be hex")?;
    let Some(key) = Key::from_slice(&key_bytes) else {
        bail!("key must be 16, 24 or 32 bytes, got {}", key_bytes.len());
    };

    let text;
    let tokens: Vec<&str> = match input {
        Some(path) => {
            text = fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            text.split_whitespace().collect()
        }
        None => blocks.iter().map(String::as_str).collect(),
    };
    let input = parse_blocks(&tokens)?;

    let mut engine_config = config.engine;
    engine_config.key_length = key.length();
    if decrypt {
        engine_config.operation = Operation::Decrypt;
    }
    let pacing = pacing.unwrap_or(config.pacing);

    let mut engine = engine(config)?;
    let out = run_session(&mut engine, engine_config, &key, &pacing, &input)?;
    info!(
        "{:?} {} block(s) with {} pacing in {} status reads",
        engine_config.operation,
        out.len(),
        pacing.name(),
        engine.regs().stats().status_reads
    );
    for block in &out {
        println!("{}", hex::encode(block));
    }
    Ok(())
}

fn cmd_show_config(config: &HarnessConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

fn parse_blocks(tokens: &[&str]) -> Result<Vec<Block>> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let bytes = hex::decode(token).with_context(|| format!("block {i} is not hex"))?;
            if bytes.len() != BLOCK_SIZE {
                bail!("block {i} is {} bytes, expected {BLOCK_SIZE}", bytes.len());
            }
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(&bytes);
            Ok(block)
        })
        .collect()
}
