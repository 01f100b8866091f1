//! CLI commands module.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use powledger_chain::{Blockchain, ChainConfig, DEFAULT_FAUCET_SUPPLY};
use powledger_consensus::{PowConfig, DEFAULT_EMISSION};
use powledger_core::Block;

mod demo;
mod mine;
mod show;

#[derive(Subcommand)]
pub enum Commands {
    /// Walk through a two-account payment scenario
    Demo(demo::DemoArgs),
    /// Seal blocks on a fresh chain
    Mine(mine::MineArgs),
    /// Build a chain and print its blocks and balances
    Show(show::ShowArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Demo(args) => demo::run(args),
        Commands::Mine(args) => mine::run(args),
        Commands::Show(args) => show::run(args),
    }
}

/// Chain parameters shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ChainArgs {
    /// Leading zero bits a block id must have
    #[arg(short = 'd', long, default_value_t = 8)]
    difficulty_bits: u32,

    /// Coins minted to the miner of each block
    #[arg(short, long, default_value_t = DEFAULT_EMISSION)]
    emission: u64,

    /// Coins the faucet can hand out
    #[arg(short, long, default_value_t = DEFAULT_FAUCET_SUPPLY)]
    faucet: u64,
}

impl ChainArgs {
    pub fn config(&self) -> ChainConfig {
        let pow =
            PowConfig::with_difficulty_bits(self.difficulty_bits).with_emission(self.emission);
        ChainConfig::new(pow).with_faucet_supply(self.faucet)
    }

    /// Create the chain, printing its genesis block.
    pub fn open(&self) -> Result<Blockchain> {
        println!(
            "{}",
            format!(
                "Mining genesis ({} bits, emission {})...",
                self.difficulty_bits, self.emission
            )
            .bold()
            .cyan()
        );
        let chain = Blockchain::new(self.config()).context("Failed to create genesis block")?;
        if let Some(genesis) = chain.head() {
            println!("{}  Genesis {}", "✓".green().bold(), short_id(genesis).bright_yellow());
        }
        println!();
        Ok(chain)
    }
}

pub fn short_id(block: &Block) -> String {
    block.id.to_hex()[..16].to_string()
}
