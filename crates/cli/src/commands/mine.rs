//! Seal a run of empty blocks.

use super::ChainArgs;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use powledger_core::Account;
use std::time::Instant;

#[derive(Args)]
pub struct MineArgs {
    #[command(flatten)]
    chain: ChainArgs,

    /// Number of blocks to mine
    #[arg(short, long, default_value_t = 5)]
    blocks: u64,
}

pub fn run(args: MineArgs) -> Result<()> {
    let mut chain = args.chain.open()?;
    let miner = Account::create()?;
    println!("{}  Miner {}", "•".bright_black(), miner.id().short().bright_yellow());
    println!();

    for _ in 0..args.blocks {
        let started = Instant::now();
        chain.mine_block(vec![], &miner.id())?;
        let Some(block) = chain.head() else { break };
        println!(
            "  {} {} {} {}",
            format!("#{}", chain.height()).bright_black(),
            super::short_id(block).bright_yellow(),
            format!("nonce {}", block.nonce()).bright_cyan(),
            format!("({:.2?})", started.elapsed()).bright_black()
        );
    }

    println!();
    println!(
        "{}  Miner balance: {}",
        "✓".green().bold(),
        chain.balance_of(&miner.id()).unwrap_or(0).to_string().bright_cyan()
    );
    Ok(())
}
