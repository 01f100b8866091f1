//! Chain inspection.

use super::ChainArgs;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use powledger_chain::Blockchain;
use powledger_core::{Account, OperationKind};
use serde_json::{json, Value};

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    chain: ChainArgs,

    /// Blocks to mine on top of genesis before printing
    #[arg(short, long, default_value_t = 2)]
    blocks: u64,

    /// Print the chain as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ShowArgs) -> Result<()> {
    let mut chain = args.chain.open()?;
    let miner = Account::create()?;
    for _ in 0..args.blocks {
        chain.mine_block(vec![], &miner.id())?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&chain_json(&chain))?);
        return Ok(());
    }

    println!("{}", "Blocks:".bold().cyan());
    for (height, block) in chain.history().iter().enumerate() {
        println!(
            "  {} {} {}",
            format!("#{}", height).bright_black(),
            super::short_id(block).bright_yellow(),
            format!("({} txs, nonce {})", block.tx_count(), block.nonce()).bright_black()
        );
    }
    println!();
    println!("{}", "Balances:".bold().cyan());
    for (id, balance) in chain.account_state().iter() {
        println!("  {}  {}", id.short().bright_black(), balance.to_string().bright_cyan());
    }
    Ok(())
}

fn chain_json(chain: &Blockchain) -> Value {
    let blocks: Vec<Value> = chain
        .history()
        .iter()
        .enumerate()
        .map(|(height, block)| {
            let transactions: Vec<Value> = block
                .transactions
                .iter()
                .map(|tx| {
                    let operations: Vec<Value> = tx
                        .operations
                        .iter()
                        .map(|op| {
                            let sender = match &op.kind {
                                OperationKind::Payment { sender, .. } => {
                                    Value::from(sender.to_string())
                                }
                                OperationKind::Coinbase { .. } => Value::Null,
                            };
                            json!({
                                "sender": sender,
                                "receiver": op.receiver.to_string(),
                                "amount": op.amount,
                            })
                        })
                        .collect();
                    json!({
                        "id": tx.id.to_string(),
                        "sequence": tx.sequence.to_string(),
                        "timestamp": tx.timestamp,
                        "operations": operations,
                    })
                })
                .collect();
            json!({
                "height": height,
                "id": block.id.to_string(),
                "prev_id": block.prev_id().to_string(),
                "target": block.target().to_string(),
                "nonce": block.nonce(),
                "timestamp": block.header.timestamp,
                "transactions": transactions,
            })
        })
        .collect();

    let balances: serde_json::Map<String, Value> = chain
        .account_state()
        .iter()
        .map(|(id, balance)| (id.to_string(), Value::from(*balance)))
        .collect();

    json!({
        "height": chain.height(),
        "faucet_remaining": chain.faucet_remaining(),
        "blocks": blocks,
        "balances": balances,
    })
}
