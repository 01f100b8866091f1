//! Two-account payment walkthrough.

use super::ChainArgs;
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use powledger_chain::Blockchain;
use powledger_core::{Account, Sequence, Transaction};

#[derive(Args)]
pub struct DemoArgs {
    #[command(flatten)]
    chain: ChainArgs,
}

pub fn run(args: DemoArgs) -> Result<()> {
    let mut chain = args.chain.open()?;

    let mut alice = Account::create()?;
    let mut bob = Account::create()?;
    chain.faucet(&mut alice, 20).context("Faucet refused Alice")?;
    chain.faucet(&mut bob, 13).context("Faucet refused Bob")?;

    println!("{}", "Accounts:".bold());
    print_balances(&chain, &alice, &bob);

    let ops = vec![
        alice.create_payment_operation(&bob.id(), 5, alice.primary_key())?,
        alice.create_payment_operation(&bob.id(), 8, alice.primary_key())?,
    ];
    let mut tx = Transaction::create(ops, Sequence::Ordinal(255), chain.ledger())
        .context("Payment transaction did not verify")?;
    println!(
        "{}  Alice pays Bob 5 then 8 in tx {} (sequence {})",
        "✓".green().bold(),
        tx.id.to_hex()[..16].bright_yellow(),
        tx.sequence
    );

    let mut block = chain.candidate_block();
    block.add_transaction(tx.clone(), chain.ledger())?;
    let block = chain.seal_block(block, &alice.id())?;
    println!(
        "{}  Sealed block {} at nonce {}",
        "✓".green().bold(),
        super::short_id(&block).bright_yellow(),
        block.nonce().to_string().bright_cyan()
    );

    chain.validate_and_append(block)?;
    println!("{}  Block appended, Alice mined it", "✓".green().bold());
    print_balances(&chain, &alice, &bob);

    let mut replay = chain.candidate_block();
    replay.add_transaction(tx.clone(), chain.ledger())?;
    let replay = chain.seal_block(replay, &bob.id())?;
    match chain.validate_and_append(replay) {
        Ok(_) => bail!("replayed block was accepted"),
        Err(e) => println!(
            "{}  Replay rejected: {}",
            "✗".red().bold(),
            e.to_string().bright_black()
        ),
    }

    tx.refresh();
    alice.sync_balance(chain.ledger());
    chain
        .mine_block(vec![tx], &alice.id())
        .context("Refreshed transaction was rejected")?;
    println!();
    println!("{}  Refreshed the payment and mined again", "✓".green().bold());
    print_balances(&chain, &alice, &bob);

    println!(
        "Height {}, faucet remaining {}",
        chain.height().to_string().bright_cyan(),
        chain.faucet_remaining().to_string().bright_cyan()
    );
    Ok(())
}

fn print_balances(chain: &Blockchain, alice: &Account, bob: &Account) {
    for (name, account) in [("Alice", alice), ("Bob", bob)] {
        println!(
            "  {:<6} {}  {}",
            name,
            account.id().short().bright_black(),
            chain
                .balance_of(&account.id())
                .unwrap_or(0)
                .to_string()
                .bright_cyan()
        );
    }
    println!();
}
