//! Payout quote command.

use super::{connect_database, ConfigArgs};
use anyhow::Result;
use clap::Args;
use duel_core::ContestStore;
use duel_data::SqliteContestStore;
use rust_decimal::Decimal;

#[derive(Args, Debug, Clone)]
pub struct QuoteArgs {
    /// Player whose payout curve to price against
    #[arg(long)]
    pub player: String,

    /// Fantasy-point target
    #[arg(long)]
    pub target: u32,

    /// Stake in major currency units
    #[arg(long)]
    pub risk: Decimal,

    /// Price the player falling short of the target instead
    #[arg(long)]
    pub inverse: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// # Errors
/// Returns an error if the payout tables cannot be read.
pub async fn run_quote(args: QuoteArgs) -> Result<()> {
    let config = args.config.load()?;
    let db = connect_database(&config).await?;
    let store = SqliteContestStore::new(&db);

    let curve = store
        .repositories()
        .payout_tables
        .load_curve(&args.player)
        .await?;
    let calculator = store.payout_calculator().await?;
    let to_win = calculator.amount_to_win(&curve, args.target, args.risk, args.inverse);

    println!(
        "{} {} {} pts: risk {} to win {}",
        args.player,
        if args.inverse { "under" } else { "over" },
        args.target,
        args.risk,
        to_win
    );
    Ok(())
}
