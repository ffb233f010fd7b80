//! Wallet balance command.

use super::{connect_database, ConfigArgs};
use anyhow::Result;
use clap::Args;
use duel_core::ledger::from_minor_units;
use duel_data::LedgerRepository;

#[derive(Args, Debug, Clone)]
pub struct BalanceArgs {
    /// User id
    #[arg(long)]
    pub user: String,

    /// Also list individual gains
    #[arg(long)]
    pub detail: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Prints the wallet balance, the amount withdrawable after processor fees,
/// and optionally every gain row.
///
/// # Errors
/// Returns an error if the ledger cannot be read.
pub async fn run_balance(args: BalanceArgs) -> Result<()> {
    let config = args.config.load()?;
    let db = connect_database(&config).await?;
    let ledger = LedgerRepository::new(db.pool().clone());
    let fees = config.payments.fee_schedule();

    let balance = ledger.balance(&args.user).await?;
    let total = balance.total();

    println!("Wallet for {}", args.user);
    println!("  Top-ups:         {}", from_minor_units(balance.top_ups));
    println!("  Gains:           {}", from_minor_units(balance.gains));
    println!("  Bets:            {}", from_minor_units(balance.bets));
    println!("  Balance:         {}", from_minor_units(total));
    println!("  After fees:      {}", from_minor_units(fees.amount_after_fees(total)));
    println!(
        "  Can withdraw:    {}",
        if fees.can_withdraw(total) { "yes" } else { "no" }
    );

    if args.detail {
        for gain in ledger.gains_for_user(&args.user).await? {
            println!(
                "  #{:<6} {:<11} {:>10} contest={}",
                gain.id,
                gain.kind.as_str(),
                from_minor_units(gain.amount_minor),
                gain.contest_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            );
        }
    }

    Ok(())
}
