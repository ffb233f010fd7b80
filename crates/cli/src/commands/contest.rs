//! Contest administration commands.

use super::{build_engine, connect_database, ConfigArgs};
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use duel_core::{Contest, ContestRequest, ContestSide};
use rust_decimal::Decimal;

#[derive(Args, Debug, Clone)]
pub struct OpenContestArgs {
    /// Creating user id
    #[arg(long)]
    pub creator: String,

    /// Player backed by the creator
    #[arg(long)]
    pub creator_player: String,

    /// Player the claimer will back
    #[arg(long)]
    pub claimer_player: String,

    /// Game date (YYYY-MM-DD)
    #[arg(long)]
    pub game_date: NaiveDate,

    /// Entry amount in major currency units
    #[arg(long)]
    pub entry: Decimal,

    /// Enable the win bonus
    #[arg(long)]
    pub win_bonus: bool,

    /// Money-line value stored on the contest
    #[arg(long, default_value = "0")]
    pub money_line: Decimal,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ClaimContestArgs {
    /// Contest id
    #[arg(long)]
    pub contest: i64,

    /// Claiming user id
    #[arg(long)]
    pub claimer: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

fn print_contest(contest: &Contest) {
    println!("Contest {} ({})", contest.id, contest.status);
    println!("  Game date:  {}", contest.game_date);
    println!("  Entry:      {}", contest.entry_amount);
    for side in [ContestSide::Creator, ContestSide::Claimer] {
        let terms = contest.terms(side);
        println!(
            "  {:<8}    user={} player={} spread={} cover={} bonus={} max_win={}",
            side.as_str(),
            contest.user_id(side).unwrap_or("-"),
            contest.player_id(side),
            terms.spread,
            terms.cover,
            terms.win_bonus,
            terms.max_win,
        );
    }
}

/// # Errors
/// Returns an error if the request is invalid, a projection is missing, or the write fails.
pub async fn run_open_contest(args: OpenContestArgs) -> Result<()> {
    let config = args.config.load()?;
    let db = connect_database(&config).await?;
    let engine = build_engine(&config, &db)?;

    let contest = engine
        .open_contest(ContestRequest {
            creator_id: args.creator,
            creator_player_id: args.creator_player,
            claimer_player_id: args.claimer_player,
            game_date: args.game_date,
            entry_amount: args.entry,
            win_bonus_enabled: args.win_bonus,
            money_line: args.money_line,
        })
        .await?;

    print_contest(&contest);
    Ok(())
}

/// # Errors
/// Returns an error if the contest cannot be claimed.
pub async fn run_claim_contest(args: ClaimContestArgs) -> Result<()> {
    let config = args.config.load()?;
    let db = connect_database(&config).await?;
    let engine = build_engine(&config, &db)?;

    let contest = engine.claim_contest(args.contest, &args.claimer).await?;
    print_contest(&contest);
    Ok(())
}
