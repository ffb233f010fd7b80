use clap::{Parser, Subcommand};

mod commands;

use commands::{
    BalanceArgs, ClaimContestArgs, MigrateArgs, OpenContestArgs, QuoteArgs, RunArgs, RunJobArgs,
};

#[derive(Parser)]
#[command(name = "duel")]
#[command(about = "Peer-vs-peer fantasy contest settlement engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the settlement scheduler until interrupted
    Run(RunArgs),
    /// Run a single tick of one scheduled job
    RunJob(RunJobArgs),
    /// Open a new contest for a creator
    OpenContest(OpenContestArgs),
    /// Claim an open contest as the second participant
    ClaimContest(ClaimContestArgs),
    /// Show a user's wallet balance and withdrawable amount
    Balance(BalanceArgs),
    /// Price a stake against a player's payout curve
    Quote(QuoteArgs),
    /// Create the database and apply migrations
    Migrate(MigrateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run(args) => commands::run_scheduler(args).await?,
        Commands::RunJob(args) => commands::run_job(args).await?,
        Commands::OpenContest(args) => commands::run_open_contest(args).await?,
        Commands::ClaimContest(args) => commands::run_claim_contest(args).await?,
        Commands::Balance(args) => commands::run_balance(args).await?,
        Commands::Quote(args) => commands::run_quote(args).await?,
        Commands::Migrate(args) => commands::run_migrate(args).await?,
    }

    Ok(())
}
