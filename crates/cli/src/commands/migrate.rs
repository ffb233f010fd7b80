use super::{connect_database, ConfigArgs};
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Opens the database, which applies any pending migrations.
///
/// # Errors
/// Returns an error if the database cannot be opened or a migration fails.
pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let config = args.config.load()?;
    let db = connect_database(&config).await?;
    let schedule = db.repositories().schedule.list().await?;
    tracing::info!(jobs = schedule.len(), "Database is up to date");
    println!("Migrations applied to {}", config.database.url);
    Ok(())
}
