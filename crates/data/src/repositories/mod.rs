//! Database repositories.
//!
//! Each repository provides typed access to one area of the schema.

pub mod contest_repo;
pub mod ledger_repo;
pub mod payout_table_repo;
pub mod player_stats_repo;
pub mod schedule_repo;

pub use contest_repo::ContestRepository;
pub use ledger_repo::LedgerRepository;
pub use payout_table_repo::PayoutTableRepository;
pub use player_stats_repo::PlayerStatsRepository;
pub use schedule_repo::{JobScheduleEntry, ScheduleRepository};

use sqlx::SqlitePool;

/// All repositories over a single pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub contests: ContestRepository,
    pub ledger: LedgerRepository,
    pub payout_tables: PayoutTableRepository,
    pub player_stats: PlayerStatsRepository,
    pub schedule: ScheduleRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            contests: ContestRepository::new(pool.clone()),
            ledger: LedgerRepository::new(pool.clone()),
            payout_tables: PayoutTableRepository::new(pool.clone()),
            player_stats: PlayerStatsRepository::new(pool.clone()),
            schedule: ScheduleRepository::new(pool),
        }
    }
}
