//! SQLite persistence for the contest settlement engine.
//!
//! This crate provides:
//! - Database client with embedded migrations
//! - Row models for every table
//! - Repositories for typed database access
//! - A transactional `ContestStore` implementation

pub mod database;
pub mod models;
pub mod repositories;
pub mod store;

pub use database::DatabaseClient;
pub use repositories::{
    ContestRepository, JobScheduleEntry, LedgerRepository, PayoutTableRepository,
    PlayerStatsRepository, Repositories, ScheduleRepository,
};
pub use store::SqliteContestStore;
