pub mod calculator;
pub mod config;
pub mod config_loader;
pub mod contest;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod payout_tables;
pub mod resolver;
pub mod stats;
pub mod traits;

pub use calculator::PayoutCalculator;
pub use config::{
    AppConfig, ConfigError, DatabaseConfig, FeedConfig, NotificationConfig, PaymentConfig, RunMode,
    SchedulerConfig,
};
pub use config_loader::ConfigLoader;
pub use contest::{Bet, Contest, ContestRequest, ContestSide, ContestStatus, SideTerms, WinnerLabel};
pub use engine::{LogNotifier, SettleOutcome, SettlementEngine};
pub use error::{ContestError, SettlementError};
pub use events::{NotificationTemplate, SettlementEvent};
pub use ledger::{FeeSchedule, Gain, GainKind, LedgerBet, NewGain, TopUp, WalletBalance};
pub use payout_tables::{LikelihoodRow, LikelihoodTable, PayoutCurve, SpreadRow, SpreadTable, SpreadType};
pub use resolver::{Outcome, Settlement};
pub use stats::{FinalResults, GameSchedule, GameStatus, PlayerProjection, PlayerResult};
pub use traits::{CommitOutcome, ContestStore, Notifier, StatsFeed};
