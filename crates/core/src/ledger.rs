//! Ledger entries and wallet balance derivation.
//!
//! The ledger is append-only. A user's spendable balance is never stored; it
//! is recomputed from eligible top-ups, gains and bets every time it is read.
//! Ledger amounts are signed integer minor units (cents).

use crate::contest::ContestSide;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Minor units per major currency unit.
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Converts a major-unit amount to signed minor units, rounding half away from zero.
///
/// Returns `None` if the amount does not fit in an `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(MINOR_UNITS_PER_MAJOR))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Converts minor units back to a major-unit amount.
#[must_use]
pub fn from_minor_units(amount_minor: i64) -> Decimal {
    Decimal::new(amount_minor, 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GainKind {
    /// Return of the stake, or what is left of it after a loss.
    Principal,
    /// Net winnings on top of the returned stake.
    Winnings,
    /// Full refund of a stake (push or unmatched contest).
    Refund,
    /// Manual correction entered by an operator.
    Adjustment,
}

impl GainKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Principal => "principal",
            Self::Winnings => "winnings",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "principal" => Some(Self::Principal),
            "winnings" => Some(Self::Winnings),
            "refund" => Some(Self::Refund),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }
}

/// A gain produced by a settlement decision, in major units, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGain {
    pub user_id: String,
    pub contest_id: i64,
    pub side: ContestSide,
    pub kind: GainKind,
    pub amount: Decimal,
    pub note: Option<String>,
}

impl NewGain {
    /// Amount in ledger minor units.
    #[must_use]
    pub fn amount_minor(&self) -> Option<i64> {
        to_minor_units(self.amount)
    }
}

/// Persisted gain row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gain {
    pub id: i64,
    pub user_id: String,
    pub contest_id: Option<i64>,
    pub side: Option<ContestSide>,
    pub kind: GainKind,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub transferred: bool,
    pub transfer_id: Option<String>,
    pub paid: bool,
    pub payout_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persisted bet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBet {
    pub id: i64,
    pub user_id: String,
    pub contest_id: i64,
    pub side: ContestSide,
    pub amount_minor: i64,
    pub transferred: bool,
    pub transfer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Deposit recorded by the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUp {
    pub id: i64,
    pub user_id: String,
    pub amount_minor: i64,
    pub transferred: bool,
    pub refunded: bool,
    pub charge_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Breakdown of a user's derived balance, in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub top_ups: i64,
    pub gains: i64,
    pub bets: i64,
}

impl WalletBalance {
    /// Aggregates eligible rows in memory.
    ///
    /// Top-ups count unless transferred or refunded; gains and bets count
    /// unless transferred.
    #[must_use]
    pub fn from_entries(top_ups: &[TopUp], gains: &[Gain], bets: &[LedgerBet]) -> Self {
        Self {
            top_ups: top_ups
                .iter()
                .filter(|t| !t.transferred && !t.refunded)
                .map(|t| t.amount_minor)
                .sum(),
            gains: gains
                .iter()
                .filter(|g| !g.transferred)
                .map(|g| g.amount_minor)
                .sum(),
            bets: bets
                .iter()
                .filter(|b| !b.transferred)
                .map(|b| b.amount_minor)
                .sum(),
        }
    }

    #[must_use]
    pub fn total(&self) -> i64 {
        self.top_ups + self.gains - self.bets
    }
}

/// Payment processor fee model: percentage plus fixed amount per withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub percent: Decimal,
    pub fixed_minor: i64,
    pub min_withdrawal_minor: i64,
}

impl FeeSchedule {
    /// Fee charged on a balance, rounded up to the next whole minor unit.
    #[must_use]
    pub fn fee(&self, balance_minor: i64) -> i64 {
        let raw = Decimal::from(balance_minor) * self.percent + Decimal::from(self.fixed_minor);
        raw.ceil().to_i64().unwrap_or(i64::MAX)
    }

    /// Amount a user would actually receive after fees, never negative.
    #[must_use]
    pub fn amount_after_fees(&self, balance_minor: i64) -> i64 {
        if balance_minor <= 0 {
            return 0;
        }
        balance_minor.saturating_sub(self.fee(balance_minor)).max(0)
    }

    /// Whether a withdrawal ledger entry may be created for this balance.
    #[must_use]
    pub fn can_withdraw(&self, balance_minor: i64) -> bool {
        self.amount_after_fees(balance_minor) >= self.min_withdrawal_minor
    }
}
