//! Reference tables that price contests.
//!
//! Two administrable tables drive every payout figure:
//! - the spread table maps a half-point spread to a cover multiplier and a
//!   money-line multiplier;
//! - the likelihood table maps a probability percentage to a payout multiplier
//!   and its inverse.
//!
//! Each player additionally carries a payout curve: the probability (in
//! percent) of reaching a given fantasy point total.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Which payout product a spread row prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadType {
    /// Contests without the win bonus.
    Standard,
    /// Contests with the win bonus enabled.
    WinBonus,
}

impl SpreadType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::WinBonus => "win_bonus",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "win_bonus" => Some(Self::WinBonus),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadRow {
    pub spread: Decimal,
    pub spread_type: SpreadType,
    pub cover_multiplier: Decimal,
    pub money_line_multiplier: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikelihoodRow {
    pub probability_pct: u8,
    pub payout_multiplier: Decimal,
    pub inverse_payout_multiplier: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Read-only spread table snapshot.
#[derive(Debug, Clone, Default)]
pub struct SpreadTable {
    rows: Vec<SpreadRow>,
}

impl SpreadTable {
    #[must_use]
    pub fn new(rows: Vec<SpreadRow>) -> Self {
        Self { rows }
    }

    /// Returns the most recently updated row matching both spread and type.
    #[must_use]
    pub fn lookup(&self, spread: Decimal, spread_type: SpreadType) -> Option<&SpreadRow> {
        self.rows
            .iter()
            .filter(|r| r.spread == spread && r.spread_type == spread_type)
            .max_by_key(|r| r.updated_at)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read-only likelihood table snapshot.
#[derive(Debug, Clone, Default)]
pub struct LikelihoodTable {
    rows: Vec<LikelihoodRow>,
}

impl LikelihoodTable {
    #[must_use]
    pub fn new(rows: Vec<LikelihoodRow>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn lookup(&self, probability_pct: u8) -> Option<&LikelihoodRow> {
        self.rows
            .iter()
            .filter(|r| r.probability_pct == probability_pct)
            .max_by_key(|r| r.updated_at)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A player's probability of reaching each fantasy point total.
///
/// Stored as `(point_total, probability_pct)` pairs sorted by point total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCurve {
    points: Vec<(u32, Decimal)>,
}

impl PayoutCurve {
    /// Builds a curve from unordered pairs. Later duplicates of a point total win.
    #[must_use]
    pub fn new(mut points: Vec<(u32, Decimal)>) -> Self {
        points.sort_by_key(|(total, _)| *total);
        points.reverse();
        points.dedup_by_key(|(total, _)| *total);
        points.reverse();
        Self { points }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Probability percentage for a target point total.
    ///
    /// An exact bucket is returned as-is. A target that falls between two
    /// buckets gets the average of its neighbours, rounded to the nearest whole
    /// percent. Targets outside the curve return `None`.
    #[must_use]
    pub fn probability_at(&self, target: u32) -> Option<u8> {
        let pct = match self.points.binary_search_by_key(&target, |(total, _)| *total) {
            Ok(idx) => self.points[idx].1,
            Err(idx) => {
                if idx == 0 || idx >= self.points.len() {
                    return None;
                }
                let below = self.points[idx - 1].1;
                let above = self.points[idx].1;
                (below + above) / Decimal::TWO
            }
        };

        let rounded = pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        rounded.to_u8().filter(|p| *p <= 100)
    }
}
