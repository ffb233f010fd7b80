//! Spread and payout calculator.
//!
//! All figures are computed once when a contest is created and stored on the
//! contest; settlement never re-reads the tables.
//!
//! Reference-data misses are not errors: a missing spread or likelihood row
//! prices the affected figure at zero and logs the anomaly.

use crate::contest::{ContestSide, SideTerms};
use crate::payout_tables::{LikelihoodTable, PayoutCurve, SpreadTable, SpreadType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

/// Share of the entry priced through the cover multiplier when the win bonus is on.
pub const WIN_BONUS_COVER_SHARE: Decimal = dec!(0.85);

/// Share of the entry priced through the money-line multiplier as win bonus.
pub const WIN_BONUS_SHARE: Decimal = dec!(0.15);

/// Rounds a raw projected-points difference to a half point, away from zero.
///
/// Non-negative values round up, negative values round down.
#[must_use]
pub fn round_to_half_point(raw: Decimal) -> Decimal {
    let doubled = raw * Decimal::TWO;
    let stepped = if raw >= Decimal::ZERO {
        doubled.ceil()
    } else {
        doubled.floor()
    };
    (stepped / Decimal::TWO).normalize()
}

/// Spread for one side of a contest.
///
/// The evaluated side's spread is the opponent's projection minus its own,
/// so the side projected to score more carries a negative spread.
#[must_use]
pub fn spread(creator_projected: Decimal, claimer_projected: Decimal, side: ContestSide) -> Decimal {
    let raw = match side {
        ContestSide::Creator => claimer_projected - creator_projected,
        ContestSide::Claimer => creator_projected - claimer_projected,
    };
    round_to_half_point(raw)
}

/// Largest amount a side can net: cover plus win bonus.
#[must_use]
pub fn max_win(cover: Decimal, win_bonus: Decimal) -> Decimal {
    cover + win_bonus
}

/// Prices contests against a snapshot of the payout tables.
#[derive(Debug, Clone, Default)]
pub struct PayoutCalculator {
    spreads: SpreadTable,
    likelihoods: LikelihoodTable,
}

impl PayoutCalculator {
    #[must_use]
    pub fn new(spreads: SpreadTable, likelihoods: LikelihoodTable) -> Self {
        Self {
            spreads,
            likelihoods,
        }
    }

    /// Cover amount for a side with the given spread.
    #[must_use]
    pub fn cover(&self, spread: Decimal, entry_amount: Decimal, win_bonus_enabled: bool) -> Decimal {
        let spread_type = if win_bonus_enabled {
            SpreadType::WinBonus
        } else {
            SpreadType::Standard
        };

        let multiplier = match self.spreads.lookup(spread, spread_type) {
            Some(row) => row.cover_multiplier,
            None => {
                warn!(
                    spread = %spread,
                    spread_type = spread_type.as_str(),
                    "No spread row found, pricing cover at zero"
                );
                Decimal::ZERO
            }
        };

        if win_bonus_enabled {
            entry_amount * WIN_BONUS_COVER_SHARE * multiplier
        } else {
            entry_amount * multiplier
        }
    }

    /// Win bonus for a side with the given spread.
    #[must_use]
    pub fn win_bonus(&self, spread: Decimal, entry_amount: Decimal) -> Decimal {
        match self.spreads.lookup(spread, SpreadType::WinBonus) {
            Some(row) => entry_amount * WIN_BONUS_SHARE * row.money_line_multiplier,
            None => {
                warn!(spread = %spread, "No win-bonus spread row found, pricing bonus at zero");
                Decimal::ZERO
            }
        }
    }

    /// Amount a stake of `risk_amount` wins if the player reaches `target_points`.
    ///
    /// `inverse` prices the opposite proposition (the player falling short).
    #[must_use]
    pub fn amount_to_win(
        &self,
        curve: &PayoutCurve,
        target_points: u32,
        risk_amount: Decimal,
        inverse: bool,
    ) -> Decimal {
        let Some(pct) = curve.probability_at(target_points) else {
            warn!(target_points, "Target outside payout curve, pricing at zero");
            return Decimal::ZERO;
        };

        match self.likelihoods.lookup(pct) {
            Some(row) if inverse => risk_amount * row.inverse_payout_multiplier,
            Some(row) => risk_amount * row.payout_multiplier,
            None => {
                warn!(probability_pct = pct, "No likelihood row found, pricing at zero");
                Decimal::ZERO
            }
        }
    }

    /// All precomputed figures for one side of a new contest.
    #[must_use]
    pub fn side_terms(
        &self,
        creator_projected: Decimal,
        claimer_projected: Decimal,
        side: ContestSide,
        entry_amount: Decimal,
        win_bonus_enabled: bool,
    ) -> SideTerms {
        let spread = spread(creator_projected, claimer_projected, side);
        let cover = self.cover(spread, entry_amount, win_bonus_enabled);
        let win_bonus = if win_bonus_enabled {
            self.win_bonus(spread, entry_amount)
        } else {
            Decimal::ZERO
        };

        SideTerms {
            spread,
            cover,
            win_bonus,
            max_win: max_win(cover, win_bonus),
        }
    }
}
