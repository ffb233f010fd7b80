//! Win-criteria resolution.
//!
//! Given a matched contest and both players' final points, decides the
//! outcome and produces an immutable [`Settlement`]: the contest write and
//! every ledger entry that must be committed together.

use crate::contest::{Contest, ContestSide, ContestStatus, SideTerms, WinnerLabel};
use crate::error::ContestError;
use crate::ledger::{GainKind, NewGain};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Role a side plays in one contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Favorite,
    Underdog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Favorite won outright and beat the spread.
    FavoriteCovered,
    /// Underdog won and beat the spread.
    UnderdogCovered,
    /// Favorite won the event but not by enough; paid out to the underdog.
    Backdoor,
    /// Neither side covered; both stakes returned.
    Push,
    /// Nobody claimed the contest before the event concluded.
    Unmatched,
}

impl Outcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FavoriteCovered => "favorite_covered",
            Self::UnderdogCovered => "underdog_covered",
            Self::Backdoor => "backdoor",
            Self::Push => "push",
            Self::Unmatched => "unmatched",
        }
    }
}

/// One side's view of a settled contest, fixed once per resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSide {
    pub side: ContestSide,
    pub role: Role,
    pub points: Decimal,
    pub game_win: bool,
    pub covers_spread: bool,
}

/// Everything a settlement writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub contest_id: i64,
    pub outcome: Outcome,
    pub status: ContestStatus,
    pub winner_label: WinnerLabel,
    pub winner_side: Option<ContestSide>,
    pub winner_id: Option<String>,
    pub creator_net: Decimal,
    pub claimer_net: Decimal,
    pub house_profit: Decimal,
    pub gains: Vec<NewGain>,
    pub ended_at: DateTime<Utc>,
}

impl Settlement {
    #[must_use]
    pub fn net(&self, side: ContestSide) -> Decimal {
        match side {
            ContestSide::Creator => self.creator_net,
            ContestSide::Claimer => self.claimer_net,
        }
    }

    /// Stamps the outcome onto an in-memory contest.
    pub fn apply_to(&self, contest: &mut Contest) {
        contest.status = self.status;
        contest.ended = true;
        contest.ended_at = Some(self.ended_at);
        contest.winner_id = self.winner_id.clone();
        contest.winner_label = Some(self.winner_label);
        contest.creator_win_amount = Some(self.creator_net);
        contest.claimer_win_amount = Some(self.claimer_net);
        contest.house_profit = Some(self.house_profit);
    }
}

/// Picks the favorite: the side with the smaller spread. Ties go to the creator.
#[must_use]
pub fn favorite_side(contest: &Contest) -> ContestSide {
    if contest.creator_terms.spread <= contest.claimer_terms.spread {
        ContestSide::Creator
    } else {
        ContestSide::Claimer
    }
}

/// Resolves a matched contest from both players' final points.
///
/// # Errors
/// Returns an error if the contest is not `matched`, has already ended, or has no claimer.
pub fn resolve(
    contest: &Contest,
    creator_points: Decimal,
    claimer_points: Decimal,
    now: DateTime<Utc>,
) -> Result<Settlement, ContestError> {
    contest.ensure_transition(ContestStatus::Closed)?;
    let claimer_id = contest
        .claimer_id
        .as_deref()
        .ok_or_else(|| ContestError::InvalidRequest(format!("contest {} has no claimer", contest.id)))?;

    let fav_side = favorite_side(contest);
    let dog_side = fav_side.opposite();
    let points = |side| match side {
        ContestSide::Creator => creator_points,
        ContestSide::Claimer => claimer_points,
    };
    let fav_terms: SideTerms = *contest.terms(fav_side);
    let dog_terms: SideTerms = *contest.terms(dog_side);
    let (fp, dp) = (points(fav_side), points(dog_side));

    let favorite = ResolvedSide {
        side: fav_side,
        role: Role::Favorite,
        points: fp,
        game_win: fp > dp,
        covers_spread: fp - dog_terms.spread > dp,
    };
    let underdog = ResolvedSide {
        side: dog_side,
        role: Role::Underdog,
        points: dp,
        game_win: dp >= fp,
        covers_spread: dp + dog_terms.spread > fp,
    };

    let entry = contest.entry_amount;
    let (outcome, winner, fav_net, dog_net, house_profit) =
        if favorite.game_win && favorite.covers_spread {
            let net = fav_terms.max_win;
            (Outcome::FavoriteCovered, Some(fav_side), net, -entry, entry - net)
        } else if underdog.game_win && underdog.covers_spread {
            let net = dog_terms.max_win;
            (Outcome::UnderdogCovered, Some(dog_side), -entry, net, entry - net)
        } else if favorite.game_win {
            let fav_net = -entry + fav_terms.win_bonus + contest.money_line;
            let dog_net = dog_terms.cover - contest.money_line;
            (Outcome::Backdoor, Some(dog_side), fav_net, dog_net, -(fav_net + dog_net))
        } else {
            (Outcome::Push, None, entry, entry, Decimal::ZERO)
        };

    let (creator_net, claimer_net) = match fav_side {
        ContestSide::Creator => (fav_net, dog_net),
        ContestSide::Claimer => (dog_net, fav_net),
    };

    let user = |side| match side {
        ContestSide::Creator => contest.creator_id.clone(),
        ContestSide::Claimer => claimer_id.to_string(),
    };
    let gain = |side, kind, amount, note: &str| NewGain {
        user_id: user(side),
        contest_id: contest.id,
        side,
        kind,
        amount,
        note: Some(note.to_string()),
    };

    let gains = match winner {
        Some(win_side) => {
            let lose_side = win_side.opposite();
            let (win_net, lose_net) = match win_side {
                ContestSide::Creator => (creator_net, claimer_net),
                ContestSide::Claimer => (claimer_net, creator_net),
            };
            vec![
                gain(win_side, GainKind::Principal, entry, "stake returned"),
                gain(win_side, GainKind::Winnings, win_net, outcome.as_str()),
                gain(lose_side, GainKind::Principal, entry + lose_net, outcome.as_str()),
            ]
        }
        None => vec![
            gain(ContestSide::Creator, GainKind::Refund, entry, "push"),
            gain(ContestSide::Claimer, GainKind::Refund, entry, "push"),
        ],
    };

    Ok(Settlement {
        contest_id: contest.id,
        outcome,
        status: ContestStatus::Closed,
        winner_label: winner.map_or(WinnerLabel::Push, WinnerLabel::from),
        winner_side: winner,
        winner_id: winner.map(user),
        creator_net,
        claimer_net,
        house_profit,
        gains,
        ended_at: now,
    })
}

/// Resolves an `open` contest whose event concluded with no claimer.
///
/// The creator gets a single full refund; no other side exists.
///
/// # Errors
/// Returns an error if the contest is not `open` or has already ended.
pub fn resolve_unmatched(contest: &Contest, now: DateTime<Utc>) -> Result<Settlement, ContestError> {
    contest.ensure_transition(ContestStatus::Unmatched)?;

    Ok(Settlement {
        contest_id: contest.id,
        outcome: Outcome::Unmatched,
        status: ContestStatus::Unmatched,
        winner_label: WinnerLabel::Unmatched,
        winner_side: None,
        winner_id: None,
        creator_net: contest.entry_amount,
        claimer_net: Decimal::ZERO,
        house_profit: Decimal::ZERO,
        gains: vec![NewGain {
            user_id: contest.creator_id.clone(),
            contest_id: contest.id,
            side: ContestSide::Creator,
            kind: GainKind::Refund,
            amount: contest.entry_amount,
            note: Some("unmatched".to_string()),
        }],
        ended_at: now,
    })
}
