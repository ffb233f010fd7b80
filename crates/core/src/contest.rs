//! Contest entity and its lifecycle.
//!
//! ```text
//! open --claim--> matched --settle--> closed
//!   \
//!    `--event concludes, no claimer--> unmatched
//! ```
//!
//! `unmatched` and `closed` are terminal. The in-memory transitions here
//! validate legality; the store re-checks the same guards at write time.

use crate::error::ContestError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestSide {
    Creator,
    Claimer,
}

impl ContestSide {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Claimer => "claimer",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "creator" => Some(Self::Creator),
            "claimer" => Some(Self::Claimer),
            _ => None,
        }
    }

    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Creator => Self::Claimer,
            Self::Claimer => Self::Creator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestStatus {
    Open,
    Matched,
    Unmatched,
    Closed,
}

impl ContestStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Matched => "matched",
            Self::Unmatched => "unmatched",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "matched" => Some(Self::Matched),
            "unmatched" => Some(Self::Unmatched),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unmatched | Self::Closed)
    }

    /// Legal lifecycle edges.
    #[must_use]
    pub fn can_transition(from: Self, to: Self) -> bool {
        matches!(
            (from, to),
            (Self::Open, Self::Matched)
                | (Self::Open, Self::Unmatched)
                | (Self::Matched, Self::Closed)
        )
    }
}

impl fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome label recorded when a contest ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinnerLabel {
    Creator,
    Claimer,
    Push,
    Unmatched,
}

impl WinnerLabel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Claimer => "claimer",
            Self::Push => "push",
            Self::Unmatched => "unmatched",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "creator" => Some(Self::Creator),
            "claimer" => Some(Self::Claimer),
            "push" => Some(Self::Push),
            "unmatched" => Some(Self::Unmatched),
            _ => None,
        }
    }
}

impl From<ContestSide> for WinnerLabel {
    fn from(side: ContestSide) -> Self {
        match side {
            ContestSide::Creator => Self::Creator,
            ContestSide::Claimer => Self::Claimer,
        }
    }
}

/// Payout figures for one side, computed once when the contest is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideTerms {
    pub spread: Decimal,
    pub cover: Decimal,
    pub win_bonus: Decimal,
    pub max_win: Decimal,
}

/// Request to open a new contest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestRequest {
    pub creator_id: String,
    pub creator_player_id: String,
    pub claimer_player_id: String,
    pub game_date: NaiveDate,
    pub entry_amount: Decimal,
    pub win_bonus_enabled: bool,
    pub money_line: Decimal,
}

impl ContestRequest {
    /// # Errors
    /// Returns an error if amounts are non-positive or both sides reference the same player.
    pub fn validate(&self) -> Result<(), ContestError> {
        if self.entry_amount <= Decimal::ZERO {
            return Err(ContestError::InvalidRequest(format!(
                "entry amount must be positive, got {}",
                self.entry_amount
            )));
        }
        if self.money_line < Decimal::ZERO {
            return Err(ContestError::InvalidRequest(format!(
                "money line must not be negative, got {}",
                self.money_line
            )));
        }
        if self.creator_player_id == self.claimer_player_id {
            return Err(ContestError::InvalidRequest(
                "both sides reference the same player".to_string(),
            ));
        }
        if self.creator_id.trim().is_empty() {
            return Err(ContestError::InvalidRequest("creator id is empty".to_string()));
        }
        Ok(())
    }
}

/// An amount placed at risk by one user on one side of a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub user_id: String,
    pub contest_id: i64,
    pub side: ContestSide,
    pub amount: Decimal,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: i64,
    pub creator_id: String,
    pub claimer_id: Option<String>,
    pub creator_player_id: String,
    pub claimer_player_id: String,
    pub game_date: NaiveDate,
    pub entry_amount: Decimal,
    pub win_bonus_enabled: bool,
    pub creator_terms: SideTerms,
    pub claimer_terms: SideTerms,
    pub money_line: Decimal,
    pub status: ContestStatus,
    pub ended: bool,
    pub ended_at: Option<DateTime<Utc>>,
    pub winner_id: Option<String>,
    pub winner_label: Option<WinnerLabel>,
    pub creator_win_amount: Option<Decimal>,
    pub claimer_win_amount: Option<Decimal>,
    pub house_profit: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Contest {
    /// Builds a new `open` contest and the creator's stake.
    ///
    /// `id` is zero until the store assigns one; the bet's `contest_id` is
    /// rewritten by the store in the same transaction.
    #[must_use]
    pub fn open(
        request: ContestRequest,
        creator_terms: SideTerms,
        claimer_terms: SideTerms,
        now: DateTime<Utc>,
    ) -> (Self, Bet) {
        let bet = Bet {
            user_id: request.creator_id.clone(),
            contest_id: 0,
            side: ContestSide::Creator,
            amount: request.entry_amount,
            placed_at: now,
        };

        let contest = Self {
            id: 0,
            creator_id: request.creator_id,
            claimer_id: None,
            creator_player_id: request.creator_player_id,
            claimer_player_id: request.claimer_player_id,
            game_date: request.game_date,
            entry_amount: request.entry_amount,
            win_bonus_enabled: request.win_bonus_enabled,
            creator_terms,
            claimer_terms,
            money_line: request.money_line,
            status: ContestStatus::Open,
            ended: false,
            ended_at: None,
            winner_id: None,
            winner_label: None,
            creator_win_amount: None,
            claimer_win_amount: None,
            house_profit: None,
            created_at: now,
        };

        (contest, bet)
    }

    /// Moves an `open` contest to `matched` and returns the claimer's companion bet.
    ///
    /// # Errors
    /// Returns an error if the contest is not open, has ended, or the claimer is the creator.
    pub fn claim(&mut self, claimer_id: &str, now: DateTime<Utc>) -> Result<Bet, ContestError> {
        self.ensure_transition(ContestStatus::Matched)?;
        if claimer_id == self.creator_id {
            return Err(ContestError::SelfClaim {
                contest_id: self.id,
            });
        }

        self.claimer_id = Some(claimer_id.to_string());
        self.status = ContestStatus::Matched;

        Ok(Bet {
            user_id: claimer_id.to_string(),
            contest_id: self.id,
            side: ContestSide::Claimer,
            amount: self.entry_amount,
            placed_at: now,
        })
    }

    /// Checks that moving to `to` is legal from the current state.
    ///
    /// # Errors
    /// Returns an error for terminal or otherwise illegal transitions.
    pub fn ensure_transition(&self, to: ContestStatus) -> Result<(), ContestError> {
        if self.ended {
            return Err(ContestError::AlreadyEnded {
                contest_id: self.id,
            });
        }
        if !ContestStatus::can_transition(self.status, to) {
            return Err(ContestError::IllegalTransition {
                contest_id: self.id,
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn terms(&self, side: ContestSide) -> &SideTerms {
        match side {
            ContestSide::Creator => &self.creator_terms,
            ContestSide::Claimer => &self.claimer_terms,
        }
    }

    #[must_use]
    pub fn player_id(&self, side: ContestSide) -> &str {
        match side {
            ContestSide::Creator => &self.creator_player_id,
            ContestSide::Claimer => &self.claimer_player_id,
        }
    }

    /// User on a side. The claimer is `None` until the contest is matched.
    #[must_use]
    pub fn user_id(&self, side: ContestSide) -> Option<&str> {
        match side {
            ContestSide::Creator => Some(&self.creator_id),
            ContestSide::Claimer => self.claimer_id.as_deref(),
        }
    }

    #[must_use]
    pub fn is_matched(&self) -> bool {
        self.status == ContestStatus::Matched && !self.ended
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ContestStatus::Open && !self.ended
    }
}
