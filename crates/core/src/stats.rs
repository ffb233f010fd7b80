//! Data consumed from the sports-statistics feed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Final,
    Postponed,
    Canceled,
}

impl GameStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Final => "final",
            Self::Postponed => "postponed",
            Self::Canceled => "canceled",
        }
    }

    #[must_use]
    pub fn is_concluded(&self) -> bool {
        matches!(self, Self::Final | Self::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSchedule {
    pub game_id: String,
    pub status: GameStatus,
    pub home_team: String,
    pub away_team: String,
    pub starts_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_id: String,
    pub is_final: bool,
    pub points: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProjection {
    pub player_id: String,
    pub projected_points: Decimal,
    pub opponent: Option<String>,
}

/// Player results for one date, keyed by player id.
#[derive(Debug, Clone, Default)]
pub struct FinalResults {
    by_player: HashMap<String, PlayerResult>,
}

impl FinalResults {
    #[must_use]
    pub fn new(results: Vec<PlayerResult>) -> Self {
        let by_player = results
            .into_iter()
            .map(|r| (r.player_id.clone(), r))
            .collect();
        Self { by_player }
    }

    #[must_use]
    pub fn get(&self, player_id: &str) -> Option<&PlayerResult> {
        self.by_player.get(player_id)
    }

    /// Points for a player, only once the feed has marked them official.
    #[must_use]
    pub fn final_points(&self, player_id: &str) -> Option<Decimal> {
        self.by_player
            .get(player_id)
            .filter(|r| r.is_final)
            .map(|r| r.points)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }
}
