use crate::contest::{Contest, ContestSide};
use crate::resolver::{Outcome, Settlement};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Outbound message template keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    ContestWon,
    ContestLost,
    ContestPush,
    ContestUnmatched,
}

impl NotificationTemplate {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContestWon => "contest_won",
            Self::ContestLost => "contest_lost",
            Self::ContestPush => "contest_push",
            Self::ContestUnmatched => "contest_unmatched",
        }
    }
}

/// A notification for one participant of a settled contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub user_id: String,
    pub contest_id: i64,
    pub template: NotificationTemplate,
    pub net_amount: Decimal,
    pub context: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Builds one event per participant of a committed settlement.
#[must_use]
pub fn settlement_events(contest: &Contest, settlement: &Settlement) -> Vec<SettlementEvent> {
    [ContestSide::Creator, ContestSide::Claimer]
        .into_iter()
        .filter_map(|side| {
            let user_id = contest.user_id(side)?;
            let template = match settlement.outcome {
                Outcome::Push => NotificationTemplate::ContestPush,
                Outcome::Unmatched => NotificationTemplate::ContestUnmatched,
                _ if settlement.winner_side == Some(side) => NotificationTemplate::ContestWon,
                _ => NotificationTemplate::ContestLost,
            };
            let net_amount = settlement.net(side);

            Some(SettlementEvent {
                user_id: user_id.to_string(),
                contest_id: contest.id,
                template,
                net_amount,
                context: json!({
                    "contest_id": contest.id,
                    "side": side.as_str(),
                    "player_id": contest.player_id(side),
                    "game_date": contest.game_date.to_string(),
                    "entry_amount": contest.entry_amount.to_string(),
                    "net_amount": net_amount.to_string(),
                    "outcome": settlement.outcome.as_str(),
                    "winner": settlement.winner_label.as_str(),
                }),
                timestamp: settlement.ended_at,
            })
        })
        .collect()
}
