//! Contest row model.

use super::{from_timestamp, parse_date, parse_decimal, parse_optional_decimal};
use anyhow::{anyhow, Result};
use duel_core::{Contest, ContestStatus, SideTerms, WinnerLabel};

/// A row of the `contests` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContestRecord {
    pub id: i64,
    pub creator_id: String,
    pub claimer_id: Option<String>,
    pub creator_player_id: String,
    pub claimer_player_id: String,
    pub game_date: String,
    pub entry_amount: String,
    pub win_bonus_enabled: bool,
    pub creator_spread: String,
    pub creator_cover: String,
    pub creator_win_bonus: String,
    pub creator_max_win: String,
    pub claimer_spread: String,
    pub claimer_cover: String,
    pub claimer_win_bonus: String,
    pub claimer_max_win: String,
    pub money_line: String,
    pub status: String,
    pub ended: bool,
    pub ended_at: Option<i64>,
    pub winner_id: Option<String>,
    pub winner_label: Option<String>,
    pub creator_win_amount: Option<String>,
    pub claimer_win_amount: Option<String>,
    pub house_profit: Option<String>,
    pub created_at: i64,
}

/// Column list matching [`ContestRecord`].
pub const CONTEST_COLUMNS: &str = "id, creator_id, claimer_id, creator_player_id, claimer_player_id, \
     game_date, entry_amount, win_bonus_enabled, \
     creator_spread, creator_cover, creator_win_bonus, creator_max_win, \
     claimer_spread, claimer_cover, claimer_win_bonus, claimer_max_win, \
     money_line, status, ended, ended_at, winner_id, winner_label, \
     creator_win_amount, claimer_win_amount, house_profit, created_at";

impl TryFrom<ContestRecord> for Contest {
    type Error = anyhow::Error;

    fn try_from(row: ContestRecord) -> Result<Self> {
        let status = ContestStatus::parse(&row.status)
            .ok_or_else(|| anyhow!("contest {}: unknown status {:?}", row.id, row.status))?;
        let winner_label = row
            .winner_label
            .as_deref()
            .map(|l| {
                WinnerLabel::parse(l)
                    .ok_or_else(|| anyhow!("contest {}: unknown winner label {l:?}", row.id))
            })
            .transpose()?;

        Ok(Self {
            id: row.id,
            creator_terms: SideTerms {
                spread: parse_decimal("creator_spread", &row.creator_spread)?,
                cover: parse_decimal("creator_cover", &row.creator_cover)?,
                win_bonus: parse_decimal("creator_win_bonus", &row.creator_win_bonus)?,
                max_win: parse_decimal("creator_max_win", &row.creator_max_win)?,
            },
            claimer_terms: SideTerms {
                spread: parse_decimal("claimer_spread", &row.claimer_spread)?,
                cover: parse_decimal("claimer_cover", &row.claimer_cover)?,
                win_bonus: parse_decimal("claimer_win_bonus", &row.claimer_win_bonus)?,
                max_win: parse_decimal("claimer_max_win", &row.claimer_max_win)?,
            },
            creator_id: row.creator_id,
            claimer_id: row.claimer_id,
            creator_player_id: row.creator_player_id,
            claimer_player_id: row.claimer_player_id,
            game_date: parse_date(&row.game_date)?,
            entry_amount: parse_decimal("entry_amount", &row.entry_amount)?,
            win_bonus_enabled: row.win_bonus_enabled,
            money_line: parse_decimal("money_line", &row.money_line)?,
            status,
            ended: row.ended,
            ended_at: row.ended_at.map(from_timestamp).transpose()?,
            winner_id: row.winner_id,
            winner_label,
            creator_win_amount: parse_optional_decimal(
                "creator_win_amount",
                row.creator_win_amount.as_deref(),
            )?,
            claimer_win_amount: parse_optional_decimal(
                "claimer_win_amount",
                row.claimer_win_amount.as_deref(),
            )?,
            house_profit: parse_optional_decimal("house_profit", row.house_profit.as_deref())?,
            created_at: from_timestamp(row.created_at)?,
        })
    }
}
