//! Ledger row models.

use super::from_timestamp;
use anyhow::{anyhow, Result};
use duel_core::{ContestSide, Gain, GainKind, LedgerBet, TopUp};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GainRecord {
    pub id: i64,
    pub user_id: String,
    pub contest_id: Option<i64>,
    pub side: Option<String>,
    pub kind: String,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub transferred: bool,
    pub transfer_id: Option<String>,
    pub paid: bool,
    pub payout_id: Option<String>,
    pub created_at: i64,
}

impl TryFrom<GainRecord> for Gain {
    type Error = anyhow::Error;

    fn try_from(row: GainRecord) -> Result<Self> {
        let kind = GainKind::parse(&row.kind)
            .ok_or_else(|| anyhow!("gain {}: unknown kind {:?}", row.id, row.kind))?;
        let side = row.side.as_deref().map(parse_side).transpose()?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            contest_id: row.contest_id,
            side,
            kind,
            amount_minor: row.amount_minor,
            note: row.note,
            transferred: row.transferred,
            transfer_id: row.transfer_id,
            paid: row.paid,
            payout_id: row.payout_id,
            created_at: from_timestamp(row.created_at)?,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BetRecord {
    pub id: i64,
    pub user_id: String,
    pub contest_id: i64,
    pub side: String,
    pub amount_minor: i64,
    pub transferred: bool,
    pub transfer_id: Option<String>,
    pub created_at: i64,
}

impl TryFrom<BetRecord> for LedgerBet {
    type Error = anyhow::Error;

    fn try_from(row: BetRecord) -> Result<Self> {
        Ok(Self {
            id: row.id,
            side: parse_side(&row.side)?,
            user_id: row.user_id,
            contest_id: row.contest_id,
            amount_minor: row.amount_minor,
            transferred: row.transferred,
            transfer_id: row.transfer_id,
            created_at: from_timestamp(row.created_at)?,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopUpRecord {
    pub id: i64,
    pub user_id: String,
    pub amount_minor: i64,
    pub transferred: bool,
    pub refunded: bool,
    pub charge_id: Option<String>,
    pub created_at: i64,
}

impl TryFrom<TopUpRecord> for TopUp {
    type Error = anyhow::Error;

    fn try_from(row: TopUpRecord) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            amount_minor: row.amount_minor,
            transferred: row.transferred,
            refunded: row.refunded,
            charge_id: row.charge_id,
            created_at: from_timestamp(row.created_at)?,
        })
    }
}

fn parse_side(value: &str) -> Result<ContestSide> {
    ContestSide::parse(value).ok_or_else(|| anyhow!("unknown contest side {value:?}"))
}
