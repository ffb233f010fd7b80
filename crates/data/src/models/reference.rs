//! Payout reference table rows.

use super::{from_timestamp, parse_decimal};
use anyhow::{anyhow, Result};
use duel_core::{LikelihoodRow, SpreadRow, SpreadType};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SpreadRecord {
    pub id: i64,
    pub spread: String,
    pub spread_type: String,
    pub cover_multiplier: String,
    pub money_line_multiplier: String,
    pub updated_at: i64,
}

impl TryFrom<SpreadRecord> for SpreadRow {
    type Error = anyhow::Error;

    fn try_from(row: SpreadRecord) -> Result<Self> {
        Ok(Self {
            spread: parse_decimal("spread", &row.spread)?,
            spread_type: SpreadType::parse(&row.spread_type).ok_or_else(|| {
                anyhow!("spread row {}: unknown type {:?}", row.id, row.spread_type)
            })?,
            cover_multiplier: parse_decimal("cover_multiplier", &row.cover_multiplier)?,
            money_line_multiplier: parse_decimal(
                "money_line_multiplier",
                &row.money_line_multiplier,
            )?,
            updated_at: from_timestamp(row.updated_at)?,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LikelihoodRecord {
    pub id: i64,
    pub probability_pct: i64,
    pub payout_multiplier: String,
    pub inverse_payout_multiplier: String,
    pub updated_at: i64,
}

impl TryFrom<LikelihoodRecord> for LikelihoodRow {
    type Error = anyhow::Error;

    fn try_from(row: LikelihoodRecord) -> Result<Self> {
        let probability_pct = u8::try_from(row.probability_pct)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| {
                anyhow!(
                    "likelihood row {}: probability {} out of range",
                    row.id,
                    row.probability_pct
                )
            })?;

        Ok(Self {
            probability_pct,
            payout_multiplier: parse_decimal("payout_multiplier", &row.payout_multiplier)?,
            inverse_payout_multiplier: parse_decimal(
                "inverse_payout_multiplier",
                &row.inverse_payout_multiplier,
            )?,
            updated_at: from_timestamp(row.updated_at)?,
        })
    }
}
