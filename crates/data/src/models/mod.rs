//! Row models for the SQLite schema.
//!
//! `SQLite` has no decimal type, so money and multipliers are stored as TEXT
//! and parsed back into `Decimal`. Timestamps are unix seconds.

pub mod contest;
pub mod ledger;
pub mod reference;

pub use contest::ContestRecord;
pub use ledger::{BetRecord, GainRecord, TopUpRecord};
pub use reference::{LikelihoodRecord, SpreadRecord};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).with_context(|| format!("invalid decimal in {field}: {value:?}"))
}

pub(crate) fn parse_optional_decimal(field: &str, value: Option<&str>) -> Result<Option<Decimal>> {
    value.map(|v| parse_decimal(field, v)).transpose()
}

pub(crate) fn from_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| anyhow!("timestamp out of range: {secs}"))
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid game date: {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_decimal("x", "-3.5").unwrap(), dec!(-3.5));
        assert!(parse_decimal("x", "abc").is_err());
        assert_eq!(parse_optional_decimal("x", None).unwrap(), None);
        assert_eq!(from_timestamp(0).unwrap().timestamp(), 0);
        assert_eq!(
            parse_date("2025-09-07").unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 7).unwrap()
        );
    }
}
