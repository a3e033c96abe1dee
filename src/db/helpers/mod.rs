use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::{db::models::PaymentMethod, error::PosError};

/// Timestamps are stored with millisecond precision and a `Z` suffix so that
/// text comparison in SQL matches chronological order.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn parse_payment_method(value: &str) -> Result<PaymentMethod> {
    value
        .parse()
        .map_err(|err: PosError| anyhow!("stored payment method is invalid: {err}"))
}

/// Maps a UNIQUE violation on `products` to a readable [`PosError::AlreadyExists`].
pub fn map_product_conflict(err: rusqlite::Error) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(_, Some(message)) = &err {
        if message.contains("products.barcode") {
            return PosError::AlreadyExists("a product with this barcode already exists".into())
                .into();
        }
        if message.contains("products.model") {
            return PosError::AlreadyExists("a product with this model already exists".into())
                .into();
        }
    }
    anyhow::Error::new(err)
}
