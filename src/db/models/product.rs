//! Catalog data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::PosError, money::Money};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub barcode: String,
    /// Model name; doubles as the display name on receipts and order lines.
    pub model: String,
    pub price: Money,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn check_price(price: Money) -> Result<(), PosError> {
    if !price.is_positive() {
        return Err(PosError::invalid("price must be greater than zero"));
    }
    if price > Money::MAX_PRICE {
        return Err(PosError::invalid(format!(
            "price must be at most {}",
            Money::MAX_PRICE
        )));
    }
    Ok(())
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub barcode: String,
    pub model: String,
    pub price: Money,
    pub stock: i64,
}

impl ProductInput {
    pub fn validate(&self) -> Result<(), PosError> {
        if self.barcode.trim().is_empty() {
            return Err(PosError::invalid("barcode must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(PosError::invalid("model must not be empty"));
        }
        check_price(self.price)?;
        if self.stock < 0 {
            return Err(PosError::invalid("stock must not be negative"));
        }
        Ok(())
    }
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub barcode: Option<String>,
    pub model: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<i64>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.barcode.is_none() && self.model.is_none() && self.price.is_none() && self.stock.is_none()
    }

    pub fn validate(&self) -> Result<(), PosError> {
        if matches!(&self.barcode, Some(b) if b.trim().is_empty()) {
            return Err(PosError::invalid("barcode must not be empty"));
        }
        if matches!(&self.model, Some(m) if m.trim().is_empty()) {
            return Err(PosError::invalid("model must not be empty"));
        }
        if let Some(price) = self.price {
            check_price(price)?;
        }
        if matches!(self.stock, Some(s) if s < 0) {
            return Err(PosError::invalid("stock must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(price: &str) -> ProductInput {
        ProductInput {
            barcode: "6901".into(),
            model: "Cola 330ml".into(),
            price: price.parse().unwrap(),
            stock: 10,
        }
    }

    #[test]
    fn price_must_be_positive_and_bounded() {
        assert!(input("3.50").validate().is_ok());
        assert!(input("1000000").validate().is_ok());
        assert!(matches!(input("0").validate(), Err(PosError::InvalidInput(_))));
        assert!(matches!(input("30000000").validate(), Err(PosError::InvalidInput(_))));

        let update = ProductUpdate {
            price: Some(Money::from_cents(Money::MAX_PRICE.cents() + 1)),
            ..ProductUpdate::default()
        };
        assert!(matches!(update.validate(), Err(PosError::InvalidInput(_))));
    }
}
