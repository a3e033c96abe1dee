//! Order and payment data models.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::PosError, money::Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl Display for OrderId {
    /// Order numbers are shown zero-padded to five digits.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PaymentMethod {
    Cash,
    WeChatPay,
    Alipay,
    MemberCard,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::WeChatPay,
        PaymentMethod::Alipay,
        PaymentMethod::MemberCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::WeChatPay => "wechat",
            PaymentMethod::Alipay => "alipay",
            PaymentMethod::MemberCard => "card",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "现金",
            PaymentMethod::WeChatPay => "微信支付",
            PaymentMethod::Alipay => "支付宝",
            PaymentMethod::MemberCard => "会员卡",
        }
    }

    /// Everything except cash needs a payment code or member card number.
    pub fn requires_reference(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = PosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(needle) || m.label() == needle)
            .ok_or_else(|| {
                PosError::invalid(format!(
                    "unknown payment method '{needle}' (expected cash, wechat, alipay or card)"
                ))
            })
    }
}

/// Payment chosen at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

impl Payment {
    pub fn cash() -> Self {
        Self {
            method: PaymentMethod::Cash,
            reference: None,
        }
    }

    pub fn with_reference(method: PaymentMethod, reference: impl Into<String>) -> Self {
        Self {
            method,
            reference: Some(reference.into()),
        }
    }

    pub fn validate(&self) -> Result<(), PosError> {
        let has_reference = self
            .reference
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if self.method.requires_reference() && !has_reference {
            return Err(PosError::invalid(format!(
                "{} requires a payment code or card number",
                self.method
            )));
        }
        Ok(())
    }
}

fn amount_too_large() -> PosError {
    PosError::invalid("amount is too large")
}

/// Sum of the line subtotals, or `InvalidInput` if it leaves the `i64` range.
pub fn order_total(lines: &[OrderLineItem]) -> Result<Money, PosError> {
    let subtotals = lines
        .iter()
        .map(OrderLineItem::subtotal)
        .collect::<Result<Vec<_>, _>>()?;
    Money::checked_sum(subtotals).ok_or_else(amount_too_large)
}

/// One line of the sale currently being rung up.
///
/// `display_name` and `unit_price` are snapshots taken when the product was first
/// added; later catalog edits do not touch them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub product_id: i64,
    pub display_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLineItem {
    pub fn subtotal(&self) -> Result<Money, PosError> {
        self.unit_price
            .checked_mul(self.quantity)
            .ok_or_else(amount_too_large)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub ticket_id: String,
    pub ordered_at: DateTime<Utc>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
}

/// A persisted order line. `product_id` is `None` once the product was deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Option<i64>,
    pub model: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn subtotal(&self) -> Result<Money, PosError> {
        self.unit_price
            .checked_mul(self.quantity)
            .ok_or_else(amount_too_large)
    }
}

impl From<&OrderLineItem> for OrderItem {
    fn from(line: &OrderLineItem) -> Self {
        Self {
            product_id: Some(line.product_id),
            model: line.display_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_cash_payment_needs_reference() {
        assert!(Payment::cash().validate().is_ok());
        let missing = Payment {
            method: PaymentMethod::Alipay,
            reference: Some("   ".into()),
        };
        assert!(matches!(missing.validate(), Err(PosError::InvalidInput(_))));
        assert!(Payment::with_reference(PaymentMethod::MemberCard, "8800123")
            .validate()
            .is_ok());
    }

    #[test]
    fn payment_method_parses_code_or_label() {
        assert_eq!("WeChat".parse::<PaymentMethod>().unwrap(), PaymentMethod::WeChatPay);
        assert_eq!("支付宝".parse::<PaymentMethod>().unwrap(), PaymentMethod::Alipay);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn oversized_line_amounts_are_errors() {
        let line = |cents, quantity| OrderLineItem {
            product_id: 1,
            display_name: "Cola".into(),
            unit_price: Money::from_cents(cents),
            quantity,
        };
        assert_eq!(line(350, 3).subtotal().unwrap(), Money::from_cents(1050));
        assert!(matches!(line(i64::MAX, 2).subtotal(), Err(PosError::InvalidInput(_))));

        let half = i64::MAX / 2 + 1;
        assert!(matches!(
            order_total(&[line(half, 1), line(half, 1)]),
            Err(PosError::InvalidInput(_))
        ));
        assert_eq!(
            order_total(&[line(350, 2), line(100, 1)]).unwrap(),
            Money::from_cents(800)
        );
    }

    #[test]
    fn order_id_is_zero_padded() {
        assert_eq!(OrderId(42).to_string(), "00042");
        assert_eq!(OrderId(123456).to_string(), "123456");
    }
}
