use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{order_total, OrderLineItem, Product},
    error::PosError,
    money::Money,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Empty,
    Building,
    Committing,
}

/// Largest quantity a single line may hold.
pub const MAX_QUANTITY: u32 = 9_999;

/// What an add did to the session, for echoing back to the cashier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItemDelta {
    Added { index: usize, name: String },
    Incremented { index: usize, name: String, quantity: u32 },
}

/// The sale currently being rung up.
///
/// Owned by the register's control task and never shared, so it carries no
/// locking. Holds at most one line per product, and no line ever has a quantity
/// below one.
#[derive(Debug, Clone)]
pub struct OrderSession {
    ticket_id: String,
    lines: Vec<OrderLineItem>,
    committing: bool,
}

impl Default for OrderSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderSession {
    pub fn new() -> Self {
        Self {
            ticket_id: Uuid::new_v4().to_string(),
            lines: Vec::new(),
            committing: false,
        }
    }

    /// Identifies this sale when it is recorded; stays the same across checkout
    /// retries and changes once the session is cleared.
    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    pub fn state(&self) -> SessionState {
        match (self.committing, self.lines.is_empty()) {
            (true, _) => SessionState::Committing,
            (false, true) => SessionState::Empty,
            (false, false) => SessionState::Building,
        }
    }

    pub fn lines(&self) -> &[OrderLineItem] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> Result<Money, PosError> {
        order_total(&self.lines)
    }

    /// Increment the product's line, or append a new one priced at the product's
    /// current price.
    ///
    /// Fails, leaving the session unchanged, when the line is already at
    /// [`MAX_QUANTITY`] or the total would no longer fit.
    pub fn add_product(&mut self, product: &Product) -> Result<LineItemDelta, PosError> {
        if let Some(index) = self.lines.iter().position(|l| l.product_id == product.id) {
            let quantity = self.lines[index].quantity.saturating_add(1);
            self.change_quantity(index, quantity)?;
            return Ok(LineItemDelta::Incremented {
                index,
                name: self.lines[index].display_name.clone(),
                quantity,
            });
        }

        self.lines.push(OrderLineItem {
            product_id: product.id,
            display_name: product.model.clone(),
            unit_price: product.price,
            quantity: 1,
        });
        if let Err(err) = self.total() {
            self.lines.pop();
            return Err(err);
        }
        Ok(LineItemDelta::Added {
            index: self.lines.len() - 1,
            name: product.model.clone(),
        })
    }

    pub fn set_quantity(&mut self, index: usize, quantity: u32) -> Result<(), PosError> {
        if index >= self.lines.len() {
            return Err(PosError::invalid(format!(
                "no line {} (session has {})",
                index + 1,
                self.lines.len()
            )));
        }
        self.change_quantity(index, quantity)
    }

    /// Applies `quantity` to an existing line only if it is in range and the new
    /// total still fits.
    fn change_quantity(&mut self, index: usize, quantity: u32) -> Result<(), PosError> {
        if quantity < 1 {
            return Err(PosError::invalid("quantity must be at least 1"));
        }
        if quantity > MAX_QUANTITY {
            return Err(PosError::invalid(format!(
                "quantity must be at most {MAX_QUANTITY}"
            )));
        }

        let previous = std::mem::replace(&mut self.lines[index].quantity, quantity);
        if let Err(err) = self.total() {
            self.lines[index].quantity = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Out-of-range indexes are ignored.
    pub fn remove_line(&mut self, index: usize) -> Option<OrderLineItem> {
        (index < self.lines.len()).then(|| self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub(super) fn begin_commit(&mut self) {
        self.committing = true;
    }

    pub(super) fn abort_commit(&mut self) {
        self.committing = false;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(id: i64, model: &str, cents: i64) -> Product {
        Product {
            id,
            barcode: format!("690000{id}"),
            model: model.into(),
            price: Money::from_cents(cents),
            stock: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn adding_same_product_twice_increments() {
        let mut session = OrderSession::new();
        let cola = product(1, "Cola 330ml", 350);

        assert_eq!(
            session.add_product(&cola).unwrap(),
            LineItemDelta::Added { index: 0, name: "Cola 330ml".into() }
        );
        assert!(matches!(
            session.add_product(&cola).unwrap(),
            LineItemDelta::Incremented { index: 0, quantity: 2, .. }
        ));
        assert_eq!(session.lines().len(), 1);
        assert_eq!(session.total().unwrap(), Money::from_cents(700));
    }

    #[test]
    fn price_is_snapshotted_at_add_time() {
        let mut session = OrderSession::new();
        let mut tea = product(2, "Green tea", 500);
        session.add_product(&tea).unwrap();

        tea.price = Money::from_cents(900);
        session.add_product(&tea).unwrap();

        assert_eq!(session.lines()[0].unit_price, Money::from_cents(500));
        assert_eq!(session.total().unwrap(), Money::from_cents(1000));
    }

    #[test]
    fn zero_quantity_is_rejected_and_line_kept() {
        let mut session = OrderSession::new();
        session.add_product(&product(1, "Cola", 350)).unwrap();

        assert!(matches!(session.set_quantity(0, 0), Err(PosError::InvalidInput(_))));
        assert_eq!(session.lines()[0].quantity, 1);

        assert!(session.set_quantity(3, 2).is_err());
        session.set_quantity(0, 4).unwrap();
        assert_eq!(session.lines()[0].quantity, 4);
    }

    #[test]
    fn oversized_quantity_is_rejected_and_total_stays_valid() {
        let mut session = OrderSession::new();
        let mut projector = product(1, "Projector", 0);
        projector.price = "30000000".parse().unwrap();
        session.add_product(&projector).unwrap();

        assert!(matches!(
            session.set_quantity(0, u32::MAX),
            Err(PosError::InvalidInput(_))
        ));
        assert!(session.set_quantity(0, MAX_QUANTITY + 1).is_err());
        assert_eq!(session.lines()[0].quantity, 1);
        assert_eq!(session.total().unwrap(), Money::from_cents(3_000_000_000));

        session.set_quantity(0, MAX_QUANTITY).unwrap();
        assert!(session.add_product(&projector).is_err());
        assert_eq!(session.lines()[0].quantity, MAX_QUANTITY);
    }

    #[test]
    fn add_that_would_overflow_the_total_changes_nothing() {
        let mut session = OrderSession::new();
        let half = i64::MAX / 2 + 1;
        session.add_product(&product(1, "Gold bar", half)).unwrap();

        assert!(matches!(
            session.add_product(&product(1, "Gold bar", half)),
            Err(PosError::InvalidInput(_))
        ));
        assert!(session.add_product(&product(2, "Platinum bar", half)).is_err());
        assert!(session.set_quantity(0, 2).is_err());

        assert_eq!(session.lines().len(), 1);
        assert_eq!(session.lines()[0].quantity, 1);
        assert_eq!(session.total().unwrap(), Money::from_cents(half));
    }

    #[test]
    fn remove_out_of_range_is_a_no_op() {
        let mut session = OrderSession::new();
        session.add_product(&product(1, "Cola", 350)).unwrap();
        session.add_product(&product(2, "Chips", 600)).unwrap();

        assert!(session.remove_line(5).is_none());
        assert_eq!(session.lines().len(), 2);

        let removed = session.remove_line(0).unwrap();
        assert_eq!(removed.product_id, 1);
        assert_eq!(session.lines()[0].product_id, 2);
    }

    #[test]
    fn state_follows_contents_and_clear_issues_new_ticket() {
        let mut session = OrderSession::new();
        assert_eq!(session.state(), SessionState::Empty);

        session.add_product(&product(1, "Cola", 350)).unwrap();
        assert_eq!(session.state(), SessionState::Building);

        session.begin_commit();
        assert_eq!(session.state(), SessionState::Committing);
        session.abort_commit();
        assert_eq!(session.state(), SessionState::Building);

        let ticket = session.ticket_id().to_string();
        session.clear();
        assert_eq!(session.state(), SessionState::Empty);
        assert_ne!(session.ticket_id(), ticket);
    }
}
