use log::{info, warn};

use crate::{
    db::{OrderId, OrderLineItem, Payment, Product},
    error::PosError,
    gateway::PersistenceGateway,
    money::Money,
};

use super::session::{LineItemDelta, OrderSession};

/// Mediates between incoming codes (typed or scanned) and the catalog, and turns
/// the session into a recorded order at checkout.
pub struct RegisterController<G> {
    gateway: G,
    session: OrderSession,
}

impl<G: PersistenceGateway> RegisterController<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            session: OrderSession::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn session(&self) -> &OrderSession {
        &self.session
    }

    pub fn lines(&self) -> &[OrderLineItem] {
        self.session.lines()
    }

    pub fn total(&self) -> Result<Money, PosError> {
        self.session.total()
    }

    /// Resolve `code` against the catalog and add one unit of the product.
    ///
    /// The session is untouched unless the lookup succeeds.
    pub async fn add_by_code(&mut self, code: &str) -> Result<LineItemDelta, PosError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(PosError::invalid("code must not be empty"));
        }

        let product = self
            .gateway
            .find_product_by_code(code)
            .await
            .map_err(PosError::PersistenceFailure)?
            .ok_or_else(|| PosError::NotFound(code.to_string()))?;

        let delta = self.session.add_product(&product)?;
        info!("Code {code} -> {delta:?}");
        Ok(delta)
    }

    /// `line_index` is zero-based.
    pub fn set_quantity(&mut self, line_index: usize, quantity: i64) -> Result<(), PosError> {
        if quantity < 1 {
            return Err(PosError::invalid("quantity must be at least 1"));
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| PosError::invalid(format!("quantity {quantity} is too large")))?;
        self.session.set_quantity(line_index, quantity)
    }

    pub fn remove_line(&mut self, line_index: usize) -> Option<OrderLineItem> {
        self.session.remove_line(line_index)
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }

    /// Record the sale and start a fresh session.
    ///
    /// On any failure the session keeps its lines so the cashier can retry.
    pub async fn checkout(&mut self, payment: &Payment) -> Result<OrderId, PosError> {
        if self.session.is_empty() {
            return Err(PosError::invalid("the order is empty"));
        }
        payment.validate()?;
        let total = self.session.total()?;

        self.session.begin_commit();
        let result = self
            .gateway
            .create_order(self.session.ticket_id(), self.session.lines(), payment)
            .await;

        match result {
            Ok(order_id) => {
                info!(
                    "Ticket {} checked out as order {order_id} ({total})",
                    self.session.ticket_id()
                );
                self.session.clear();
                Ok(order_id)
            }
            Err(err) => {
                warn!(
                    "Checkout of ticket {} failed, keeping session: {err:#}",
                    self.session.ticket_id()
                );
                self.session.abort_commit();
                Err(PosError::PersistenceFailure(err))
            }
        }
    }

    pub async fn low_stock(&self, threshold: i64) -> Result<Vec<Product>, PosError> {
        self.gateway
            .list_low_stock_products(threshold)
            .await
            .map_err(PosError::PersistenceFailure)
    }
}
