//! The durable-storage boundary the register talks to.

use anyhow::Result;

use crate::db::{Database, OrderId, OrderLineItem, Payment, Product};

/// Product lookup, order recording and stock queries needed to ring up a sale.
#[allow(async_fn_in_trait)]
pub trait PersistenceGateway {
    async fn find_product_by_code(&self, code: &str) -> Result<Option<Product>>;

    /// Records the order header, its lines and the stock decrements as one unit.
    /// Either all of it is persisted or none of it is.
    async fn create_order(
        &self,
        ticket_id: &str,
        lines: &[OrderLineItem],
        payment: &Payment,
    ) -> Result<OrderId>;

    async fn list_low_stock_products(&self, threshold: i64) -> Result<Vec<Product>>;
}

impl PersistenceGateway for Database {
    async fn find_product_by_code(&self, code: &str) -> Result<Option<Product>> {
        self.get_product_by_barcode(code).await
    }

    async fn create_order(
        &self,
        ticket_id: &str,
        lines: &[OrderLineItem],
        payment: &Payment,
    ) -> Result<OrderId> {
        Database::create_order(self, ticket_id, lines, payment).await
    }

    async fn list_low_stock_products(&self, threshold: i64) -> Result<Vec<Product>> {
        self.get_low_stock_products(threshold).await
    }
}
