use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use rusqlite::{params, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{format_datetime, parse_datetime, parse_payment_method, to_u32},
        models::{order_total, Order, OrderId, OrderItem, OrderLineItem, Payment},
    },
    money::Money,
};

fn row_to_order(row: &Row) -> Result<Order> {
    let ordered_at: String = row.get("ordered_at")?;
    let payment_method: String = row.get("payment_method")?;

    Ok(Order {
        id: OrderId(row.get("id")?),
        ticket_id: row.get("ticket_id")?,
        ordered_at: parse_datetime(&ordered_at, "ordered_at")?,
        total: Money::from_cents(row.get("total_cents")?),
        payment_method: parse_payment_method(&payment_method)?,
        payment_reference: row.get("payment_reference")?,
    })
}

fn row_to_order_item(row: &Row) -> Result<OrderItem> {
    Ok(OrderItem {
        product_id: row.get("product_id")?,
        model: row.get("model")?,
        quantity: to_u32(row.get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.get("unit_price_cents")?),
    })
}

impl Database {
    /// Persist a completed sale.
    ///
    /// Header, order lines and stock decrements are written in one transaction; if
    /// any statement fails nothing is committed.
    pub async fn create_order(
        &self,
        ticket_id: &str,
        lines: &[OrderLineItem],
        payment: &Payment,
    ) -> Result<OrderId> {
        if lines.is_empty() {
            bail!("cannot create an order without line items");
        }
        let total = order_total(lines)?;

        let ticket_id = ticket_id.to_string();
        let lines = lines.to_vec();
        let payment = payment.clone();

        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open order transaction")?;

            tx.execute(
                "INSERT INTO orders (ticket_id, ordered_at, total_cents, payment_method, payment_reference)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    ticket_id,
                    format_datetime(&Utc::now()),
                    total.cents(),
                    payment.method.as_str(),
                    payment.reference.as_deref().map(str::trim),
                ],
            )
            .with_context(|| format!("failed to insert order header for ticket {ticket_id}"))?;
            let order_id = tx.last_insert_rowid();

            for line in &lines {
                tx.execute(
                    "INSERT INTO order_items (order_id, product_id, model, quantity, unit_price_cents)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        order_id,
                        line.product_id,
                        line.display_name,
                        line.quantity,
                        line.unit_price.cents(),
                    ],
                )
                .with_context(|| format!("failed to insert order line for product {}", line.product_id))?;

                let updated = tx.execute(
                    "UPDATE products SET stock = stock - ?1, updated_at = ?2 WHERE id = ?3",
                    params![line.quantity, format_datetime(&Utc::now()), line.product_id],
                )?;
                if updated == 0 {
                    bail!("product {} no longer exists", line.product_id);
                }
            }

            tx.commit().context("failed to commit order")?;

            info!(
                "Order {} recorded: {} line(s), total {}, paid by {}",
                OrderId(order_id),
                lines.len(),
                total,
                payment.method.as_str()
            );
            Ok(OrderId(order_id))
        })
        .await
    }

    /// All orders, newest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ticket_id, ordered_at, total_cents, payment_method, payment_reference
                 FROM orders
                 ORDER BY ordered_at DESC, id DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut orders = Vec::new();
            while let Some(row) = rows.next()? {
                orders.push(row_to_order(row)?);
            }
            Ok(orders)
        })
        .await
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ticket_id, ordered_at, total_cents, payment_method, payment_reference
                 FROM orders
                 WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![order_id.0])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_order(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT product_id, model, quantity, unit_price_cents
                 FROM order_items
                 WHERE order_id = ?1
                 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query(params![order_id.0])?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(row_to_order_item(row)?);
            }
            Ok(items)
        })
        .await
    }
}
