use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use rusqlite::params;

use crate::{
    db::{
        connection::Database,
        helpers::{format_datetime, parse_datetime},
        models::{DailySales, ProductSales, SalesStatistics},
    },
    money::Money,
};

const POPULAR_PRODUCT_LIMIT: i64 = 10;

/// Buckets `(ordered_at, total_cents)` rows by calendar day as seen in `tz`.
fn group_by_day<Tz: TimeZone>(
    orders: &[(DateTime<Utc>, i64)],
    tz: &Tz,
) -> Result<Vec<DailySales>> {
    let mut days: BTreeMap<NaiveDate, (i64, Money)> = BTreeMap::new();
    for (ordered_at, cents) in orders {
        let day = ordered_at.with_timezone(tz).date_naive();
        let (count, total) = days.entry(day).or_insert((0, Money::ZERO));
        *count += 1;
        *total = total
            .checked_add(Money::from_cents(*cents))
            .ok_or_else(|| anyhow!("sales total for {day} is too large"))?;
    }

    Ok(days
        .into_iter()
        .map(|(day, (order_count, total))| DailySales {
            date: day.format("%Y-%m-%d").to_string(),
            order_count,
            total,
        })
        .collect())
}

impl Database {
    /// Totals, best sellers and per-day takings over the last `days` days.
    pub async fn sales_statistics(&self, days: u32) -> Result<SalesStatistics> {
        let since = format_datetime(&(Utc::now() - Duration::days(i64::from(days))));

        self.execute(move |conn| {
            let (total_orders, total_cents): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(total_cents), 0)
                 FROM orders
                 WHERE ordered_at >= ?1",
                params![since],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let mut stmt = conn.prepare(
                "SELECT oi.model,
                        SUM(oi.quantity) AS total_quantity,
                        SUM(oi.quantity * oi.unit_price_cents) AS total_cents
                 FROM order_items oi
                 JOIN orders o ON oi.order_id = o.id
                 WHERE o.ordered_at >= ?1
                 GROUP BY oi.model
                 ORDER BY total_quantity DESC, oi.model ASC
                 LIMIT ?2",
            )?;
            let mut rows = stmt.query(params![since, POPULAR_PRODUCT_LIMIT])?;
            let mut popular_products = Vec::new();
            while let Some(row) = rows.next()? {
                popular_products.push(ProductSales {
                    model: row.get(0)?,
                    quantity: row.get(1)?,
                    amount: Money::from_cents(row.get(2)?),
                });
            }

            let mut stmt = conn.prepare(
                "SELECT ordered_at, total_cents
                 FROM orders
                 WHERE ordered_at >= ?1
                 ORDER BY ordered_at ASC",
            )?;
            let mut rows = stmt.query(params![since])?;
            let mut orders = Vec::new();
            while let Some(row) = rows.next()? {
                let ordered_at: String = row.get(0)?;
                orders.push((parse_datetime(&ordered_at, "ordered_at")?, row.get(1)?));
            }
            let daily_sales = group_by_day(&orders, &Local)?;

            Ok(SalesStatistics {
                days,
                total_sales: Money::from_cents(total_cents),
                total_orders,
                popular_products,
                daily_sales,
            })
        })
        .await
    }
}
