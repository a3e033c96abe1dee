use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub model: String,
    pub quantity: i64,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    /// `YYYY-MM-DD` in the shop's local time zone.
    pub date: String,
    pub order_count: i64,
    pub total: Money,
}

/// Sales over a trailing window of days.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesStatistics {
    pub days: u32,
    pub total_sales: Money,
    pub total_orders: i64,
    pub popular_products: Vec<ProductSales>,
    pub daily_sales: Vec<DailySales>,
}
