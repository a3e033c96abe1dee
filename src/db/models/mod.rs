pub mod order;
pub mod product;
pub mod stats;

pub use order::{order_total, Order, OrderId, OrderItem, OrderLineItem, Payment, PaymentMethod};
pub use product::{Product, ProductInput, ProductUpdate};
pub use stats::{DailySales, ProductSales, SalesStatistics};
