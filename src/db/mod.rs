mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{
    order_total, Order, OrderId, OrderItem, OrderLineItem, Payment, PaymentMethod, Product,
    ProductInput, ProductUpdate, SalesStatistics,
};
