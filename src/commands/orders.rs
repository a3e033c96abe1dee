use anyhow::{anyhow, Result};
use chrono::{Local, Utc};

use crate::{
    cli::OrderCommand,
    db::{Order, OrderId, OrderItem, SalesStatistics},
    error::PosError,
    money::{format_amount, CURRENCY_SYMBOL},
    receipt::render_receipt,
};

use super::{write_output, AppContext};

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub async fn run(ctx: &AppContext, command: OrderCommand) -> Result<()> {
    match command {
        OrderCommand::List { limit } => {
            let orders = ctx.db.list_orders().await?;
            let shown = limit.unwrap_or(orders.len());
            print_orders(&orders[..shown.min(orders.len())]);
            Ok(())
        }
        OrderCommand::Show { id } => {
            let (order, items) = load_order(ctx, id).await?;
            print_orders(std::slice::from_ref(&order));
            println!();
            print_items(&items);
            Ok(())
        }
        OrderCommand::Receipt { id, output } => {
            let (order, items) = load_order(ctx, id).await?;
            let text = render_receipt(&ctx.settings.shop_profile(), &order, &items, Local::now());
            write_output(&text, output.as_deref())
        }
        OrderCommand::Stats { days } => {
            print_stats(&ctx.db.sales_statistics(days).await?);
            Ok(())
        }
    }
}

pub(crate) async fn load_order(ctx: &AppContext, id: OrderId) -> Result<(Order, Vec<OrderItem>)> {
    let order = ctx
        .db
        .get_order(id)
        .await?
        .ok_or_else(|| anyhow!(PosError::NotFound(format!("order {id}"))))?;
    let items = ctx.db.get_order_items(id).await?;
    Ok((order, items))
}

fn print_orders(orders: &[Order]) {
    if orders.is_empty() {
        println!("No orders");
        return;
    }

    println!("{:>6}  {:<16}  {:>10}  {:<8}  REFERENCE", "NO.", "TIME", "TOTAL", "PAYMENT");
    for order in orders {
        println!(
            "{:>6}  {:<16}  {:>10}  {:<8}  {}",
            order.id,
            order
                .ordered_at
                .with_timezone(&Local)
                .format(LOCAL_TIME_FORMAT),
            format!("{CURRENCY_SYMBOL}{}", order.total),
            order.payment_method,
            order.payment_reference.as_deref().unwrap_or("-")
        );
    }
}

fn print_items(items: &[OrderItem]) {
    for item in items {
        println!(
            "  {:<24} {:>4} x {CURRENCY_SYMBOL}{:<8} = {CURRENCY_SYMBOL}{}",
            item.model,
            item.quantity,
            item.unit_price,
            format_amount(item.subtotal())
        );
    }
}

fn print_stats(stats: &SalesStatistics) {
    println!(
        "Last {} days (to {}): {} orders, {CURRENCY_SYMBOL}{} in sales",
        stats.days,
        Utc::now().format("%Y-%m-%d"),
        stats.total_orders,
        stats.total_sales
    );

    if !stats.popular_products.is_empty() {
        println!("\nTop products:");
        for (rank, product) in stats.popular_products.iter().enumerate() {
            println!(
                "  {:>2}. {:<24} {:>5} sold  {CURRENCY_SYMBOL}{}",
                rank + 1,
                product.model,
                product.quantity,
                product.amount
            );
        }
    }

    if !stats.daily_sales.is_empty() {
        println!("\nBy day:");
        for day in &stats.daily_sales {
            println!(
                "  {}  {:>4} orders  {CURRENCY_SYMBOL}{}",
                day.date, day.order_count, day.total
            );
        }
    }
}
