//! Plain-text receipts sized for a 58mm thermal roll.

use std::fmt::Write;

use chrono::{DateTime, Local};

use crate::{
    db::{Order, OrderItem},
    money::{format_amount, CURRENCY_SYMBOL},
    settings::ShopProfile,
};

const RULE: &str = "--------------------------------";
const MAX_NAME_CHARS: usize = 16;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Blank lines left at the end for tearing off the paper.
const FEED_LINES: &str = "\n\n\n";

fn short_name(name: &str) -> String {
    if name.chars().count() > MAX_NAME_CHARS {
        let head: String = name.chars().take(MAX_NAME_CHARS - 1).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

/// Keeps the last four characters of a payment code or card number.
pub fn mask_reference(reference: &str) -> String {
    let chars: Vec<char> = reference.trim().chars().collect();
    let visible = chars.len().min(4);
    let hidden = chars.len() - visible;
    "*".repeat(hidden) + &chars[hidden..].iter().collect::<String>()
}

pub fn render_receipt(
    shop: &ShopProfile,
    order: &Order,
    items: &[OrderItem],
    printed_at: DateTime<Local>,
) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}", shop.shop_name);
    let _ = writeln!(out, "{RULE}");
    if !shop.address.is_empty() {
        let _ = writeln!(out, "Address: {}", shop.address);
    }
    if !shop.phone.is_empty() {
        let _ = writeln!(out, "Phone: {}", shop.phone);
    }
    let _ = writeln!(out, "{RULE}");

    let _ = writeln!(out, "Order No: {}", order.id);
    let _ = writeln!(out, "Time: {}", printed_at.format(TIME_FORMAT));
    let _ = writeln!(out, "{RULE}");

    let _ = writeln!(out, "Items:");
    for item in items {
        let _ = writeln!(out, "{}", short_name(&item.model));
        let _ = writeln!(
            out,
            "  Qty: {} x {CURRENCY_SYMBOL}{}",
            item.quantity, item.unit_price
        );
        let _ = writeln!(
            out,
            "  Subtotal: {CURRENCY_SYMBOL}{}",
            format_amount(item.subtotal())
        );
    }
    let _ = writeln!(out, "{RULE}");

    let _ = writeln!(out, "Total: {CURRENCY_SYMBOL}{}", order.total);
    let _ = writeln!(out, "Payment: {}", order.payment_method);
    if let Some(reference) = order.payment_reference.as_deref() {
        let _ = writeln!(out, "Reference: {}", mask_reference(reference));
    }
    let _ = writeln!(out, "{RULE}");

    if !shop.footer_text.is_empty() {
        let _ = writeln!(out, "{}", shop.footer_text);
    }
    out.push_str(FEED_LINES);
    out
}

/// A short page for checking that receipts reach the printer or file.
pub fn render_test_page(shop: &ShopProfile, printed_at: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Printer test");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Shop: {}", shop.shop_name);
    let _ = writeln!(out, "Printed: {}", printed_at.format(TIME_FORMAT));
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Printer is working");
    let _ = writeln!(out, "{RULE}");
    out.push_str(FEED_LINES);
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        db::{OrderId, PaymentMethod},
        money::Money,
    };

    fn printed_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).single().unwrap()
    }

    fn order(payment_method: PaymentMethod, payment_reference: Option<&str>) -> Order {
        Order {
            id: OrderId(42),
            ticket_id: "t-1".into(),
            ordered_at: Utc::now(),
            total: Money::from_cents(2050),
            payment_method,
            payment_reference: payment_reference.map(str::to_string),
        }
    }

    fn items() -> Vec<OrderItem> {
        vec![
            OrderItem {
                product_id: Some(1),
                model: "Cola 330ml".into(),
                quantity: 3,
                unit_price: Money::from_cents(350),
            },
            OrderItem {
                product_id: None,
                model: "Extra crunchy sea salt potato chips".into(),
                quantity: 1,
                unit_price: Money::from_cents(1000),
            },
        ]
    }

    #[test]
    fn receipt_has_padded_number_lines_and_total() {
        let text = render_receipt(
            &ShopProfile::default(),
            &order(PaymentMethod::Cash, None),
            &items(),
            printed_at(),
        );

        assert!(text.starts_with("Shopfront\n"));
        assert!(text.contains("Order No: 00042\n"));
        assert!(text.contains("Time: 2024-03-09 14:05:00\n"));
        assert!(text.contains("  Qty: 3 x ¥3.50\n  Subtotal: ¥10.50\n"));
        assert!(text.contains("\nExtra crunchy s...\n"));
        assert!(text.contains("Total: ¥20.50\n"));
        assert!(text.contains("Payment: 现金\n"));
        assert!(!text.contains("Reference:"));
        assert!(text.ends_with("\n\n\n\n"));
    }

    #[test]
    fn names_are_cut_by_characters_not_bytes() {
        assert_eq!(short_name("可口可乐零度无糖汽水三百三十毫升罐装"), "可口可乐零度无糖汽水三百三十毫...");
        assert_eq!(short_name("十六个字的商品名称正好十六个字整"), "十六个字的商品名称正好十六个字整");
    }

    #[test]
    fn reference_is_masked() {
        let text = render_receipt(
            &ShopProfile::default(),
            &order(PaymentMethod::WeChatPay, Some("134567890123")),
            &[],
            printed_at(),
        );
        assert!(text.contains("Reference: ********0123\n"));
        assert_eq!(mask_reference("12"), "12");
    }

    #[test]
    fn test_page_names_the_shop() {
        let shop = ShopProfile {
            shop_name: "Corner Mart".into(),
            ..ShopProfile::default()
        };
        let text = render_test_page(&shop, printed_at());
        assert!(text.contains("Shop: Corner Mart\n"));
        assert!(text.contains("Printed: 2024-03-09 14:05:00\n"));
    }
}
