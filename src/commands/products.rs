use anyhow::{bail, Result};

use crate::{
    cli::{AddProductParams, ProductCommand, UpdateProductParams},
    db::{Product, ProductInput, ProductUpdate},
    money::CURRENCY_SYMBOL,
};

use super::{wait_for_scan, AppContext};

pub async fn run(ctx: &AppContext, command: ProductCommand) -> Result<()> {
    match command {
        ProductCommand::Add(params) => add(ctx, params).await,
        ProductCommand::Update(params) => update(ctx, params).await,
        ProductCommand::Delete { id } => {
            ctx.db.delete_product(id).await?;
            println!("Deleted product #{id}");
            Ok(())
        }
        ProductCommand::List => {
            print_products(&ctx.db.list_products().await?);
            Ok(())
        }
        ProductCommand::Search { keyword } => {
            print_products(&ctx.db.search_products(&keyword).await?);
            Ok(())
        }
        ProductCommand::LowStock { threshold } => {
            let threshold = threshold.unwrap_or_else(|| ctx.settings.low_stock_threshold());
            let products = ctx.db.get_low_stock_products(threshold).await?;
            if products.is_empty() {
                println!("No products at or below {threshold} in stock");
            } else {
                print_products(&products);
            }
            Ok(())
        }
    }
}

async fn add(ctx: &AppContext, params: AddProductParams) -> Result<()> {
    let barcode = match (params.barcode, params.scan) {
        (Some(barcode), _) => barcode,
        (None, true) => match wait_for_scan(ctx.watcher_config()?).await? {
            Some(scanned) => {
                println!("Scanned barcode {}", scanned.code);
                scanned.code
            }
            None => bail!("No barcode scanned; product not added"),
        },
        (None, false) => bail!("Pass --barcode or --scan"),
    };

    let product = ctx
        .db
        .insert_product(ProductInput {
            barcode,
            model: params.model,
            price: params.price,
            stock: params.stock,
        })
        .await?;

    println!("Added product #{}", product.id);
    print_products(std::slice::from_ref(&product));
    Ok(())
}

async fn update(ctx: &AppContext, params: UpdateProductParams) -> Result<()> {
    let update = ProductUpdate {
        barcode: params.barcode,
        model: params.model,
        price: params.price,
        stock: params.stock,
    };
    if update.is_empty() {
        bail!("Nothing to update; pass at least one of --barcode, --model, --price, --stock");
    }

    let product = ctx.db.update_product(params.id, update).await?;
    println!("Updated product #{}", product.id);
    print_products(std::slice::from_ref(&product));
    Ok(())
}

fn print_products(products: &[Product]) {
    if products.is_empty() {
        println!("No products");
        return;
    }

    println!("{:>5}  {:<16}  {:<24}  {:>10}  {:>6}", "ID", "BARCODE", "MODEL", "PRICE", "STOCK");
    for product in products {
        println!(
            "{:>5}  {:<16}  {:<24}  {:>10}  {:>6}",
            product.id,
            product.barcode,
            product.model,
            format!("{CURRENCY_SYMBOL}{}", product.price),
            product.stock
        );
    }
}
