use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{format_datetime, map_product_conflict, parse_datetime},
        models::{Product, ProductInput, ProductUpdate},
    },
    error::PosError,
    money::Money,
};

const PRODUCT_COLUMNS: &str = "id, barcode, model, price_cents, stock, created_at, updated_at";

fn row_to_product(row: &Row) -> Result<Product> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Product {
        id: row.get("id")?,
        barcode: row.get("barcode")?,
        model: row.get("model")?,
        price: Money::from_cents(row.get("price_cents")?),
        stock: row.get("stock")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn query_products(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Product>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut products = Vec::new();
    while let Some(row) = rows.next()? {
        products.push(row_to_product(row)?);
    }
    Ok(products)
}

fn select_product_by_barcode(conn: &Connection, barcode: &str) -> Result<Option<Product>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ?1"
    ))?;
    let mut rows = stmt.query(params![barcode])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_product(row)?)),
        None => Ok(None),
    }
}

fn select_product(conn: &Connection, product_id: i64) -> Result<Option<Product>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![product_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_product(row)?)),
        None => Ok(None),
    }
}

impl Database {
    /// Add a product to the catalog. Barcode and model must both be unique.
    pub async fn insert_product(&self, input: ProductInput) -> Result<Product> {
        input.validate()?;
        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            conn.execute(
                "INSERT INTO products (barcode, model, price_cents, stock, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    input.barcode.trim(),
                    input.model.trim(),
                    input.price.cents(),
                    input.stock,
                    now,
                ],
            )
            .map_err(map_product_conflict)?;

            let product_id = conn.last_insert_rowid();
            select_product(conn, product_id)?
                .ok_or_else(|| anyhow!("Product not found after insert"))
        })
        .await
    }

    pub async fn update_product(&self, product_id: i64, update: ProductUpdate) -> Result<Product> {
        update.validate()?;
        if update.is_empty() {
            return Err(PosError::invalid("no fields to update").into());
        }

        self.execute(move |conn| {
            // Model clashes are checked up front so the message names the model
            // rather than whatever constraint SQLite reports first.
            if let Some(model) = update.model.as_deref() {
                let taken: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM products WHERE model = ?1 AND id != ?2",
                        params![model.trim(), product_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if taken.is_some() {
                    return Err(PosError::AlreadyExists(
                        "a product with this model already exists".into(),
                    )
                    .into());
                }
            }

            let mut updates = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(barcode) = update.barcode {
                updates.push("barcode = ?");
                params_vec.push(Box::new(barcode.trim().to_string()));
            }
            if let Some(model) = update.model {
                updates.push("model = ?");
                params_vec.push(Box::new(model.trim().to_string()));
            }
            if let Some(price) = update.price {
                updates.push("price_cents = ?");
                params_vec.push(Box::new(price.cents()));
            }
            if let Some(stock) = update.stock {
                updates.push("stock = ?");
                params_vec.push(Box::new(stock));
            }

            updates.push("updated_at = ?");
            params_vec.push(Box::new(format_datetime(&Utc::now())));
            params_vec.push(Box::new(product_id));

            let query = format!("UPDATE products SET {} WHERE id = ?", updates.join(", "));
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let rows_affected = conn
                .execute(&query, params_refs.as_slice())
                .map_err(map_product_conflict)?;
            if rows_affected == 0 {
                return Err(PosError::NotFound(format!("product #{product_id}")).into());
            }

            select_product(conn, product_id)?
                .ok_or_else(|| anyhow!("Product not found after update"))
        })
        .await
    }

    /// Remove a product. Past order lines keep their model name and price.
    pub async fn delete_product(&self, product_id: i64) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM products WHERE id = ?1", params![product_id])?;
            if rows_affected == 0 {
                return Err(PosError::NotFound(format!("product #{product_id}")).into());
            }
            Ok(())
        })
        .await
    }

    pub async fn get_product(&self, product_id: i64) -> Result<Option<Product>> {
        self.execute(move |conn| select_product(conn, product_id)).await
    }

    pub async fn get_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let barcode = barcode.trim().to_string();
        self.execute(move |conn| select_product_by_barcode(conn, &barcode))
            .await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.execute(|conn| {
            query_products(
                conn,
                &format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id ASC"),
                &[],
            )
        })
        .await
    }

    /// Substring match on barcode or model.
    pub async fn search_products(&self, keyword: &str) -> Result<Vec<Product>> {
        let pattern = format!("%{}%", keyword.trim());
        self.execute(move |conn| {
            query_products(
                conn,
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products
                     WHERE barcode LIKE ?1 OR model LIKE ?1
                     ORDER BY id ASC"
                ),
                &[&pattern],
            )
        })
        .await
    }

    /// Products whose stock is at or below `threshold`, lowest stock first.
    pub async fn get_low_stock_products(&self, threshold: i64) -> Result<Vec<Product>> {
        self.execute(move |conn| {
            query_products(
                conn,
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products
                     WHERE stock <= ?1
                     ORDER BY stock ASC, id ASC"
                ),
                &[&threshold],
            )
        })
        .await
    }
}
