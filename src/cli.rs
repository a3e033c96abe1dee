use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{db::OrderId, money::Money};

pub const DEFAULT_DATA_DIR: &str = "shopfront-data";

#[derive(Parser, Debug)]
#[command(version, about = "Single-shop point of sale")]
pub struct Arguments {
    /// Where the database, settings and default scan folder live
    #[arg(short, long, env = "SHOPFRONT_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,
    // None runs the interactive register
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ring up sales from typed or scanned codes
    #[clap(name = "register")]
    Register,
    #[clap(name = "product", subcommand, about = "Manage the product catalog")]
    Product(ProductCommand),
    #[clap(name = "order", subcommand, about = "Browse order history and reprint receipts")]
    Order(OrderCommand),
    #[clap(name = "settings", subcommand, about = "Shop profile, scanner, stock threshold and printer test")]
    Settings(SettingsCommand),
}

#[derive(Debug, Subcommand)]
pub enum ProductCommand {
    #[clap(name = "add")]
    Add(AddProductParams),
    #[clap(name = "update")]
    Update(UpdateProductParams),
    #[clap(name = "delete")]
    Delete {
        id: i64,
    },
    #[clap(name = "list")]
    List,
    /// Substring match on barcode or model
    #[clap(name = "search")]
    Search {
        keyword: String,
    },
    #[clap(name = "low-stock")]
    LowStock {
        /// Overrides the threshold from settings
        #[arg(short, long)]
        threshold: Option<i64>,
    },
}

#[derive(Debug, Args)]
pub struct AddProductParams {
    /// Omit together with --scan to take the barcode from the scan folder
    #[arg(short, long)]
    pub barcode: Option<String>,
    #[arg(short, long)]
    pub model: String,
    /// e.g. 3.50
    #[arg(short, long)]
    pub price: Money,
    #[arg(short, long, default_value = "0")]
    pub stock: i64,
    /// Wait for a barcode dropped into the scan folder
    #[arg(long)]
    pub scan: bool,
}

#[derive(Debug, Args)]
pub struct UpdateProductParams {
    pub id: i64,
    #[arg(short, long)]
    pub barcode: Option<String>,
    #[arg(short, long)]
    pub model: Option<String>,
    #[arg(short, long)]
    pub price: Option<Money>,
    #[arg(short, long)]
    pub stock: Option<i64>,
}

#[derive(Debug, Subcommand)]
pub enum OrderCommand {
    #[clap(name = "list")]
    List {
        /// Show at most this many orders, newest first
        #[arg(short, long)]
        limit: Option<usize>,
    },
    #[clap(name = "show")]
    Show {
        id: OrderId,
    },
    #[clap(name = "receipt")]
    Receipt {
        id: OrderId,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    #[clap(name = "stats")]
    Stats {
        #[arg(short, long, default_value = "30")]
        days: u32,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    #[clap(name = "show")]
    Show,
    /// Update the shop profile printed on receipts
    #[clap(name = "shop")]
    Shop(ShopParams),
    /// Change where and how scanned codes are picked up
    #[clap(name = "scanner")]
    Scanner(ScannerParams),
    #[clap(name = "threshold")]
    Threshold {
        value: i64,
    },
    #[clap(name = "test-page")]
    TestPage {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct ShopParams {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub footer: Option<String>,
}

#[derive(Debug, Args)]
pub struct ScannerParams {
    /// Scan folder; relative paths are resolved against the data directory
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Comma-separated keywords, one of which a marker file name must contain
    #[arg(long, value_delimiter = ',')]
    pub markers: Option<Vec<String>>,
    /// Marker file suffix, e.g. .txt
    #[arg(long)]
    pub extension: Option<String>,
    #[arg(long)]
    pub poll_ms: Option<u64>,
    #[arg(long)]
    pub settle_ms: Option<u64>,
}
