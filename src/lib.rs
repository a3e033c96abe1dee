pub mod cli;
pub mod commands;
pub mod db;
pub mod error;
pub mod gateway;
pub mod instance_lock;
pub mod money;
pub mod receipt;
pub mod register;
pub mod scanner;
pub mod settings;
mod utils;

use anyhow::Result;
use clap::Parser;

use cli::{Arguments, Command, ProductCommand};
use commands::AppContext;
use instance_lock::InstanceLock;

pub use error::PosError;
pub use money::Money;

pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Arguments::parse();
    let command = args.command.unwrap_or(Command::Register);

    log::info!("Shopfront starting with data in {}", args.data_dir.display());

    let ctx = AppContext::open(args.data_dir)?;

    // Anything that polls the scan folder or rings up sales must run alone.
    let _lock = match &command {
        Command::Register => Some(InstanceLock::acquire(&ctx.data_dir)?),
        Command::Product(ProductCommand::Add(params)) if params.scan => {
            Some(InstanceLock::acquire(&ctx.data_dir)?)
        }
        _ => None,
    };

    commands::dispatch(&ctx, command).await
}
