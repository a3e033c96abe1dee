//! Handlers behind each CLI subcommand.

pub mod orders;
pub mod products;
pub mod register;
pub mod settings;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::info;
use tokio::sync::mpsc;

use crate::{
    cli::Command,
    db::Database,
    scanner::{CodeWatcher, ScannedCode, WatcherConfig},
    settings::{SettingsStore, SETTINGS_FILE},
};

pub const DATABASE_FILE: &str = "shopfront.sqlite3";

pub struct AppContext {
    pub data_dir: PathBuf,
    pub db: Database,
    pub settings: SettingsStore,
}

impl AppContext {
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;

        Ok(Self {
            data_dir,
            db,
            settings,
        })
    }

    /// Scanner settings resolved against the data directory, with the folder created.
    pub fn watcher_config(&self) -> Result<WatcherConfig> {
        let config = self.settings.scanner().watcher_config(&self.data_dir);
        fs::create_dir_all(&config.watch_dir).with_context(|| {
            format!("Failed to create scan folder {}", config.watch_dir.display())
        })?;
        Ok(config)
    }
}

pub async fn dispatch(ctx: &AppContext, command: Command) -> Result<()> {
    match command {
        Command::Register => register::run(ctx).await,
        Command::Product(command) => products::run(ctx, command).await,
        Command::Order(command) => orders::run(ctx, command).await,
        Command::Settings(command) => settings::run(ctx, command),
    }
}

/// Block until one code is dropped into the scan folder, or Ctrl-C.
///
/// Uses a watcher of its own that is shut down before returning.
pub(crate) async fn wait_for_scan(config: WatcherConfig) -> Result<Option<ScannedCode>> {
    let watcher = CodeWatcher::new(config);
    let (tx, mut rx) = mpsc::unbounded_channel();
    if !watcher.start(tx) {
        anyhow::bail!("Could not start watching {}", watcher.watch_directory().display());
    }

    println!(
        "Waiting for a scan in {} (Ctrl-C to cancel)...",
        watcher.watch_directory().display()
    );

    let scanned = tokio::select! {
        scanned = rx.recv() => scanned,
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Scan cancelled");
            None
        }
    };

    watcher.shutdown().await;
    Ok(scanned)
}

/// Print `text`, or write it to `output` when given.
pub(crate) fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
