use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::scanner::{config, WatcherConfig};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Printed at the top and bottom of every receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ShopProfile {
    pub shop_name: String,
    pub address: String,
    pub phone: String,
    pub footer_text: String,
}

impl Default for ShopProfile {
    fn default() -> Self {
        Self {
            shop_name: "Shopfront".into(),
            address: String::new(),
            phone: String::new(),
            footer_text: "Thank you for shopping with us!".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScannerSettings {
    /// Relative paths are resolved against the data directory.
    pub watch_dir: PathBuf,
    pub markers: Vec<String>,
    pub extension: String,
    pub poll_interval_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("scans"),
            markers: config::DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            extension: config::DEFAULT_EXTENSION.into(),
            poll_interval_ms: config::DEFAULT_POLL_INTERVAL_MS,
            settle_delay_ms: config::DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl ScannerSettings {
    pub fn watcher_config(&self, data_dir: &Path) -> WatcherConfig {
        WatcherConfig {
            watch_dir: data_dir.join(&self.watch_dir),
            markers: self.markers.clone(),
            extension: self.extension.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ShopSettings {
    shop: ShopProfile,
    scanner: ScannerSettings,
    low_stock_threshold: i64,
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            shop: ShopProfile::default(),
            scanner: ScannerSettings::default(),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ShopSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings in {}: {err}", path.display());
                ShopSettings::default()
            })
        } else {
            ShopSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shop_profile(&self) -> ShopProfile {
        self.read(|data| data.shop.clone())
    }

    pub fn scanner(&self) -> ScannerSettings {
        self.read(|data| data.scanner.clone())
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.read(|data| data.low_stock_threshold)
    }

    pub fn update_shop_profile(&self, profile: ShopProfile) -> Result<()> {
        self.update(|data| data.shop = profile)
    }

    pub fn update_scanner(&self, scanner: ScannerSettings) -> Result<()> {
        anyhow::ensure!(
            !scanner.extension.trim().is_empty(),
            "marker file extension must not be empty"
        );
        anyhow::ensure!(
            scanner.markers.iter().any(|m| !m.trim().is_empty()),
            "at least one marker is required"
        );
        self.update(|data| data.scanner = scanner)
    }

    pub fn update_low_stock_threshold(&self, threshold: i64) -> Result<()> {
        anyhow::ensure!(threshold >= 0, "low stock threshold must not be negative");
        self.update(|data| data.low_stock_threshold = threshold)
    }

    fn read<T>(&self, f: impl FnOnce(&ShopSettings) -> T) -> T {
        f(&self.data.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update(&self, f: impl FnOnce(&mut ShopSettings)) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &ShopSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join(SETTINGS_FILE)).unwrap();

        assert_eq!(store.low_stock_threshold(), DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(store.scanner(), ScannerSettings::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn updates_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update_shop_profile(ShopProfile {
                shop_name: "Corner Mart".into(),
                phone: "555-0100".into(),
                ..ShopProfile::default()
            })
            .unwrap();
        store.update_low_stock_threshold(2).unwrap();
        assert!(store.update_low_stock_threshold(-1).is_err());

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.shop_profile().shop_name, "Corner Mart");
        assert_eq!(reopened.low_stock_threshold(), 2);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.shop_profile(), ShopProfile::default());
        assert_eq!(store.scanner(), ScannerSettings::default());
    }

    #[test]
    fn scanner_settings_persist_and_reject_blank_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let store = SettingsStore::new(path.clone()).unwrap();

        let scanner = ScannerSettings {
            watch_dir: PathBuf::from("/srv/drop"),
            markers: vec!["code".into()],
            extension: ".scan".into(),
            ..ScannerSettings::default()
        };
        store.update_scanner(scanner.clone()).unwrap();
        assert!(store
            .update_scanner(ScannerSettings {
                extension: " ".into(),
                ..ScannerSettings::default()
            })
            .is_err());
        assert!(store
            .update_scanner(ScannerSettings {
                markers: vec![String::new()],
                ..ScannerSettings::default()
            })
            .is_err());

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.scanner(), scanner);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{ "scanner": { "watchDir": "/srv/drop" } }"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        let watcher = store.scanner().watcher_config(dir.path());
        assert_eq!(watcher.watch_dir, PathBuf::from("/srv/drop"));
        assert_eq!(watcher.extension, ".txt");
        assert_eq!(store.low_stock_threshold(), DEFAULT_LOW_STOCK_THRESHOLD);
    }
}
