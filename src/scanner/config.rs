use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MARKERS: [&str; 3] = ["商品", "条形码", "barcode"];
pub const DEFAULT_EXTENSION: &str = ".txt";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;

/// Where and how a [`CodeWatcher`](super::CodeWatcher) looks for marker files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatcherConfig {
    pub watch_dir: PathBuf,
    /// A file qualifies when its name contains any of these.
    pub markers: Vec<String>,
    /// ... and ends with exactly this extension; case matters.
    pub extension: String,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Pause before reading a candidate so the writer can finish.
    #[serde(with = "millis")]
    pub settle_delay: Duration,
}

impl WatcherConfig {
    pub fn new(watch_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            extension: DEFAULT_EXTENSION.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }

    pub fn is_marker_file(&self, file_name: &str) -> bool {
        file_name.ends_with(self.extension.as_str())
            && self.markers.iter().any(|m| file_name.contains(m.as_str()))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_needs_keyword_and_extension() {
        let config = WatcherConfig::new("/tmp");

        assert!(config.is_marker_file("barcode_001.txt"));
        assert!(config.is_marker_file("商品条码.txt"));
        assert!(config.is_marker_file("扫描条形码结果.txt"));

        assert!(!config.is_marker_file("barcode_001.png"));
        assert!(!config.is_marker_file("notes.txt"));
        assert!(!config.is_marker_file("txt"));
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        let config = WatcherConfig::new("/tmp");
        assert!(!config.is_marker_file("商品条码.TXT"));
        assert!(!config.is_marker_file("barcode_001.Txt"));
    }

    #[test]
    fn custom_markers_replace_defaults() {
        let mut config = WatcherConfig::new("/tmp");
        config.markers = vec!["scan".into()];
        config.extension = ".code".into();

        assert!(config.is_marker_file("scan-7.code"));
        assert!(!config.is_marker_file("barcode.txt"));
    }
}
