//! Folder-polling barcode scanner.
//!
//! A scanner app (or a person) drops a small text file into the watch directory;
//! its trimmed content is the scanned code. Each file is delivered at most once
//! and deleted afterwards.

pub mod config;
pub mod decode;
mod poll_loop;
pub mod watcher;

pub use config::WatcherConfig;
pub use watcher::{CodeSink, CodeWatcher, ScannedCode};
