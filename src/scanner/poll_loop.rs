use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result};
use chrono::Utc;

use super::{
    config::WatcherConfig,
    decode::decode_marker_content,
    watcher::{PollRun, ScannedCode},
};

// Set to false to silence per-file logging from the watcher
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

struct Candidate {
    file_name: String,
    path: PathBuf,
    modified: SystemTime,
}

pub(super) async fn poll_loop(config: Arc<WatcherConfig>, run: Arc<PollRun>) {
    log_info!("poll loop started on {}", config.watch_dir.display());

    while !run.token.is_cancelled() {
        match list_candidates(&config, &run).await {
            Ok(candidates) => {
                for candidate in candidates {
                    if run.token.is_cancelled() {
                        break;
                    }
                    process_marker(&config, &run, candidate).await;
                }
            }
            Err(err) => log_warn!("failed to list {}: {err:#}", config.watch_dir.display()),
        }

        if !pause(&run, config.poll_interval).await {
            break;
        }
    }

    log_info!("poll loop on {} finished", config.watch_dir.display());
}

/// Sleeps for `duration`; returns false if the run was stopped meanwhile.
async fn pause(run: &PollRun, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = run.token.cancelled() => false,
    }
}

/// Unseen marker files, oldest modification time first.
async fn list_candidates(config: &WatcherConfig, run: &PollRun) -> Result<Vec<Candidate>> {
    let mut entries = tokio::fs::read_dir(&config.watch_dir)
        .await
        .context("read_dir failed")?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await.context("next_entry failed")? {
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if run.has_seen(&file_name) || !config.is_marker_file(&file_name) {
            continue;
        }

        match entry.metadata().await {
            Ok(meta) if meta.is_file() => {
                candidates.push(Candidate {
                    modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    path: entry.path(),
                    file_name,
                });
            }
            Ok(_) => {}
            Err(err) => log_debug!("skipping {file_name} this pass: {err}"),
        }
    }

    candidates.sort_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    Ok(candidates)
}

async fn process_marker(config: &WatcherConfig, run: &PollRun, candidate: Candidate) {
    let Candidate { file_name, path, .. } = candidate;

    if !pause(run, config.settle_delay).await {
        return;
    }

    // Marked before anything else so a file that cannot be read is never retried.
    run.mark_seen(&file_name);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log_debug!("{file_name} disappeared before it could be read");
            return;
        }
        Err(err) => {
            log_warn!("failed to read {file_name}: {err}");
            return;
        }
    };

    match decode_marker_content(&bytes) {
        Some(code) => {
            log_info!("read code {code} from {file_name}");
            let scanned = ScannedCode {
                code,
                file_name: file_name.clone(),
                read_at: Utc::now(),
            };
            if !run.deliver(scanned) {
                log_debug!("dropped code from {file_name}: watcher stopped; leaving the file");
                return;
            }
        }
        None => log_warn!("{file_name} is empty or not valid UTF-8/GBK text; discarding"),
    }

    match tokio::fs::remove_file(&path).await {
        Ok(()) => log_debug!("deleted {file_name}"),
        Err(err) => log_warn!("failed to delete {file_name}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use super::*;

    fn candidate(config: &WatcherConfig, name: &str) -> Candidate {
        Candidate {
            file_name: name.into(),
            path: config.watch_dir.join(name),
            modified: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn file_is_kept_when_delivery_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut config = WatcherConfig::new(dir.path());
        config.settle_delay = Duration::from_millis(1);
        std::fs::write(dir.path().join("barcode_kept.txt"), "6901").unwrap();

        // A consumer that went away between the settle pause and delivery.
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let run = PollRun::new(tx, Arc::new(Mutex::new(None)));

        process_marker(&config, &run, candidate(&config, "barcode_kept.txt")).await;

        assert!(run.token.is_cancelled());
        assert!(dir.path().join("barcode_kept.txt").exists());
    }

    #[tokio::test]
    async fn delivered_file_is_deleted() {
        let dir = TempDir::new().unwrap();
        let mut config = WatcherConfig::new(dir.path());
        config.settle_delay = Duration::from_millis(1);
        std::fs::write(dir.path().join("barcode_sent.txt"), "6902").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = PollRun::new(tx, Arc::new(Mutex::new(None)));

        process_marker(&config, &run, candidate(&config, "barcode_sent.txt")).await;

        assert_eq!(rx.try_recv().unwrap().code, "6902");
        assert!(!dir.path().join("barcode_sent.txt").exists());
    }
}
