use std::{
    collections::HashSet,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::{config::WatcherConfig, poll_loop::poll_loop};

/// A code read from a marker file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedCode {
    pub code: String,
    pub file_name: String,
    pub read_at: DateTime<Utc>,
}

pub type CodeSink = mpsc::UnboundedSender<ScannedCode>;

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State belonging to one `start()`..`stop()` interval.
///
/// A fresh run gets its own seen-name set and its own sink slot, so a poll task
/// still finishing a pass from an earlier run can never deliver into a later one.
pub(super) struct PollRun {
    pub(super) token: CancellationToken,
    sink: Mutex<Option<CodeSink>>,
    seen: Mutex<HashSet<String>>,
    last_code: Arc<Mutex<Option<ScannedCode>>>,
}

impl PollRun {
    pub(super) fn new(sink: CodeSink, last_code: Arc<Mutex<Option<ScannedCode>>>) -> Self {
        Self {
            token: CancellationToken::new(),
            sink: Mutex::new(Some(sink)),
            seen: Mutex::new(HashSet::new()),
            last_code,
        }
    }

    pub(super) fn has_seen(&self, file_name: &str) -> bool {
        lock(&self.seen).contains(file_name)
    }

    pub(super) fn mark_seen(&self, file_name: &str) {
        lock(&self.seen).insert(file_name.to_string());
    }

    /// Hands `code` to the consumer unless the run was stopped first.
    ///
    /// Delivery and `stop()` contend for the same lock, so once `stop()` has
    /// returned no further code gets through.
    pub(super) fn deliver(&self, code: ScannedCode) -> bool {
        let guard = lock(&self.sink);
        let Some(sink) = guard.as_ref() else {
            return false;
        };

        *lock(&self.last_code) = Some(code.clone());
        if sink.send(code).is_err() {
            warn!("Code consumer went away; stopping watcher");
            self.token.cancel();
            return false;
        }
        true
    }

    fn stop(&self) {
        self.token.cancel();
        lock(&self.sink).take();
    }
}

struct ActiveRun {
    run: Arc<PollRun>,
    handle: JoinHandle<()>,
}

/// Watches a directory for marker files and streams their codes to one consumer.
///
/// Each consumer owns its own watcher. Codes travel over a channel so the
/// consumer decides when to act on them; nothing is called back on the poll task.
pub struct CodeWatcher {
    config: Arc<WatcherConfig>,
    current: Mutex<Option<ActiveRun>>,
    last_code: Arc<Mutex<Option<ScannedCode>>>,
}

impl CodeWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config: Arc::new(config),
            current: Mutex::new(None),
            last_code: Arc::new(Mutex::new(None)),
        }
    }

    pub fn watch_directory(&self) -> &Path {
        &self.config.watch_dir
    }

    /// Start polling and deliver codes into `sink`.
    ///
    /// Returns `false`, changing nothing, when already running or when called
    /// outside a Tokio runtime.
    pub fn start(&self, sink: CodeSink) -> bool {
        let mut current = lock(&self.current);
        if current
            .as_ref()
            .is_some_and(|active| !active.run.token.is_cancelled())
        {
            warn!(
                "Watcher for {} is already running",
                self.config.watch_dir.display()
            );
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!("Cannot start watcher outside a Tokio runtime: {err}");
                return false;
            }
        };

        let run = Arc::new(PollRun::new(sink, Arc::clone(&self.last_code)));
        let handle = runtime.spawn(poll_loop(Arc::clone(&self.config), Arc::clone(&run)));

        info!("Watching {} for scanned codes", self.config.watch_dir.display());
        *current = Some(ActiveRun { run, handle });
        true
    }

    /// Signal the poll task to finish and detach the consumer. Idempotent.
    ///
    /// The task is not aborted; it notices the signal and exits on its own.
    pub fn stop(&self) {
        if let Some(active) = lock(&self.current).as_ref() {
            if !active.run.token.is_cancelled() {
                info!("Stopping watcher for {}", self.config.watch_dir.display());
            }
            active.run.stop();
        }
    }

    /// [`stop`](Self::stop), then wait for the poll task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let active = lock(&self.current).take();
        if let Some(active) = active {
            if let Err(err) = active.handle.await {
                warn!("Watcher poll task ended abnormally: {err}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.current)
            .as_ref()
            .is_some_and(|active| !active.run.token.is_cancelled())
    }

    /// Most recently delivered code; survives `stop()`.
    pub fn last_code(&self) -> Option<ScannedCode> {
        lock(&self.last_code).clone()
    }
}

impl Drop for CodeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{self, File},
        path::Path,
        time::{Duration, SystemTime},
    };

    use tempfile::TempDir;
    use tokio::{sync::mpsc, time::timeout};

    use super::*;

    fn fast_config(dir: &Path) -> WatcherConfig {
        let mut config = WatcherConfig::new(dir);
        config.poll_interval = Duration::from_millis(20);
        config.settle_delay = Duration::from_millis(5);
        config
    }

    fn write_marker(dir: &Path, name: &str, content: &[u8], age_secs: u64) {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    async fn next_code(rx: &mut mpsc::UnboundedReceiver<ScannedCode>) -> ScannedCode {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a code")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn delivers_oldest_first_and_deletes_files() {
        let dir = TempDir::new().unwrap();
        write_marker(dir.path(), "barcode_b.txt", b"222", 10);
        write_marker(dir.path(), "barcode_a.txt", b"111", 30);
        write_marker(dir.path(), "商品_c.txt", "  333\r\n".as_bytes(), 20);
        write_marker(dir.path(), "notes.txt", b"ignored", 40);

        let watcher = CodeWatcher::new(fast_config(dir.path()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(watcher.start(tx));

        let codes = [
            next_code(&mut rx).await.code,
            next_code(&mut rx).await.code,
            next_code(&mut rx).await.code,
        ];
        assert_eq!(codes, ["111", "333", "222"]);
        assert_eq!(watcher.last_code().unwrap().code, "222");

        watcher.shutdown().await;
        assert!(!dir.path().join("barcode_a.txt").exists());
        assert!(!dir.path().join("barcode_b.txt").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn second_start_is_refused_while_running() {
        let dir = TempDir::new().unwrap();
        let watcher = CodeWatcher::new(fast_config(dir.path()));

        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(watcher.start(tx1));
        assert!(!watcher.start(tx2));
        assert!(watcher.is_running());

        watcher.stop();
        watcher.stop();
        assert!(!watcher.is_running());
        watcher.shutdown().await;
    }

    #[test]
    fn start_outside_runtime_returns_false() {
        let dir = TempDir::new().unwrap();
        let watcher = CodeWatcher::new(fast_config(dir.path()));
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(!watcher.start(tx));
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn nothing_arrives_after_stop_and_restart_picks_file_up() {
        let dir = TempDir::new().unwrap();
        let watcher = CodeWatcher::new(fast_config(dir.path()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(watcher.start(tx));
        watcher.shutdown().await;

        write_marker(dir.path(), "barcode_late.txt", b"999", 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert!(dir.path().join("barcode_late.txt").exists());

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(watcher.start(tx));
        assert_eq!(next_code(&mut rx).await.code, "999");
        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn reused_file_name_is_read_again_after_restart() {
        let dir = TempDir::new().unwrap();
        write_marker(dir.path(), "barcode_x.txt", b"first", 0);

        let watcher = CodeWatcher::new(fast_config(dir.path()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(watcher.start(tx));
        assert_eq!(next_code(&mut rx).await.code, "first");
        watcher.shutdown().await;
        assert!(!dir.path().join("barcode_x.txt").exists());

        write_marker(dir.path(), "barcode_x.txt", b"second", 0);
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(watcher.start(tx));
        assert_eq!(next_code(&mut rx).await.code, "second");
        assert_eq!(watcher.last_code().unwrap().code, "second");
        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn undecodable_file_is_discarded_without_delivery() {
        let dir = TempDir::new().unwrap();
        write_marker(dir.path(), "barcode_bad.txt", b"\xff\xff\xff", 20);
        write_marker(dir.path(), "barcode_empty.txt", b"  \n", 15);
        write_marker(dir.path(), "barcode_good.txt", b"6901", 10);

        let watcher = CodeWatcher::new(fast_config(dir.path()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(watcher.start(tx));

        assert_eq!(next_code(&mut rx).await.code, "6901");
        watcher.shutdown().await;

        assert!(rx.try_recv().is_err());
        assert!(!dir.path().join("barcode_bad.txt").exists());
        assert!(!dir.path().join("barcode_empty.txt").exists());
    }
}
