//! Keeps two copies of the program from sharing one data directory.

use std::{
    fs::{self, OpenOptions},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

pub const LOCK_FILE: &str = "shopfront.lock";
/// How long to wait for a freshly created lock file to receive its pid.
const PID_WRITE_GRACE: Duration = Duration::from_millis(50);

/// Held for the lifetime of the process; the lock file is removed on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
}

impl InstanceLock {
    /// Fails when the lock file names a process that is still alive.
    ///
    /// The file is created exclusively, so two starts racing for a free data
    /// directory cannot both win. A lock left behind by a crashed run is taken over.
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(LOCK_FILE);
        let own_pid = std::process::id();

        match create_lock_file(&path, own_pid) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let holder = read_holder(&path).or_else(|| {
                    thread::sleep(PID_WRITE_GRACE);
                    read_holder(&path)
                });
                if let Some(holder) = holder {
                    if holder != own_pid && process_alive(holder) {
                        bail!(
                            "another shopfront instance (pid {holder}) is already using {}",
                            data_dir.display()
                        );
                    }
                }
                warn!("Taking over stale lock {} (holder {holder:?})", path.display());

                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("Failed to remove stale lock file {}", path.display())
                        })
                    }
                }
                create_lock_file(&path, own_pid)
                    .with_context(|| format!("Failed to take over lock file {}", path.display()))?;
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to create lock file {}", path.display()))
            }
        }
        info!("Acquired instance lock {}", path.display());

        Ok(Self { path, pid: own_pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if read_holder(&self.path) != Some(self.pid) {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {err}", self.path.display());
        }
    }
}

/// Fails with `AlreadyExists` when someone else got there first.
fn create_lock_file(path: &Path, pid: u32) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    write!(file, "{pid}")
}

fn read_holder(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), ProcessRefreshKind::new());
    system.process(pid).is_some()
}
