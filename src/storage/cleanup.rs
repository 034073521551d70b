//! Periodic cleanup of stale downloaded files.
//!
//! A background loop scans the download and work directories on a fixed
//! period and deletes every file whose modification time is older than the
//! retention threshold. The sweeper knows nothing about in-flight jobs — it
//! only reads mtimes — so the retention default is kept far above the worst
//! observed job duration.

use crate::core::config;
use crate::core::metrics;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Injected sweeper configuration
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Directories to scan each cycle
    pub dirs: Vec<PathBuf>,
    /// Files older than this are deleted
    pub retention: Duration,
    /// Interval between sweeps
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            dirs: vec![config::download_dir(), config::work_dir()],
            retention: config::cleanup::retention(),
            interval: config::cleanup::sweep_interval(),
        }
    }
}

/// Background file sweeper. Constructed once at startup and spawned onto
/// the runtime; stoppable through [`CleanupSweeper::stop`].
pub struct CleanupSweeper {
    cfg: SweeperConfig,
    stop: AtomicBool,
}

impl CleanupSweeper {
    /// Creates a sweeper with the given configuration.
    pub fn new(cfg: SweeperConfig) -> Self {
        Self {
            cfg,
            stop: AtomicBool::new(false),
        }
    }

    /// Runs one sweep over all configured directories.
    ///
    /// Returns the number of files deleted. Unreadable entries and failed
    /// deletions are logged and skipped; a missing or empty directory is a
    /// no-op. Re-running with no eligible files deletes nothing.
    pub fn sweep_once(&self) -> usize {
        let now = SystemTime::now();
        let mut deleted = 0;

        for dir in &self.cfg.dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    log::debug!("Sweep skipping {}: {}", dir.display(), e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }

                let modified = match entry.metadata().and_then(|m| m.modified()) {
                    Ok(modified) => modified,
                    Err(e) => {
                        log::warn!("Sweep could not stat {}: {}", path.display(), e);
                        continue;
                    }
                };

                // Files with a future mtime yield Err here and are left alone
                let age = match now.duration_since(modified) {
                    Ok(age) => age,
                    Err(_) => continue,
                };

                if age > self.cfg.retention {
                    match std::fs::remove_file(&path) {
                        Ok(()) => {
                            log::info!("Swept stale file {} (age {}s)", path.display(), age.as_secs());
                            deleted += 1;
                        }
                        Err(e) => {
                            log::warn!("Failed to sweep {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }

        if deleted > 0 {
            metrics::record_swept_files(deleted);
        }
        deleted
    }

    /// Spawns the sweep loop onto the runtime. The first sweep runs after
    /// one full interval. Returns the task handle.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.stop.store(false, Ordering::SeqCst);

        tokio::spawn(async move {
            log::info!(
                "🧹 Cleanup sweeper started (interval {}s, retention {}s)",
                self.cfg.interval.as_secs(),
                self.cfg.retention.as_secs()
            );

            loop {
                tokio::time::sleep(self.cfg.interval).await;

                if self.stop.load(Ordering::SeqCst) {
                    log::info!("Cleanup sweeper stopped");
                    break;
                }

                let deleted = self.sweep_once();
                log::debug!("Sweep finished, {} file(s) removed", deleted);
            }
        })
    }

    /// Requests the sweep loop to exit after its current cycle.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        log::info!("Cleanup sweeper stop requested");
    }
}
