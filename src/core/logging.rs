//! Logging initialization
//!
//! Combined console + file logger, plus startup diagnostics for the
//! download directory layout.

use anyhow::Result;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the resolved storage configuration at startup
pub fn log_storage_configuration() {
    log::info!("📁 Download folder: {}", config::download_dir().display());
    log::info!("📁 Work folder: {}", config::work_dir().display());
    log::info!(
        "🧹 Cleanup: every {}s, retention {}s",
        config::cleanup::SWEEP_INTERVAL_SECS,
        config::cleanup::FILE_RETENTION_SECS
    );
    log::info!(
        "⬇️ Concurrency: {} downloads, {} pending jobs max",
        config::queue::MAX_CONCURRENT_DOWNLOADS,
        config::queue::MAX_PENDING_JOBS
    );
}
