//! rolika — Telegram bot for downloading YouTube video and audio
//!
//! This library provides the core functionality of the bot: the bounded
//! download job supervisor, progress throttling, periodic file cleanup and
//! the Telegram integration around them.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, metrics and formatting helpers
//! - `download`: Job supervision, the extractor seam and delivery routing
//! - `storage`: Periodic cleanup of the download directories
//! - `telegram`: Bot setup, handlers and the messenger seam

pub mod core;
pub mod download;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use crate::download::{DownloadSupervisor, JobKey, JobRequest, SupervisorConfig};
pub use crate::storage::{CleanupSweeper, SweeperConfig};
