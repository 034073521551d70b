//! Core utilities: configuration, errors, logging, metrics and formatting helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod utils;

pub use error::{AppError, AppResult};
pub use utils::{escape_markdown, extract_retry_after, format_file_size};
