use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration constants for the bot

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Download folder path
/// Read from DOWNLOAD_FOLDER environment variable
/// Supports tilde (~) expansion for home directory
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "~/downloads/rolika".to_string()));

/// Resolved download directory with tilde expansion applied
pub fn download_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde(&*DOWNLOAD_FOLDER).into_owned())
}

/// Working directory for yt-dlp temporary files (.part, fragments).
/// Swept together with the download directory.
pub fn work_dir() -> PathBuf {
    download_dir().join("tmp")
}

/// Job admission configuration
pub mod queue {
    /// Maximum number of concurrent downloads
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 3;

    /// Maximum number of tracked jobs (downloading + waiting for a slot).
    /// Submissions beyond this are rejected with a "too busy" error instead
    /// of queueing without bound.
    pub const MAX_PENDING_JOBS: usize = 24;
}

/// Progress reporting configuration
pub mod progress {
    use super::Duration;

    /// Minimum interval between progress message edits for one job (in seconds)
    pub const EDIT_INTERVAL_SECS: u64 = 10;

    /// Percentage bucket size; entering a new bucket forces an edit
    pub const PERCENT_STEP: u8 = 5;

    /// Capacity of the per-job progress channel. Samples arriving while the
    /// channel is full are dropped, which bounds memory if yt-dlp emits
    /// faster than Telegram edits complete.
    pub const CHANNEL_CAPACITY: usize = 32;

    /// Minimum edit interval duration
    pub fn edit_interval() -> Duration {
        Duration::from_secs(EDIT_INTERVAL_SECS)
    }
}

/// Periodic file cleanup configuration
pub mod cleanup {
    use super::Duration;

    /// Interval between cleanup sweeps (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 3600;

    /// Files older than this are deleted by the sweeper (in seconds).
    /// Kept well above the worst observed job duration so a slow download's
    /// partial file is never swept mid-job.
    pub const FILE_RETENTION_SECS: u64 = 7200;

    /// Sweep interval duration
    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }

    /// File retention duration
    pub fn retention() -> Duration {
        Duration::from_secs(FILE_RETENTION_SECS)
    }
}

/// Input validation configuration
pub mod validation {
    /// Maximum file size for direct video/audio transfer (Telegram bot limit)
    pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024; // 50 MB

    /// Maximum accepted URL length (in characters)
    pub const MAX_URL_LENGTH: usize = 2048;
}

/// Retry configuration for sending files
pub mod retry {
    use super::Duration;

    /// Maximum number of retry attempts for sending files
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Delay between retry attempts (in seconds)
    pub const RETRY_DELAY_SECS: u64 = 10;

    /// Retry delay duration
    pub fn delay() -> Duration {
        Duration::from_secs(RETRY_DELAY_SECS)
    }
}

/// Download subprocess configuration
pub mod download {
    use super::Duration;

    /// Timeout for yt-dlp metadata commands (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 120; // 2 minutes

    /// yt-dlp command timeout duration
    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// HTTP client timeout for Telegram API calls (in seconds).
    /// Generous because file uploads go through the same client.
    pub const TIMEOUT_SECS: u64 = 300;

    /// HTTP client timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}
