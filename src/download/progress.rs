//! Download status message formatting.
//!
//! Renders the lifecycle of one job as the text of a single Telegram
//! message that gets edited in place: starting → progress bar → uploading →
//! done (or an error). All text is MarkdownV2-escaped here so callers can
//! pass raw titles.

use crate::core::utils::{escape_markdown, format_file_size};

/// Download state rendered into the user-visible progress message.
#[derive(Debug, Clone)]
pub enum DownloadStatus {
    /// Download is starting
    Starting {
        /// Video/track title
        title: String,
    },
    /// Download in progress with a progress bar
    Downloading {
        /// Video/track title
        title: String,
        /// Download progress in percent (0-100)
        progress: u8,
        /// Download speed in MB/s (optional)
        speed_mbs: Option<f64>,
        /// Estimated time remaining in seconds (optional)
        eta_seconds: Option<u64>,
        /// Current size in bytes (optional)
        current_size: Option<u64>,
        /// Total size in bytes (optional)
        total_size: Option<u64>,
    },
    /// Sending the file to the Telegram server
    Uploading {
        /// Video/track title
        title: String,
    },
    /// Successful download with timing information
    Success {
        /// Video/track title
        title: String,
        /// Elapsed time in seconds
        elapsed_secs: u64,
    },
    /// Download or delivery error
    Error {
        /// Video/track title
        title: String,
        /// Short human-readable reason
        reason: String,
    },
}

impl DownloadStatus {
    /// Generates the formatted MarkdownV2 message text for the current state.
    pub fn to_message(&self) -> String {
        match self {
            DownloadStatus::Starting { title } => {
                format!("🎬 *{}*\n\n⏳ Starting download\\.\\.\\.", escape_markdown(title))
            }
            DownloadStatus::Downloading {
                title,
                progress,
                speed_mbs,
                eta_seconds,
                current_size,
                total_size,
            } => {
                let mut s = format!(
                    "🎬 *{}*\n\n📥 Downloading: {}%\n{}",
                    escape_markdown(title),
                    progress,
                    create_progress_bar(*progress)
                );

                if let Some(speed) = speed_mbs {
                    s.push_str("\n\n⚡ Speed: ");
                    s.push_str(&escape_markdown(&format!("{:.1} MB/s", speed)));
                }

                if let Some(eta) = eta_seconds {
                    let minutes = eta / 60;
                    let seconds = eta % 60;
                    s.push_str("\n⏱ ETA: ");
                    if minutes > 0 {
                        s.push_str(&escape_markdown(&format!("~{} min {} sec", minutes, seconds)));
                    } else {
                        s.push_str(&escape_markdown(&format!("~{} sec", seconds)));
                    }
                }

                if let (Some(current), Some(total)) = (current_size, total_size) {
                    s.push_str("\n📦 Size: ");
                    s.push_str(&escape_markdown(&format!(
                        "{} / {}",
                        format_file_size(*current),
                        format_file_size(*total)
                    )));
                }

                s
            }
            DownloadStatus::Uploading { title } => {
                format!("🎬 *{}*\n\n📤 Uploading file\\.\\.\\.", escape_markdown(title))
            }
            DownloadStatus::Success { title, elapsed_secs } => {
                format!(
                    "🎬 *{}*\n\n✅ Done in {} sec\\!",
                    escape_markdown(title),
                    elapsed_secs
                )
            }
            DownloadStatus::Error { title, reason } => {
                format!("🎬 *{}*\n\n❌ {}", escape_markdown(title), escape_markdown(reason))
            }
        }
    }
}

/// Creates a visual progress bar
fn create_progress_bar(progress: u8) -> String {
    let progress = progress.min(100);
    let filled = (progress / 10) as usize;
    let empty = 10 - filled;

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}
