//! Media extraction abstraction layer.
//!
//! Provides the `MediaExtractor` trait so the job supervisor is decoupled
//! from the actual retrieval backend. The production backend is
//! `YtDlpExtractor` (yt-dlp subprocess); tests substitute stubs.
//!
//! `probe` is a read-only metadata fetch; `retrieve` performs network I/O,
//! writes a file under the storage directory and pushes progress samples
//! through a bounded channel.

pub mod ytdlp;

use crate::core::error::AppError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;
use url::Url;

/// Requested video quality, mapped to a yt-dlp format selector by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// Best available
    #[default]
    Best,
    /// Up to 720p
    High,
    /// Up to 480p
    Medium,
    /// Worst available quality
    Low,
}

impl Quality {
    /// Parse from callback data / stored string value.
    pub fn parse(s: &str) -> Self {
        match s {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Best,
        }
    }

    /// Serialize to string for callback data.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Requested output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaFormat {
    /// Video with audio
    #[default]
    Mp4,
    /// Audio only
    Mp3,
}

impl MediaFormat {
    /// Parse from callback data / stored string value.
    pub fn parse(s: &str) -> Self {
        match s {
            "mp3" => Self::Mp3,
            _ => Self::Mp4,
        }
    }

    /// Serialize to string for callback data and file extensions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
        }
    }
}

/// Video metadata returned by `probe`, without downloading anything.
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    /// Video title
    pub title: String,
    /// Channel / uploader name
    pub uploader: String,
    /// Duration in seconds (0 if unknown)
    pub duration_secs: u64,
    /// View count (0 if unknown)
    pub view_count: u64,
    /// Thumbnail URL, if any
    pub thumbnail_url: Option<String>,
}

/// Progress information emitted during download.
#[derive(Debug, Clone)]
pub struct ProgressSample {
    /// Download progress percentage (0-100)
    pub percent: u8,
    /// Download speed in bytes per second
    pub speed_bytes_sec: Option<f64>,
    /// Estimated time remaining in seconds
    pub eta_seconds: Option<u64>,
    /// Bytes downloaded so far
    pub downloaded_bytes: Option<u64>,
    /// Total bytes expected
    pub total_bytes: Option<u64>,
}

/// Request parameters for a retrieval operation.
#[derive(Debug, Clone)]
pub struct RetrieveRequest {
    /// URL to download from
    pub url: Url,
    /// Local path to save the downloaded file
    pub output_path: PathBuf,
    /// Target container
    pub format: MediaFormat,
    /// Requested quality (video only)
    pub quality: Quality,
}

/// Output from a successful retrieval.
#[derive(Debug, Clone)]
pub struct RetrievedFile {
    /// Actual file path of the downloaded file (may differ from requested path)
    pub file_path: PathBuf,
    /// File size in bytes
    pub file_size: u64,
    /// Duration in seconds, if it could be probed
    pub duration_secs: Option<u32>,
}

/// Trait for media extraction backends.
///
/// Progress samples are pushed with `try_send` into the bounded channel the
/// caller provides; a full channel drops the sample rather than blocking the
/// download. Samples for one retrieval are produced strictly in order.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fetch metadata for the URL without downloading.
    async fn probe(&self, url: &Url) -> Result<MediaInfo, AppError>;

    /// Execute the download, sending progress updates through the channel.
    async fn retrieve(
        &self,
        request: &RetrieveRequest,
        progress_tx: mpsc::Sender<ProgressSample>,
    ) -> Result<RetrievedFile, AppError>;
}
