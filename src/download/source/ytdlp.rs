//! yt-dlp extraction backend.
//!
//! Spawns the yt-dlp binary (falling back to youtube-dl when absent),
//! parses its `--newline` progress output into `ProgressSample`s and
//! resolves the file it actually wrote. Metadata probing goes through
//! `--dump-json` so nothing is downloaded.

use crate::core::config;
use crate::core::error::AppError;
use crate::download::source::{MediaExtractor, MediaFormat, MediaInfo, ProgressSample, Quality, RetrieveRequest, RetrievedFile};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

/// yt-dlp backed implementation of `MediaExtractor`.
pub struct YtDlpExtractor {
    bin: String,
}

impl YtDlpExtractor {
    /// Create an extractor using the configured yt-dlp binary.
    pub fn new() -> Self {
        Self {
            bin: config::YTDL_BIN.clone(),
        }
    }

    /// Create an extractor with an explicit binary path (used by tests).
    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Subset of `yt-dlp --dump-json` output the bot cares about
#[derive(Debug, Deserialize)]
struct YtDlpProbe {
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    thumbnail: Option<String>,
}

/// Maps the requested video quality to a yt-dlp format selector
fn format_selector(quality: Quality) -> &'static str {
    match quality {
        Quality::Best => "best",
        Quality::High => "best[height<=720]",
        Quality::Medium => "best[height<=480]",
        Quality::Low => "worst",
    }
}

/// Spawns the downloader, falling back to youtube-dl when the configured
/// binary is not installed.
fn spawn_downloader_with_fallback(ytdl_bin: &str, args: &[String]) -> Result<tokio::process::Child, AppError> {
    let spawn = |bin: &str| {
        TokioCommand::new(bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    };

    spawn(ytdl_bin).or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            let fallback = "youtube-dl";
            spawn(fallback).map_err(|inner| {
                AppError::Retrieval(format!(
                    "Failed to start downloader. Tried '{}', then '{}': {} / {}",
                    ytdl_bin, fallback, e, inner
                ))
            })
        } else {
            Err(AppError::Retrieval(format!("Failed to start downloader '{}': {}", ytdl_bin, e)))
        }
    })
}

/// Parses one yt-dlp progress line into a `ProgressSample`.
///
/// Example input: `[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10`
pub fn parse_progress(line: &str) -> Option<ProgressSample> {
    if !line.contains("[download]") || !line.contains('%') {
        return None;
    }

    let mut percent = None;
    let mut speed_bytes_sec = None;
    let mut eta_seconds = None;
    let mut total_bytes = None;

    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if let Some(stripped) = part.strip_suffix('%') {
            if let Ok(p) = stripped.parse::<f32>() {
                // Clamp so garbage lines never report a phantom 100%
                percent = Some(p.clamp(0.0, 100.0) as u8);
            }
        } else if *part == "of" {
            total_bytes = parts.get(i + 1).and_then(|s| parse_size(s));
        } else if *part == "at" {
            speed_bytes_sec = parts.get(i + 1).and_then(|s| parse_size(s)).map(|b| b as f64);
        } else if *part == "ETA" {
            eta_seconds = parts.get(i + 1).and_then(|s| parse_eta(s));
        }
    }

    let percent = percent?;
    let downloaded_bytes = total_bytes.map(|total| (total as f64 * (percent as f64 / 100.0)) as u64);

    Some(ProgressSample {
        percent,
        speed_bytes_sec,
        eta_seconds,
        downloaded_bytes,
        total_bytes,
    })
}

/// Parses a size token like "10.00MiB", "500.00KiB" or "1.20GiB" into bytes.
/// A trailing "/s" (speed tokens) is ignored.
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim_start_matches('~').trim_end_matches("/s");
    for (suffix, factor) in [
        ("GiB", 1024.0 * 1024.0 * 1024.0),
        ("MiB", 1024.0 * 1024.0),
        ("KiB", 1024.0),
    ] {
        if let Some(number) = size_str.strip_suffix(suffix) {
            if let Ok(value) = number.parse::<f64>() {
                return Some((value * factor) as u64);
            }
        }
    }
    None
}

/// Parses an ETA token like "00:10", "1:23" or "1:02:03" into seconds.
fn parse_eta(eta_str: &str) -> Option<u64> {
    let parts: Vec<&str> = eta_str.split(':').collect();
    match parts.as_slice() {
        [m, s] => Some(m.parse::<u64>().ok()? * 60 + s.parse::<u64>().ok()?),
        [h, m, s] => Some(h.parse::<u64>().ok()? * 3600 + m.parse::<u64>().ok()? * 60 + s.parse::<u64>().ok()?),
        _ => None,
    }
}

/// Returns the last `max_chars` characters of a string, on a char boundary.
/// Used to keep stderr tails in error messages bounded.
fn tail_of(text: &str, max_chars: usize) -> &str {
    let start = text.char_indices().rev().nth(max_chars.saturating_sub(1)).map_or(0, |(i, _)| i);
    &text[start..]
}

/// Probes the media duration with ffprobe. Best-effort: any failure yields None.
fn probe_duration_seconds(path: &Path) -> Option<u32> {
    let output = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;

    let duration_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if duration_str.is_empty() {
        return None;
    }
    let secs = duration_str.parse::<f32>().ok()?;
    Some(secs.round() as u32)
}

/// Locates the file yt-dlp actually wrote.
///
/// yt-dlp may change the extension (e.g. merged video ends up as .mkv, or
/// the audio post-processor replaces the container), so when the requested
/// path does not exist the download directory is scanned for a file with the
/// same stem.
fn find_actual_file(requested: &Path) -> Option<PathBuf> {
    if requested.exists() {
        return Some(requested.to_path_buf());
    }

    let stem = requested.file_stem()?.to_string_lossy().into_owned();
    let dir = requested.parent()?;
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(candidate_stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) {
            if candidate_stem == stem {
                return Some(path);
            }
        }
    }
    None
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn probe(&self, url: &Url) -> Result<MediaInfo, AppError> {
        let output = timeout(
            config::download::ytdlp_timeout(),
            TokioCommand::new(&self.bin)
                .args(["--dump-json", "--no-playlist", "--no-warnings", "--socket-timeout", "30"])
                .arg(url.as_str())
                .output(),
        )
        .await
        .map_err(|_| AppError::Retrieval(format!("yt-dlp metadata fetch timed out for {}", url)))?
        .map_err(|e| AppError::Retrieval(format!("Failed to run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Retrieval(format!(
                "yt-dlp could not read video info: {}",
                tail_of(stderr.trim(), 300)
            )));
        }

        let probe: YtDlpProbe = serde_json::from_slice(&output.stdout)?;
        Ok(MediaInfo {
            title: probe.title.unwrap_or_else(|| "Unknown".to_string()),
            uploader: probe.uploader.unwrap_or_else(|| "Unknown".to_string()),
            duration_secs: probe.duration.map_or(0, |d| d.round() as u64),
            view_count: probe.view_count.unwrap_or(0),
            thumbnail_url: probe.thumbnail,
        })
    }

    async fn retrieve(
        &self,
        request: &RetrieveRequest,
        progress_tx: mpsc::Sender<ProgressSample>,
    ) -> Result<RetrievedFile, AppError> {
        let output_path = request.output_path.to_string_lossy().into_owned();
        let work_dir = config::work_dir().to_string_lossy().into_owned();

        let mut args: Vec<String> = vec![
            "-o".into(),
            output_path,
            "--newline".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "-P".into(),
            format!("temp:{}", work_dir),
        ];
        match request.format {
            MediaFormat::Mp3 => {
                args.extend(["-x", "--audio-format", "mp3", "--audio-quality", "192K"].map(String::from));
            }
            MediaFormat::Mp4 => {
                args.extend(["-f".to_string(), format_selector(request.quality).to_string()]);
            }
        }
        args.push(request.url.as_str().to_string());

        log::info!("Starting yt-dlp for {} ({:?}, {:?})", request.url, request.format, request.quality);

        let mut child = spawn_downloader_with_fallback(&self.bin, &args)?;

        // Stream progress lines off stdout while the download runs
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Retrieval("yt-dlp stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Retrieval("yt-dlp stderr was not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(sample) = parse_progress(&line) {
                // Bounded channel: drop the sample when the consumer is behind
                let _ = progress_tx.try_send(sample);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AppError::Retrieval(format!("downloader process failed: {}", e)))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(AppError::Retrieval(format!(
                "downloader exited with status {}: {}",
                status,
                tail_of(stderr_text.trim(), 300)
            )));
        }

        let file_path = find_actual_file(&request.output_path).ok_or_else(|| {
            AppError::Retrieval(format!(
                "downloader finished but no file found at {}",
                request.output_path.display()
            ))
        })?;
        let file_size = std::fs::metadata(&file_path)?.len();
        let duration_secs = probe_duration_seconds(&file_path);

        log::info!(
            "yt-dlp finished: {} ({} bytes, duration {:?}s)",
            file_path.display(),
            file_size,
            duration_secs
        );

        Ok(RetrievedFile {
            file_path,
            file_size,
            duration_secs,
        })
    }
}

/// Logs the installed yt-dlp version at startup. Purely diagnostic.
pub async fn log_ytdlp_version() {
    let bin = &*config::YTDL_BIN;
    match TokioCommand::new(bin).arg("--version").output().await {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            log::info!("yt-dlp version: {}", version);
        }
        Ok(output) => {
            log::warn!("'{} --version' exited with {}", bin, output.status);
        }
        Err(e) => {
            log::warn!("yt-dlp not found ('{}'): {}. Downloads will fail until it is installed.", bin, e);
        }
    }
}
