//! Bounded concurrent download job supervisor.
//!
//! One `DownloadSupervisor` owns everything needed to take a download
//! request from admission to a local file: a semaphore bounding concurrent
//! retrievals, a tracking map of in-flight jobs, the progress throttle and
//! the extractor/messenger collaborators. It is constructed explicitly by
//! the process entry point with injected configuration; there are no
//! module-level singletons.
//!
//! Cleanup of the tracking entry and throttle state is done by an RAII
//! guard, so it happens on every exit path — success, failure and panic
//! unwind alike. A leaked entry would count against the pending-job cap
//! forever, so this is load-bearing, not cosmetic.

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::core::utils::escape_filename;
use crate::download::progress::DownloadStatus;
use crate::download::source::{MediaExtractor, MediaFormat, ProgressSample, Quality, RetrieveRequest, RetrievedFile};
use crate::download::throttle::ProgressThrottle;
use crate::telegram::messenger::Messenger;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::{mpsc, Semaphore};
use url::Url;

/// Identifies one in-flight job: the chat plus the progress message being
/// edited for it. Two jobs with the same key cannot coexist in the tracking
/// map — a second submission for an identical key overwrites the first's
/// bookkeeping, so callers derive keys from distinct user-visible messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl JobKey {
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self { chat_id, message_id }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id.0, self.message_id.0)
    }
}

/// Lifecycle state of a tracked job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Submitted, waiting for a concurrency slot
    Queued,
    /// Holding a slot, retrieval in progress
    Downloading,
    /// Retrieval finished successfully
    Completed,
    /// Retrieval failed
    Failed,
}

/// One tracked download attempt
#[derive(Debug, Clone)]
pub struct Job {
    pub key: JobKey,
    pub url: Url,
    pub quality: Quality,
    pub format: MediaFormat,
    pub started_at: DateTime<Utc>,
    pub status: JobStatus,
}

/// Everything the supervisor needs to know about one submission
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub key: JobKey,
    pub url: Url,
    /// Display title, also used to derive the output file name
    pub title: String,
    pub quality: Quality,
    pub format: MediaFormat,
}

/// Injected supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Maximum simultaneous retrievals
    pub max_concurrent: usize,
    /// Maximum tracked jobs (downloading + waiting); submissions beyond this
    /// are rejected with `AppError::Busy` instead of queueing without bound
    pub max_pending: usize,
    /// Directory downloaded files are written into
    pub download_dir: PathBuf,
    /// Capacity of the per-job progress channel
    pub progress_channel_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: config::queue::MAX_CONCURRENT_DOWNLOADS,
            max_pending: config::queue::MAX_PENDING_JOBS,
            download_dir: config::download_dir(),
            progress_channel_capacity: config::progress::CHANNEL_CAPACITY,
        }
    }
}

/// Removes a job's tracking entry and throttle state when dropped.
///
/// Created right after the job is inserted, so the entry is released on
/// every way out of `submit` — early return, `?`, and panic unwind.
struct JobGuard<'a> {
    supervisor: &'a DownloadSupervisor,
    key: JobKey,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.supervisor.remove_job(self.key);
    }
}

/// The central job supervisor. See module docs.
pub struct DownloadSupervisor {
    cfg: SupervisorConfig,
    extractor: Arc<dyn MediaExtractor>,
    messenger: Arc<dyn Messenger>,
    semaphore: Arc<Semaphore>,
    jobs: Mutex<HashMap<JobKey, Job>>,
    throttle: Arc<ProgressThrottle>,
}

impl DownloadSupervisor {
    /// Creates a supervisor with the given configuration and collaborators.
    pub fn new(cfg: SupervisorConfig, extractor: Arc<dyn MediaExtractor>, messenger: Arc<dyn Messenger>) -> Self {
        let semaphore = Arc::new(Semaphore::new(cfg.max_concurrent));
        Self {
            cfg,
            extractor,
            messenger,
            semaphore,
            jobs: Mutex::new(HashMap::new()),
            throttle: Arc::new(ProgressThrottle::default()),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobKey, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one download to completion or failure.
    ///
    /// Suspends until a concurrency slot is free, retrieves the media while
    /// forwarding throttled progress edits to the job's message, and returns
    /// the resulting local file. Any extractor fault comes back as
    /// `AppError::Retrieval`; nothing escapes as a panic, and the tracking
    /// entry is gone by the time this returns no matter what happened.
    pub async fn submit(&self, request: JobRequest) -> AppResult<RetrievedFile> {
        let key = request.key;

        {
            let mut jobs = self.jobs();
            if jobs.len() >= self.cfg.max_pending {
                log::warn!("Rejecting job {}: {} jobs already pending", key, jobs.len());
                metrics::record_download_failure(request.format.as_str(), "busy");
                return Err(AppError::Busy);
            }
            let job = Job {
                key,
                url: request.url.clone(),
                quality: request.quality,
                format: request.format,
                started_at: Utc::now(),
                status: JobStatus::Queued,
            };
            if jobs.insert(key, job).is_none() {
                // The gauge tracks map entries, so a resubmitted key (which
                // replaces the old entry) must not bump it twice.
                metrics::ACTIVE_JOBS.inc();
            } else {
                log::warn!("Job {} resubmitted while still active; previous bookkeeping replaced", key);
            }
        }
        let _guard = JobGuard { supervisor: self, key };

        // Admission: waits here while all slots are taken
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| AppError::Retrieval(format!("Concurrency gate closed: {}", e)))?;
        self.set_status(key, JobStatus::Downloading);
        log::info!(
            "Job {} admitted ({} slots free): {}",
            key,
            self.semaphore.available_permits(),
            request.url
        );

        let retrieve_request = RetrieveRequest {
            url: request.url.clone(),
            output_path: self.output_path_for(&request),
            format: request.format,
            quality: request.quality,
        };

        let (tx, rx) = mpsc::channel(self.cfg.progress_channel_capacity);
        let forwarder = tokio::spawn(forward_progress(
            Arc::clone(&self.messenger),
            Arc::clone(&self.throttle),
            key,
            request.title.clone(),
            rx,
        ));

        let started = Instant::now();
        let outcome = self.extractor.retrieve(&retrieve_request, tx).await;

        // The extractor dropped its sender, so the forwarder drains the
        // remaining samples and exits; waiting keeps edits strictly ordered
        // relative to whatever the caller sends next.
        if let Err(e) = forwarder.await {
            log::warn!("Progress forwarder for job {} panicked: {}", key, e);
        }

        match outcome {
            Ok(file) => {
                self.set_status(key, JobStatus::Completed);
                metrics::record_download_success(request.format.as_str(), request.quality.as_str());
                metrics::DOWNLOAD_DURATION_SECONDS
                    .with_label_values(&[request.format.as_str()])
                    .observe(started.elapsed().as_secs_f64());
                log::info!("Job {} completed in {:.1}s: {}", key, started.elapsed().as_secs_f64(), file.file_path.display());
                Ok(file)
            }
            Err(e) => {
                self.set_status(key, JobStatus::Failed);
                metrics::record_download_failure(request.format.as_str(), e.subcategory());
                log::error!("Job {} failed: {}", key, e);
                Err(match e {
                    err @ AppError::Retrieval(_) => err,
                    other => AppError::Retrieval(other.to_string()),
                })
            }
        }
        // _guard drops here: tracking entry and throttle state removed
    }

    /// Output file path for a request: sanitized title, a timestamp to keep
    /// concurrent downloads of the same video apart, the requested extension.
    fn output_path_for(&self, request: &JobRequest) -> PathBuf {
        let stem: String = escape_filename(request.title.trim()).chars().take(64).collect();
        let stem = if stem.is_empty() { "media".to_string() } else { stem };
        let file_name = format!("{}_{}.{}", stem, Utc::now().timestamp_millis(), request.format.as_str());
        self.cfg.download_dir.join(file_name)
    }

    fn set_status(&self, key: JobKey, status: JobStatus) {
        if let Some(job) = self.jobs().get_mut(&key) {
            job.status = status;
        }
    }

    fn remove_job(&self, key: JobKey) {
        if self.jobs().remove(&key).is_some() {
            metrics::ACTIVE_JOBS.dec();
        }
        self.throttle.forget(key);
    }

    /// Number of jobs currently tracked (waiting + downloading)
    pub fn job_count(&self) -> usize {
        self.jobs().len()
    }

    /// Number of jobs currently in `Downloading` state
    pub fn downloading_count(&self) -> usize {
        self.jobs().values().filter(|j| j.status == JobStatus::Downloading).count()
    }

    /// Whether a job with this key is currently tracked
    pub fn contains(&self, key: JobKey) -> bool {
        self.jobs().contains_key(&key)
    }

    /// Current status of a tracked job
    pub fn status(&self, key: JobKey) -> Option<JobStatus> {
        self.jobs().get(&key).map(|j| j.status)
    }

    /// Number of jobs with live throttle state
    pub fn throttled_keys(&self) -> usize {
        self.throttle.tracked()
    }
}

/// Consumes one job's progress channel, turning throttled samples into
/// message edits. Edit failures are logged and swallowed — a missed progress
/// update must never abort a download.
async fn forward_progress(
    messenger: Arc<dyn Messenger>,
    throttle: Arc<ProgressThrottle>,
    key: JobKey,
    title: String,
    mut rx: mpsc::Receiver<ProgressSample>,
) {
    while let Some(sample) = rx.recv().await {
        if !throttle.should_emit(key, sample.percent, Instant::now()) {
            continue;
        }
        let status = DownloadStatus::Downloading {
            title: title.clone(),
            progress: sample.percent,
            speed_mbs: sample.speed_bytes_sec.map(|b| b / (1024.0 * 1024.0)),
            eta_seconds: sample.eta_seconds,
            current_size: sample.downloaded_bytes,
            total_size: sample.total_bytes,
        };
        if let Err(e) = messenger.edit_text(key.chat_id, key.message_id, &status.to_message()).await {
            log::warn!("Progress update for job {} failed: {}", key, e);
        }
    }
}
