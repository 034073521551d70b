//! Test doubles for the extractor and messenger seams.
//!
//! `StubExtractor` simulates retrievals with configurable delay, progress
//! samples and failure injection while tracking observed concurrency;
//! `RecordingMessenger` records every call instead of talking to Telegram.

#![allow(dead_code)] // Not every test binary uses every helper

use async_trait::async_trait;
use rolika::core::error::{AppError, AppResult};
use rolika::download::source::{MediaExtractor, MediaInfo, ProgressSample, RetrieveRequest, RetrievedFile};
use rolika::telegram::messenger::{FileKind, Messenger};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::mpsc;
use tokio::time::sleep;
use url::Url;

/// Configurable fake extractor that observes its own concurrency.
pub struct StubExtractor {
    /// Simulated retrieval duration
    pub delay: Duration,
    /// When true, `retrieve` fails after the delay
    pub fail: bool,
    /// Progress percentages pushed before the delay
    pub samples: Vec<u8>,
    /// Simulated size of the produced file
    pub file_size: u64,
    active: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl StubExtractor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail: false,
            samples: Vec::new(),
            file_size: 1_000_000,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        }
    }

    pub fn failing(delay: Duration) -> Self {
        Self {
            fail: true,
            ..Self::new(delay)
        }
    }

    pub fn with_samples(mut self, samples: Vec<u8>) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }

    /// Highest number of concurrent `retrieve` calls observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of `retrieve` calls that have started
    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of `retrieve` calls currently in flight
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaExtractor for StubExtractor {
    async fn probe(&self, _url: &Url) -> Result<MediaInfo, AppError> {
        Ok(MediaInfo {
            title: "Stub Video".to_string(),
            uploader: "Stub Channel".to_string(),
            duration_secs: 123,
            view_count: 456,
            thumbnail_url: None,
        })
    }

    async fn retrieve(
        &self,
        request: &RetrieveRequest,
        progress_tx: mpsc::Sender<ProgressSample>,
    ) -> Result<RetrievedFile, AppError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        for &percent in &self.samples {
            let _ = progress_tx.try_send(ProgressSample {
                percent,
                speed_bytes_sec: Some(1_048_576.0),
                eta_seconds: Some(30),
                downloaded_bytes: Some(u64::from(percent) * 10_000),
                total_bytes: Some(1_000_000),
            });
        }

        sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(AppError::Retrieval("simulated network failure".to_string()));
        }

        Ok(RetrievedFile {
            file_path: request.output_path.clone(),
            file_size: self.file_size,
            duration_secs: Some(123),
        })
    }
}

/// Messenger that records every call instead of hitting the network.
pub struct RecordingMessenger {
    /// When true, `send_file` always fails
    pub fail_send_file: bool,
    next_id: AtomicI32,
    edits: Mutex<Vec<(ChatId, MessageId, String)>>,
    sent_files: Mutex<Vec<(ChatId, PathBuf, FileKind)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self {
            fail_send_file: false,
            next_id: AtomicI32::new(1),
            edits: Mutex::new(Vec::new()),
            sent_files: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_send() -> Self {
        Self {
            fail_send_file: true,
            ..Self::new()
        }
    }

    /// All recorded `edit_text` texts, in call order
    pub fn edit_texts(&self) -> Vec<String> {
        self.edits
            .lock()
            .expect("edits mutex")
            .iter()
            .map(|(_, _, text)| text.clone())
            .collect()
    }

    /// All recorded `send_file` calls
    pub fn sent_files(&self) -> Vec<(ChatId, PathBuf, FileKind)> {
        self.sent_files.lock().expect("sent_files mutex").clone()
    }
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, _chat_id: ChatId, _text: &str) -> AppResult<MessageId> {
        Ok(MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> AppResult<()> {
        self.edits
            .lock()
            .expect("edits mutex")
            .push((chat_id, message_id, text.to_string()));
        Ok(())
    }

    async fn send_file(&self, chat_id: ChatId, path: &Path, kind: FileKind, _caption: Option<&str>) -> AppResult<()> {
        if self.fail_send_file {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated send failure",
            )));
        }
        self.sent_files
            .lock()
            .expect("sent_files mutex")
            .push((chat_id, path.to_path_buf(), kind));
        Ok(())
    }
}
