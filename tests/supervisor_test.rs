//! Integration tests for the download supervisor: admission control,
//! unconditional cleanup, progress throttling and delivery routing.

mod mocks;

use mocks::{RecordingMessenger, StubExtractor};
use rolika::core::error::AppError;
use rolika::download::source::{MediaFormat, Quality, RetrievedFile};
use rolika::download::supervisor::{DownloadSupervisor, JobKey, JobRequest, SupervisorConfig};
use rolika::download::{deliver_file, send};
use rolika::telegram::messenger::FileKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::{ChatId, MessageId};
use url::Url;

fn test_config(max_concurrent: usize, max_pending: usize) -> SupervisorConfig {
    SupervisorConfig {
        max_concurrent,
        max_pending,
        download_dir: std::env::temp_dir(),
        progress_channel_capacity: 32,
    }
}

fn job_request(n: i32) -> JobRequest {
    JobRequest {
        key: JobKey::new(ChatId(1000), MessageId(n)),
        url: Url::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").expect("url"),
        title: format!("Video {}", n),
        quality: Quality::High,
        format: MediaFormat::Mp4,
    }
}

fn supervisor_with(
    extractor: Arc<StubExtractor>,
    messenger: Arc<RecordingMessenger>,
    max_concurrent: usize,
    max_pending: usize,
) -> Arc<DownloadSupervisor> {
    Arc::new(DownloadSupervisor::new(
        test_config(max_concurrent, max_pending),
        extractor,
        messenger,
    ))
}

// ==================== Admission control ====================

#[tokio::test]
async fn test_concurrency_bound_never_exceeded() {
    let extractor = Arc::new(StubExtractor::new(Duration::from_millis(200)));
    let messenger = Arc::new(RecordingMessenger::new());
    let supervisor = supervisor_with(Arc::clone(&extractor), messenger, 3, 24);

    let mut handles = Vec::new();
    for n in 0..4 {
        let supervisor = Arc::clone(&supervisor);
        handles.push(tokio::spawn(async move { supervisor.submit(job_request(n)).await }));
    }

    // While the first three hold slots, the fourth must not be downloading
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(supervisor.job_count(), 4);
    assert!(supervisor.downloading_count() <= 3);
    assert!(extractor.started_count() <= 3);

    for handle in handles {
        let result = handle.await.expect("task join");
        assert!(result.is_ok());
    }

    // The semaphore never admitted more than three at once
    assert_eq!(extractor.peak_concurrency(), 3);
    assert_eq!(extractor.started_count(), 4);

    // Tracking map and throttle state are empty after all jobs finished
    assert_eq!(supervisor.job_count(), 0);
    assert_eq!(supervisor.throttled_keys(), 0);
}

#[tokio::test]
async fn test_busy_rejection_beyond_pending_cap() {
    let extractor = Arc::new(StubExtractor::new(Duration::from_millis(200)));
    let messenger = Arc::new(RecordingMessenger::new());
    let supervisor = supervisor_with(extractor, messenger, 1, 1);

    let first = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.submit(job_request(1)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The cap counts tracked jobs, so the second submission is refused
    let second = supervisor.submit(job_request(2)).await;
    assert!(matches!(second, Err(AppError::Busy)));

    assert!(first.await.expect("task join").is_ok());
    assert_eq!(supervisor.job_count(), 0);
}

// ==================== Cleanup guarantees ====================

#[tokio::test]
async fn test_cleanup_after_success() {
    let extractor = Arc::new(StubExtractor::new(Duration::from_millis(10)).with_samples(vec![50]));
    let messenger = Arc::new(RecordingMessenger::new());
    let supervisor = supervisor_with(extractor, messenger, 3, 24);

    let request = job_request(7);
    let key = request.key;
    let result = supervisor.submit(request).await;

    assert!(result.is_ok());
    assert!(!supervisor.contains(key));
    assert_eq!(supervisor.job_count(), 0);
    assert_eq!(supervisor.throttled_keys(), 0);
}

#[tokio::test]
async fn test_cleanup_after_failure() {
    let extractor = Arc::new(StubExtractor::failing(Duration::from_millis(10)).with_samples(vec![10]));
    let messenger = Arc::new(RecordingMessenger::new());
    let supervisor = supervisor_with(extractor, messenger, 3, 24);

    let request = job_request(8);
    let key = request.key;
    let result = supervisor.submit(request).await;

    match result {
        Err(AppError::Retrieval(reason)) => assert!(reason.contains("simulated")),
        other => panic!("expected retrieval failure, got {:?}", other.map(|f| f.file_path)),
    }
    assert!(!supervisor.contains(key));
    assert_eq!(supervisor.throttled_keys(), 0);
}

#[tokio::test]
async fn test_mixed_outcomes_leave_empty_map() {
    let ok_extractor = Arc::new(StubExtractor::new(Duration::from_millis(20)));
    let messenger = Arc::new(RecordingMessenger::new());
    let ok_supervisor = supervisor_with(Arc::clone(&ok_extractor), Arc::clone(&messenger), 2, 24);

    let failing_extractor = Arc::new(StubExtractor::failing(Duration::from_millis(20)));
    let failing_supervisor = supervisor_with(failing_extractor, messenger, 2, 24);

    let mut handles = Vec::new();
    for n in 0..3 {
        let supervisor = Arc::clone(&ok_supervisor);
        handles.push(tokio::spawn(async move { supervisor.submit(job_request(n)).await.is_ok() }));
    }
    for n in 10..13 {
        let supervisor = Arc::clone(&failing_supervisor);
        handles.push(tokio::spawn(async move { supervisor.submit(job_request(n)).await.is_ok() }));
    }

    let outcomes: Vec<bool> = futures_join_all(handles).await;
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 3);

    assert_eq!(ok_supervisor.job_count(), 0);
    assert_eq!(failing_supervisor.job_count(), 0);
}

/// Minimal join_all so the test crate does not need the futures crate
async fn futures_join_all(handles: Vec<tokio::task::JoinHandle<bool>>) -> Vec<bool> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.expect("task join"));
    }
    out
}

#[tokio::test]
async fn test_duplicate_key_is_overwritten_not_leaked() {
    let extractor = Arc::new(StubExtractor::new(Duration::from_millis(100)));
    let messenger = Arc::new(RecordingMessenger::new());
    let supervisor = supervisor_with(extractor, messenger, 3, 24);

    // Two jobs sharing one key: a documented sharp edge. The second insert
    // replaces the first's bookkeeping; both must still finish and the map
    // must be empty afterwards.
    let a = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.submit(job_request(42)).await })
    };
    let b = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.submit(job_request(42)).await })
    };

    assert!(a.await.expect("join").is_ok());
    assert!(b.await.expect("join").is_ok());
    assert_eq!(supervisor.job_count(), 0);
}

// ==================== Progress throttling ====================

#[tokio::test]
async fn test_progress_edits_follow_bucket_rule() {
    // Samples at 0,1,2,6,7,11 percent: the throttle lets 0, 6 and 11 through
    let extractor = Arc::new(StubExtractor::new(Duration::from_millis(50)).with_samples(vec![0, 1, 2, 6, 7, 11]));
    let messenger = Arc::new(RecordingMessenger::new());
    let supervisor = supervisor_with(extractor, Arc::clone(&messenger), 3, 24);

    supervisor.submit(job_request(5)).await.expect("submit");

    let edits = messenger.edit_texts();
    assert_eq!(edits.len(), 3, "expected 3 throttled edits, got: {:?}", edits);
    assert!(edits[0].contains("0%"));
    assert!(edits[1].contains("6%"));
    assert!(edits[2].contains("11%"));
}

#[tokio::test]
async fn test_progress_edit_failure_does_not_abort_download() {
    struct EditFailingMessenger;

    #[async_trait::async_trait]
    impl rolika::telegram::messenger::Messenger for EditFailingMessenger {
        async fn send_text(
            &self,
            _chat_id: ChatId,
            _text: &str,
        ) -> rolika::core::error::AppResult<MessageId> {
            Ok(MessageId(1))
        }
        async fn edit_text(
            &self,
            _chat_id: ChatId,
            _message_id: MessageId,
            _text: &str,
        ) -> rolika::core::error::AppResult<()> {
            Err(AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "edit down")))
        }
        async fn send_file(
            &self,
            _chat_id: ChatId,
            _path: &std::path::Path,
            _kind: FileKind,
            _caption: Option<&str>,
        ) -> rolika::core::error::AppResult<()> {
            Ok(())
        }
    }

    let extractor = Arc::new(StubExtractor::new(Duration::from_millis(20)).with_samples(vec![0, 50, 100]));
    let supervisor = Arc::new(DownloadSupervisor::new(
        test_config(3, 24),
        extractor,
        Arc::new(EditFailingMessenger),
    ));

    // Every progress edit fails, the download still succeeds
    assert!(supervisor.submit(job_request(9)).await.is_ok());
    assert_eq!(supervisor.job_count(), 0);
}

// ==================== Delivery routing ====================

#[tokio::test]
async fn test_delivery_routes_by_format_and_size() {
    let messenger = RecordingMessenger::new();
    let small_video = RetrievedFile {
        file_path: PathBuf::from("/tmp/a.mp4"),
        file_size: 10 * 1024 * 1024,
        duration_secs: None,
    };
    let small_audio = RetrievedFile {
        file_path: PathBuf::from("/tmp/b.mp3"),
        file_size: 4 * 1024 * 1024,
        duration_secs: None,
    };
    let oversized = RetrievedFile {
        file_path: PathBuf::from("/tmp/c.mp4"),
        file_size: 200 * 1024 * 1024,
        duration_secs: None,
    };

    deliver_file(&messenger, ChatId(1), &small_video, MediaFormat::Mp4, None)
        .await
        .expect("video delivery");
    deliver_file(&messenger, ChatId(1), &small_audio, MediaFormat::Mp3, None)
        .await
        .expect("audio delivery");
    deliver_file(&messenger, ChatId(1), &oversized, MediaFormat::Mp4, None)
        .await
        .expect("document delivery");

    let kinds: Vec<FileKind> = messenger.sent_files().into_iter().map(|(_, _, kind)| kind).collect();
    assert_eq!(kinds, vec![FileKind::Video, FileKind::Audio, FileKind::Document]);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_failure_surfaces_as_delivery_error() {
    let messenger = RecordingMessenger::failing_send();
    let file = RetrievedFile {
        file_path: PathBuf::from("/tmp/gone.mp4"),
        file_size: 1024,
        duration_secs: None,
    };

    let result = deliver_file(&messenger, ChatId(1), &file, MediaFormat::Mp4, None).await;
    assert!(matches!(result, Err(AppError::Delivery(_))));

    // Removing the local file afterwards never panics, even when it is gone
    send::remove_local_file(&file);
}
