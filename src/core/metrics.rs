//! Metrics collection using Prometheus
//!
//! Tracks download outcomes, the number of jobs currently held by the
//! supervisor, and cleanup sweep activity.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram_vec, Counter, CounterVec, Gauge,
    HistogramVec,
};

/// Successful downloads count
/// Labels: format (mp3/mp4), quality (best/high/medium/low)
pub static DOWNLOAD_SUCCESS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rolika_download_success_total",
        "Total number of successful downloads",
        &["format", "quality"]
    )
    .unwrap()
});

/// Failed downloads count
/// Labels: format, error_type (retrieval/delivery/busy/...)
pub static DOWNLOAD_FAILURE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rolika_download_failure_total",
        "Total number of failed downloads",
        &["format", "error_type"]
    )
    .unwrap()
});

/// Download duration in seconds by format
pub static DOWNLOAD_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "rolika_download_duration_seconds",
        "Time spent downloading files by format",
        &["format"],
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .unwrap()
});

/// Jobs currently tracked by the supervisor (waiting + downloading)
pub static ACTIVE_JOBS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("rolika_active_jobs", "Number of jobs currently tracked by the supervisor").unwrap()
});

/// Files deleted by the cleanup sweeper
pub static SWEPT_FILES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("rolika_swept_files_total", "Total number of files deleted by the cleanup sweeper").unwrap()
});

/// Record a successful download
pub fn record_download_success(format: &str, quality: &str) {
    DOWNLOAD_SUCCESS_TOTAL.with_label_values(&[format, quality]).inc();
}

/// Record a failed download
pub fn record_download_failure(format: &str, error_type: &str) {
    DOWNLOAD_FAILURE_TOTAL.with_label_values(&[format, error_type]).inc();
}

/// Record files removed by one cleanup sweep
pub fn record_swept_files(count: usize) {
    SWEPT_FILES_TOTAL.inc_by(count as f64);
}
