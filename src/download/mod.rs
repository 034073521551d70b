//! Download orchestration: job supervision, progress throttling and delivery

pub mod progress;
pub mod send;
pub mod source;
pub mod supervisor;
pub mod throttle;

// Re-exports for convenience
pub use send::deliver_file;
pub use source::{MediaExtractor, MediaFormat, MediaInfo, ProgressSample, Quality, RetrieveRequest, RetrievedFile};
pub use supervisor::{DownloadSupervisor, Job, JobKey, JobRequest, JobStatus, SupervisorConfig};
pub use throttle::ProgressThrottle;
