use thiserror::Error;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent error handling.
/// Uses `thiserror` for automatic error conversion and display formatting.
///
/// The two download-facing variants mirror the fault boundary of the job
/// supervisor: `Retrieval` means yt-dlp could not produce a file, `Delivery`
/// means the file exists locally but could not be handed to Telegram. The
/// outer layer uses the distinction to tell the user "downloaded but not
/// delivered" instead of a generic failure.
#[derive(Error, Debug)]
pub enum AppError {
    /// The extractor could not produce a file (network, region lock,
    /// removed content, unsupported format, bad exit code)
    #[error("Download error: {0}")]
    Retrieval(String),

    /// The file was downloaded but could not be sent to the user
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// The supervisor refused admission because too many jobs are pending
    #[error("Too many downloads in progress, try again later")]
    Busy,

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON parsing errors (yt-dlp --dump-json output)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Subcategory label for metrics
    pub fn subcategory(&self) -> &'static str {
        match self {
            AppError::Retrieval(_) => "retrieval",
            AppError::Delivery(_) => "delivery",
            AppError::Busy => "busy",
            AppError::Telegram(_) => "telegram",
            AppError::Io(_) => "io",
            AppError::Url(_) => "url",
            AppError::Json(_) => "json",
            AppError::Validation(_) => "validation",
        }
    }
}

/// Helper to convert String to AppError::Retrieval
impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Retrieval(err)
    }
}

/// Helper to convert &str to AppError::Retrieval
impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Retrieval(err.to_string())
    }
}
