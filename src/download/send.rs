//! File delivery routing.
//!
//! Once a file exists locally the only decision left is how to hand it to
//! Telegram: small files go out as native video/audio so clients get inline
//! players, anything above the bot upload ceiling falls back to a generic
//! document transfer. Actual chunking is the platform's business.

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::utils::format_file_size;
use crate::download::source::{MediaFormat, RetrievedFile};
use crate::telegram::messenger::{FileKind, Messenger};
use teloxide::types::ChatId;

/// Picks the transfer mode for a downloaded file.
fn routing_for(file: &RetrievedFile, format: MediaFormat) -> FileKind {
    if file.file_size > config::validation::MAX_FILE_SIZE_BYTES {
        log::info!(
            "File {} is {} (over the {} direct ceiling), sending as document",
            file.file_path.display(),
            format_file_size(file.file_size),
            format_file_size(config::validation::MAX_FILE_SIZE_BYTES)
        );
        return FileKind::Document;
    }
    match format {
        MediaFormat::Mp3 => FileKind::Audio,
        MediaFormat::Mp4 => FileKind::Video,
    }
}

/// Sends a downloaded file to the chat, retrying transient failures.
///
/// Returns `AppError::Delivery` when all attempts are exhausted so the
/// caller can report "downloaded but not delivered" distinctly from a
/// download failure.
pub async fn deliver_file(
    messenger: &dyn Messenger,
    chat_id: ChatId,
    file: &RetrievedFile,
    format: MediaFormat,
    caption: Option<&str>,
) -> AppResult<()> {
    let kind = routing_for(file, format);
    let max_attempts = config::retry::MAX_ATTEMPTS;

    for attempt in 1..=max_attempts {
        log::info!(
            "Sending {} to chat {} as {:?} (attempt {}/{})",
            file.file_path.display(),
            chat_id,
            kind,
            attempt,
            max_attempts
        );

        match messenger.send_file(chat_id, &file.file_path, kind, caption).await {
            Ok(()) => {
                log::info!("Sent {} to chat {} on attempt {}", file.file_path.display(), chat_id, attempt);
                return Ok(());
            }
            Err(e) if attempt < max_attempts => {
                log::warn!(
                    "Attempt {}/{} failed for chat {}: {}. Retrying in {:?}...",
                    attempt,
                    max_attempts,
                    chat_id,
                    e,
                    config::retry::delay()
                );
                tokio::time::sleep(config::retry::delay()).await;
            }
            Err(e) => {
                log::error!("All {} attempts failed to send file to chat {}: {}", max_attempts, chat_id, e);
                return Err(AppError::Delivery(format!(
                    "Failed to send file after {} attempts: {}",
                    max_attempts, e
                )));
            }
        }
    }

    unreachable!()
}

/// Removes a delivered (or undeliverable) local file. Failures are logged
/// and ignored — the cleanup sweeper is the backstop.
pub fn remove_local_file(file: &RetrievedFile) {
    match std::fs::remove_file(&file.file_path) {
        Ok(()) => log::debug!("Removed local file {}", file.file_path.display()),
        Err(e) => log::warn!("Failed to remove local file {}: {}", file.file_path.display(), e),
    }
}
