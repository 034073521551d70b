//! Narrow message-delivery seam over the Telegram Bot API.
//!
//! The supervisor and delivery code talk to this trait instead of teloxide
//! directly, so tests can record calls and the transport quirks (rate
//! limits, "message is not modified") stay in one place.

use crate::core::error::{AppError, AppResult};
use crate::core::utils::extract_retry_after;
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode};

/// How a file should be presented to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Inline video player
    Video,
    /// Inline audio player
    Audio,
    /// Generic document attachment (fallback for oversized files)
    Document,
}

/// Message delivery operations the core needs. All MarkdownV2.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a new text message, returning its id for later edits.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> AppResult<MessageId>;

    /// Edits an existing message in place.
    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> AppResult<()>;

    /// Sends a local file to the chat.
    async fn send_file(&self, chat_id: ChatId, path: &Path, kind: FileKind, caption: Option<&str>) -> AppResult<()>;
}

/// Production `Messenger` backed by teloxide.
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn edit_once(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<(), teloxide::RequestError> {
        self.bot
            .edit_message_text(chat_id, message_id, text)
            .parse_mode(ParseMode::MarkdownV2)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> AppResult<MessageId> {
        let msg = self
            .bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        Ok(msg.id)
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> AppResult<()> {
        match self.edit_once(chat_id, message_id, text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let error_str = e.to_string();

                // Identical content is not a failure, the message already shows it
                if error_str.contains("message is not modified") {
                    return Ok(());
                }

                // Rate limited: wait the advertised time and try once more
                if let Some(retry_after_secs) = extract_retry_after(&error_str) {
                    log::warn!("Rate limit on edit for chat {}: retry after {}s", chat_id, retry_after_secs);
                    tokio::time::sleep(std::time::Duration::from_secs(retry_after_secs + 1)).await;
                    match self.edit_once(chat_id, message_id, text).await {
                        Ok(()) => return Ok(()),
                        Err(e2) if e2.to_string().contains("message is not modified") => return Ok(()),
                        Err(e2) => return Err(AppError::Telegram(e2)),
                    }
                }

                Err(AppError::Telegram(e))
            }
        }
    }

    async fn send_file(&self, chat_id: ChatId, path: &Path, kind: FileKind, caption: Option<&str>) -> AppResult<()> {
        let input = InputFile::file(path);
        match kind {
            FileKind::Video => {
                let req = self.bot.send_video(chat_id, input);
                let req = match caption {
                    Some(c) => req.caption(c.to_string()),
                    None => req,
                };
                req.await?;
            }
            FileKind::Audio => {
                let req = self.bot.send_audio(chat_id, input);
                let req = match caption {
                    Some(c) => req.caption(c.to_string()),
                    None => req,
                };
                req.await?;
            }
            FileKind::Document => {
                let req = self.bot.send_document(chat_id, input);
                let req = match caption {
                    Some(c) => req.caption(c.to_string()),
                    None => req,
                };
                req.await?;
            }
        }
        Ok(())
    }
}
