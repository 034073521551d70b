//! Message, command and callback handlers.
//!
//! The conversational surface of the bot: a YouTube link gets an info card
//! with quality buttons, a button press becomes a supervised download job
//! keyed by the card's message, and the card is edited in place through the
//! job's lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use tokio::sync::Mutex;
use url::Url;

use crate::core::config;
use crate::core::error::AppError;
use crate::core::utils::{escape_markdown, format_duration, format_view_count};
use crate::download::progress::DownloadStatus;
use crate::download::source::{MediaExtractor, MediaFormat, MediaInfo, Quality};
use crate::download::supervisor::{DownloadSupervisor, JobKey, JobRequest};
use crate::download::{deliver_file, send};
use crate::telegram::bot::Command;
use crate::telegram::messenger::Messenger;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Cached regex for extracting URLs from message text
static URL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("Failed to compile URL regex"));

/// Cached regex for recognizing YouTube video URLs
static YOUTUBE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube|youtu|youtube-nocookie)\.(com|be)/(watch\?v=|embed/|v/|shorts/|.+\?v=)?[A-Za-z0-9_-]{11}")
        .expect("Failed to compile YouTube regex")
});

/// Checks whether the text is a YouTube video URL the bot can handle
pub fn is_valid_youtube_url(url: &str) -> bool {
    YOUTUBE_REGEX.is_match(url)
}

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub supervisor: Arc<DownloadSupervisor>,
    pub extractor: Arc<dyn MediaExtractor>,
    pub messenger: Arc<dyn Messenger>,
    /// Last probed URL and title per chat. Callback data is capped at 64
    /// bytes, so the URL travels through this map instead of the button.
    pending: Arc<Mutex<HashMap<ChatId, PendingSelection>>>,
}

/// What the quality buttons refer to for one chat
#[derive(Clone)]
struct PendingSelection {
    url: Url,
    title: String,
}

impl HandlerDeps {
    pub fn new(
        supervisor: Arc<DownloadSupervisor>,
        extractor: Arc<dyn MediaExtractor>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            supervisor,
            extractor,
            messenger,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Creates the main dispatcher schema for the bot.
///
/// The same schema is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_messages = deps.clone();
    let deps_callbacks = deps;

    dptree::entry()
        .branch(command_handler())
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callbacks))
}

fn command_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(|bot: Bot, msg: Message, cmd: Command| async move {
            handle_command(&bot, &msg, cmd).await?;
            Ok(())
        })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_message(&bot, &msg, &deps).await {
                log::error!("Message handler failed for chat {}: {}", msg.chat.id, e);
            }
            Ok(())
        }
    })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, query: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_callback(&bot, &query, &deps).await {
                log::error!("Callback handler failed: {}", e);
            }
            Ok(())
        }
    })
}

async fn handle_command(bot: &Bot, msg: &Message, cmd: Command) -> ResponseResult<()> {
    let text = match cmd {
        Command::Start => {
            "🎬 *YouTube Download Bot*\n\n\
             Send me a YouTube video URL and I will download it for you\\.\n\n\
             1\\. Paste a YouTube link\n\
             2\\. Pick quality and format\n\
             3\\. Receive the file\n\n\
             Supported formats: MP4 video, MP3 audio\\."
        }
        Command::Help => {
            "🆘 *Help*\n\n\
             Quality options:\n\
             • High — up to 720p\n\
             • Medium — up to 480p\n\
             • Low — smallest available\n\n\
             MP3 extracts the audio track\\.\n\
             Large files are sent as documents\\.\n\n\
             Just paste a YouTube link to get started\\!"
        }
    };
    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::MarkdownV2).await?;
    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), AppError> {
    let Some(text) = msg.text() else { return Ok(()) };
    if text.starts_with('/') {
        return Ok(());
    }

    let Some(url_match) = URL_REGEX.find(text) else {
        bot.send_message(
            msg.chat.id,
            "🔗 Please send me a YouTube URL to download.\n\n\
             Example: https://www.youtube.com/watch?v=VIDEO_ID\n\n\
             Type /help for more information.",
        )
        .await?;
        return Ok(());
    };

    let url_text = url_match.as_str();
    if url_text.len() > config::validation::MAX_URL_LENGTH {
        bot.send_message(msg.chat.id, "❌ That URL is too long.").await?;
        return Ok(());
    }
    if !is_valid_youtube_url(url_text) {
        bot.send_message(
            msg.chat.id,
            "❌ Please send a valid YouTube URL.\n\nExample: https://www.youtube.com/watch?v=VIDEO_ID",
        )
        .await?;
        return Ok(());
    }
    let url = Url::parse(url_text)?;

    let loading = bot.send_message(msg.chat.id, "🔍 Fetching video information...").await?;

    let info = match deps.extractor.probe(&url).await {
        Ok(info) => info,
        Err(e) => {
            log::warn!("Probe failed for {}: {}", url, e);
            bot.edit_message_text(
                msg.chat.id,
                loading.id,
                "❌ Failed to get video information. Please check the URL and try again.",
            )
            .await?;
            return Ok(());
        }
    };

    deps.pending.lock().await.insert(
        msg.chat.id,
        PendingSelection {
            url,
            title: info.title.clone(),
        },
    );

    bot.edit_message_text(msg.chat.id, loading.id, format_video_card(&info))
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(build_download_keyboard())
        .await?;

    Ok(())
}

async fn handle_callback(bot: &Bot, query: &CallbackQuery, deps: &HandlerDeps) -> Result<(), AppError> {
    bot.answer_callback_query(query.id.clone()).await?;

    let Some(data) = query.data.as_deref() else { return Ok(()) };
    let Some(message) = query.message.as_ref() else { return Ok(()) };
    let chat_id = message.chat().id;
    let message_id = message.id();

    // Callback data shape: "dl:<quality>:<format>"
    let mut parts = data.split(':');
    if parts.next() != Some("dl") {
        return Ok(());
    }
    let quality = Quality::parse(parts.next().unwrap_or_default());
    let format = MediaFormat::parse(parts.next().unwrap_or_default());

    let Some(selection) = deps.pending.lock().await.get(&chat_id).cloned() else {
        deps.messenger
            .edit_text(chat_id, message_id, &escape_markdown("❌ This selection expired. Send the link again."))
            .await?;
        return Ok(());
    };

    run_download_job(deps, chat_id, message_id, selection, quality, format).await;
    Ok(())
}

/// Drives one download from button press to delivered file, editing the
/// card message through every stage.
async fn run_download_job(
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    selection: PendingSelection,
    quality: Quality,
    format: MediaFormat,
) {
    let key = JobKey::new(chat_id, message_id);
    let title = selection.title;
    let started = Instant::now();

    let edit = |text: String| {
        let messenger = Arc::clone(&deps.messenger);
        async move {
            if let Err(e) = messenger.edit_text(chat_id, message_id, &text).await {
                log::warn!("Status edit for job {} failed: {}", key, e);
            }
        }
    };

    edit(DownloadStatus::Starting { title: title.clone() }.to_message()).await;

    let request = JobRequest {
        key,
        url: selection.url,
        title: title.clone(),
        quality,
        format,
    };

    match deps.supervisor.submit(request).await {
        Ok(file) => {
            edit(DownloadStatus::Uploading { title: title.clone() }.to_message()).await;

            let delivery = deliver_file(deps.messenger.as_ref(), chat_id, &file, format, Some(&title)).await;
            match delivery {
                Ok(()) => {
                    edit(
                        DownloadStatus::Success {
                            title: title.clone(),
                            elapsed_secs: started.elapsed().as_secs(),
                        }
                        .to_message(),
                    )
                    .await;
                }
                Err(e) => {
                    log::error!("Delivery for job {} failed: {}", key, e);
                    edit(
                        DownloadStatus::Error {
                            title: title.clone(),
                            reason: "Downloaded, but the file could not be delivered. Try again later.".to_string(),
                        }
                        .to_message(),
                    )
                    .await;
                }
            }
            send::remove_local_file(&file);
        }
        Err(AppError::Busy) => {
            edit(
                DownloadStatus::Error {
                    title,
                    reason: "Too many downloads right now. Try again in a minute.".to_string(),
                }
                .to_message(),
            )
            .await;
        }
        Err(e) => {
            edit(
                DownloadStatus::Error {
                    title,
                    reason: e.to_string(),
                }
                .to_message(),
            )
            .await;
        }
    }
}

/// Renders the video info card shown above the quality buttons
fn format_video_card(info: &MediaInfo) -> String {
    let title: String = info.title.chars().take(80).collect();
    format!(
        "🎬 *{}*\n👤 {}\n⏱ {}\n👁 {}\n\nChoose your download options:",
        escape_markdown(&title),
        escape_markdown(&info.uploader),
        escape_markdown(&format_duration(info.duration_secs)),
        escape_markdown(&format_view_count(info.view_count))
    )
}

/// Quality/format selection keyboard shown under the info card
fn build_download_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🎬 High MP4", "dl:high:mp4"),
            InlineKeyboardButton::callback("🎵 MP3 Audio", "dl:best:mp3"),
        ],
        vec![
            InlineKeyboardButton::callback("📱 Medium MP4", "dl:medium:mp4"),
            InlineKeyboardButton::callback("📺 Low MP4", "dl:low:mp4"),
        ],
    ])
}
