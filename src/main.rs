//! Process entry point: wires configuration, the supervisor, the cleanup
//! sweeper and the Telegram dispatcher together.

use std::sync::Arc;

use teloxide::prelude::*;

use rolika::core::{config, logging};
use rolika::download::source::ytdlp::{log_ytdlp_version, YtDlpExtractor};
use rolika::download::source::MediaExtractor;
use rolika::download::supervisor::{DownloadSupervisor, SupervisorConfig};
use rolika::storage::{CleanupSweeper, SweeperConfig};
use rolika::telegram::{self, HandlerDeps, Messenger, TelegramMessenger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logger("rolika.log")?;
    log::info!("🤖 rolika is starting...");
    logging::log_storage_configuration();

    log_ytdlp_version().await;

    std::fs::create_dir_all(config::download_dir())?;
    std::fs::create_dir_all(config::work_dir())?;

    let bot = telegram::create_bot()?;
    if let Err(e) = telegram::setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone()));
    let extractor: Arc<dyn MediaExtractor> = Arc::new(YtDlpExtractor::new());
    let supervisor = Arc::new(DownloadSupervisor::new(
        SupervisorConfig::default(),
        Arc::clone(&extractor),
        Arc::clone(&messenger),
    ));

    let sweeper = Arc::new(CleanupSweeper::new(SweeperConfig::default()));
    let sweeper_handle = Arc::clone(&sweeper).spawn();

    let deps = HandlerDeps::new(supervisor, extractor, messenger);

    log::info!("🎉 rolika is up, dispatching updates");
    Dispatcher::builder(bot, telegram::schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    sweeper.stop();
    sweeper_handle.abort();
    log::info!("rolika shut down");
    Ok(())
}
