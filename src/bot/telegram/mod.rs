pub mod command_handler;
pub mod listener;
pub mod sender;

use crate::config::AppConfig;
use crate::downloader::TrackFetcher;
use crate::model::NotifyError;
use crate::storage::SqliteStorage;
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::time::Instant;
use tokio::sync::{Mutex, Notify};

/// Telegram front end: long-polls for commands and pushes replies through
/// the Bot API. One instance serves every chat that talks to the bot.
pub struct TelegramBot {
    pub bot_token: String,
    pub client: Client,
    pub offset: Arc<AtomicI64>,
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub config: Arc<AppConfig>,
    pub fetcher: Arc<TrackFetcher>,
    pub start_time: Instant,
    pub refresh_notify: Arc<Notify>,
}

impl TelegramBot {
    pub fn new(
        bot_token: String,
        storage: Arc<Mutex<SqliteStorage>>,
        config: Arc<AppConfig>,
        fetcher: Arc<TrackFetcher>,
        refresh_notify: Arc<Notify>,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(65))
            .build()
            .map_err(|e| NotifyError::ApiError(e.to_string()))?;
        Ok(Self {
            bot_token,
            client,
            offset: Arc::new(AtomicI64::new(0)),
            storage,
            config,
            fetcher,
            start_time: Instant::now(),
            refresh_notify,
        })
    }

    pub async fn notify_text(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        sender::send_text(self, chat_id, text).await
    }

    pub async fn set_my_commands(&self) -> Result<(), reqwest::Error> {
        let url = format!("https://api.telegram.org/bot{}/setMyCommands", self.bot_token);
        let commands = serde_json::json!({
            "commands": [
                { "command": "start", "description": "Welcome and instructions" },
                { "command": "help", "description": "Command list" },
                { "command": "ping", "description": "Check connection" },
                { "command": "add", "description": "Track a playlist: /add <url>" },
                { "command": "playlists", "description": "Your tracked playlists" },
                { "command": "tracks", "description": "Tracks of a playlist: /tracks <id>" },
                { "command": "autocheck", "description": "Toggle re-checking: /autocheck <id> on|off" },
                { "command": "remove", "description": "Stop tracking: /remove <id>" },
                { "command": "refresh", "description": "Re-check all playlists now" },
                { "command": "uptime", "description": "Service uptime" }
            ]
        });
        self.client.post(&url).json(&commands).send().await?;
        Ok(())
    }

    pub fn spawn_listener(bot: Arc<TelegramBot>) {
        tokio::spawn(async move {
            if let Err(e) = bot.set_my_commands().await {
                tracing::warn!("Failed to register bot commands: {:?}", e);
            }
            tracing::info!("▶️ Starting Telegram listener...");
            listener::listen_for_commands(&bot).await;
            tracing::info!("🛑 Telegram listener ended.");
        });
    }
}
