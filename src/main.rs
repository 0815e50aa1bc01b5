mod bot;
mod config;
mod downloader;
mod model;
mod scraper;
mod storage;
mod utils;

use bot::TelegramBot;
use config::{AppConfig, load_config};
use downloader::TrackFetcher;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use storage::SqliteStorage;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};
use utils::playlist_url;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("😱 Panic occurred: {:?}", panic_info);
    }));

    // Load configuration from file
    let config: Arc<AppConfig> = match load_config("config.json") {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    // Initialize storage (SQLite) with async access (wrapped in a Mutex)
    let storage = match SqliteStorage::new(&config.db_path) {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => {
            error!("Failed to initialize storage: {:?}", e);
            return;
        }
    };

    let fetcher = match TrackFetcher::new(config.rapidapi_token.clone()) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!("Failed to initialize track fetcher: {:?}", e);
            return;
        }
    };

    // Initialize the Telegram bot and the manual-refresh signal
    let refresh_notify = Arc::new(Notify::new());
    let telegram_bot = match TelegramBot::new(
        config.telegram_bot_token.clone(),
        storage.clone(),
        config.clone(),
        fetcher.clone(),
        refresh_notify.clone(),
    ) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            error!("Failed to initialize Telegram bot: {:?}", e);
            return;
        }
    };

    // Spawn the command listener (handles /add, /refresh etc.)
    TelegramBot::spawn_listener(telegram_bot.clone());
    info!("🚀 trackhound started");

    // Auto-check loop
    loop {
        info!("Entering auto-check loop...");
        let pairs = match storage.lock().await.all_auto_check() {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to list auto-check playlists: {:?}", e);
                Vec::new()
            }
        };
        info!("Playlists to re-check: {}", pairs.len());

        // Re-check all flagged playlists concurrently
        let tasks: Vec<_> = pairs
            .iter()
            .map(|(user_id, playlist_id)| {
                process_playlist(
                    user_id,
                    playlist_id,
                    storage.clone(),
                    config.clone(),
                    fetcher.clone(),
                    telegram_bot.clone(),
                )
            })
            .collect();
        join_all(tasks).await;

        info!(
            "Waiting for timer ({}s) or manual refresh...",
            config.check_interval_seconds
        );
        tokio::select! {
            _ = sleep(Duration::from_secs(config.check_interval_seconds)) => {
                info!("Timer triggered.");
            }
            _ = refresh_notify.notified() => {
                info!("Manual refresh triggered.");
            }
        }
        info!("Restarting auto-check loop...");
    }
}

/// Re-scrapes one tracked playlist, stores the fresh track set, and notifies
/// the owner of (and downloads) any newly added tracks.
async fn process_playlist(
    user_id: &str,
    playlist_id: &str,
    storage: Arc<Mutex<SqliteStorage>>,
    config: Arc<AppConfig>,
    fetcher: Arc<TrackFetcher>,
    telegram_bot: Arc<TelegramBot>,
) {
    info!("Re-checking playlist {} for user {}", playlist_id, user_id);
    let url = playlist_url(playlist_id);
    let outcome = scraper::scrape_playlist(&config.scraper, &url).await;

    if !outcome.is_success() {
        // A partial set must never overwrite the stored one.
        warn!(
            "Scrape of {} did not complete ({:?}): {}",
            playlist_id,
            outcome.status,
            outcome.message.as_deref().unwrap_or("no detail")
        );
        return;
    }

    let stored = match storage.lock().await.get_playlist_track_ids(user_id, playlist_id) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to load stored tracks for {}: {:?}", playlist_id, e);
            return;
        }
    };

    let new_ids: Vec<String> = outcome.track_ids.difference(&stored).cloned().collect();

    if let Err(e) = storage
        .lock()
        .await
        .update_playlist_tracks(user_id, playlist_id, &outcome.track_ids)
    {
        warn!("Failed to update tracks for {}: {:?}", playlist_id, e);
        return;
    }

    if new_ids.is_empty() {
        info!("No new tracks in {}", playlist_id);
        return;
    }
    info!("{} new tracks in {}", new_ids.len(), playlist_id);

    let chat_id = match user_id.parse::<i64>() {
        Ok(id) => id,
        Err(_) => {
            warn!("User id {} is not a chat id, skipping notification", user_id);
            return;
        }
    };
    if let Err(e) = telegram_bot
        .notify_text(
            chat_id,
            &format!("🆕 {} new tracks in {}!", new_ids.len(), playlist_id),
        )
        .await
    {
        warn!("New-track notification failed: {:?}", e);
    }

    let download_dir = Path::new(&config.download_dir).join(playlist_id);
    for track_id in &new_ids {
        match fetcher.lookup(track_id).await {
            Ok(info) => match fetcher.download(&info, &download_dir).await {
                Ok(path) => {
                    info!("Downloaded {} to {}", info.title, path.display());
                    if let Err(e) = telegram_bot
                        .notify_text(
                            chat_id,
                            &format!("🎵 {} — {} saved.", info.title, info.artists),
                        )
                        .await
                    {
                        warn!("Download notification failed: {:?}", e);
                    }
                }
                Err(e) => warn!("Download of {} failed: {:?}", track_id, e),
            },
            Err(e) => warn!("Lookup of {} failed: {:?}", track_id, e),
        }
    }
}
