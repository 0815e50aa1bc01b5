// bot/telegram/command_handler.rs

use crate::bot::telegram::TelegramBot;
use crate::model::{ScrapeStatus, StorageError};
use crate::utils::{id_from_url, track_url};
use std::sync::Arc;
use tracing::{info, warn};

/// Handles one incoming message and triggers the corresponding action.
/// Long-running actions (scrapes, downloads) run in spawned tasks so the
/// listener keeps polling.
pub async fn handle_command(bot: &Arc<TelegramBot>, chat_id: i64, text: &str) {
    info!("Handling message from chat {}: {}", chat_id, text);
    let mut parts = text.trim().split_whitespace();
    let command = parts.next().unwrap_or("");
    let arg = parts.next().map(String::from);
    let arg2 = parts.next().map(String::from);

    match command {
        "/start" => {
            reply(
                bot,
                chat_id,
                "Welcome! 👋\nSend me a Spotify track URL to look it up,\n\
                 or track a whole playlist with /add <playlist-url>.\n\
                 See /help for everything I can do.",
            )
            .await;
        }
        "/help" => {
            let help_msg = "📋 Available commands:\n\
                /add <playlist-url> — scrape and track a playlist\n\
                /playlists — your tracked playlists\n\
                /tracks <playlist-id> — tracks of a playlist\n\
                /autocheck <playlist-id> on|off — periodic re-checking\n\
                /remove <playlist-id> — stop tracking\n\
                /refresh — re-check all playlists now\n\
                /ping — check connection\n\
                /uptime — service uptime\n\
                Or just send a Spotify track URL.";
            reply(bot, chat_id, help_msg).await;
        }
        "/ping" => {
            reply(bot, chat_id, "✅ I am online!").await;
        }
        "/uptime" => {
            let uptime = bot.start_time.elapsed();
            let msg = format!(
                "⏱ Uptime: {:02}:{:02}:{:02}",
                uptime.as_secs() / 3600,
                (uptime.as_secs() % 3600) / 60,
                uptime.as_secs() % 60
            );
            reply(bot, chat_id, &msg).await;
        }
        "/refresh" => {
            info!("/refresh received, waking the auto-check loop...");
            bot.refresh_notify.notify_one();
            reply(bot, chat_id, "🔄 Re-checking all tracked playlists...").await;
        }
        "/add" => match arg {
            Some(url) if url.contains("/playlist/") => {
                spawn_add(bot.clone(), chat_id, url);
            }
            _ => {
                reply(bot, chat_id, "Usage: /add <spotify-playlist-url>").await;
            }
        },
        "/playlists" => {
            let listing = bot.storage.lock().await.get_playlist_ids(&chat_id.to_string());
            match listing {
                Ok(ids) if !ids.is_empty() => {
                    let mut msg = String::from("📝 Your playlists:\n");
                    for id in ids {
                        msg.push_str(&format!("🔹 {}\n", id));
                    }
                    reply(bot, chat_id, &msg).await;
                }
                Ok(_) => {
                    reply(bot, chat_id, "📭 No playlists yet. Use /add <playlist-url>.").await;
                }
                Err(e) => {
                    reply(bot, chat_id, &format!("❌ Error: {}", e)).await;
                }
            }
        }
        "/tracks" => match arg {
            Some(playlist_id) => {
                let tracks = bot
                    .storage
                    .lock()
                    .await
                    .get_playlist_track_ids(&chat_id.to_string(), &playlist_id);
                match tracks {
                    Ok(ids) => {
                        let mut msg = format!("🎼 {} tracks in {}:\n", ids.len(), playlist_id);
                        for id in ids.iter().take(25) {
                            msg.push_str(&format!("{}\n", track_url(id)));
                        }
                        if ids.len() > 25 {
                            msg.push_str("…\n");
                        }
                        reply(bot, chat_id, &msg).await;
                    }
                    Err(StorageError::NotFound(_)) => {
                        reply(bot, chat_id, "🤷 That playlist is not tracked.").await;
                    }
                    Err(e) => {
                        reply(bot, chat_id, &format!("❌ Error: {}", e)).await;
                    }
                }
            }
            None => {
                reply(bot, chat_id, "Usage: /tracks <playlist-id>").await;
            }
        },
        "/autocheck" => match (arg, arg2.as_deref()) {
            (Some(playlist_id), Some(flag @ ("on" | "off"))) => {
                let enabled = flag == "on";
                let result = bot
                    .storage
                    .lock()
                    .await
                    .set_auto_check(&chat_id.to_string(), &playlist_id, enabled);
                match result {
                    Ok(()) => {
                        let state = if enabled { "enabled ✅" } else { "disabled 💤" };
                        reply(bot, chat_id, &format!("Auto-check {} for {}.", state, playlist_id))
                            .await;
                    }
                    Err(StorageError::NotFound(_)) => {
                        reply(bot, chat_id, "🤷 That playlist is not tracked.").await;
                    }
                    Err(e) => {
                        reply(bot, chat_id, &format!("❌ Error: {}", e)).await;
                    }
                }
            }
            _ => {
                reply(bot, chat_id, "Usage: /autocheck <playlist-id> on|off").await;
            }
        },
        "/remove" => match arg {
            Some(playlist_id) => {
                let result = bot
                    .storage
                    .lock()
                    .await
                    .delete_playlist(&chat_id.to_string(), &playlist_id);
                match result {
                    Ok(()) => {
                        reply(bot, chat_id, &format!("🗑 Stopped tracking {}.", playlist_id)).await;
                    }
                    Err(StorageError::NotFound(_)) => {
                        reply(bot, chat_id, "🤷 That playlist is not tracked.").await;
                    }
                    Err(e) => {
                        reply(bot, chat_id, &format!("❌ Error: {}", e)).await;
                    }
                }
            }
            None => {
                reply(bot, chat_id, "Usage: /remove <playlist-id>").await;
            }
        },
        other if other.contains("open.spotify.com/track/") => {
            spawn_track_lookup(bot.clone(), chat_id, other.to_string());
        }
        _ => {
            reply(bot, chat_id, "🤷 I don't know that one. Try /help.").await;
        }
    }
}

/// Scrapes the playlist and stores (or refreshes) its track set.
fn spawn_add(bot: Arc<TelegramBot>, chat_id: i64, url: String) {
    tokio::spawn(async move {
        let Some(playlist_id) = id_from_url(&url).map(String::from) else {
            reply(&bot, chat_id, "Usage: /add <spotify-playlist-url>").await;
            return;
        };

        reply(&bot, chat_id, "🔍 Reading the playlist, this can take a while...").await;
        let outcome = crate::scraper::scrape_playlist(&bot.config.scraper, &url).await;

        if !outcome.is_success() {
            let detail = outcome.message.unwrap_or_else(|| "unknown error".to_string());
            let msg = match outcome.status {
                ScrapeStatus::Timeout | ScrapeStatus::Cancelled => format!(
                    "⌛ Scrape stopped early ({} tracks collected so far): {}",
                    outcome.count, detail
                ),
                _ => format!("❌ Could not read the playlist: {}", detail),
            };
            reply(&bot, chat_id, &msg).await;
            return;
        }

        let user_id = chat_id.to_string();
        let msg = {
            let mut storage = bot.storage.lock().await;
            if let Err(e) = storage.add_user(&user_id) {
                warn!("add_user failed: {:?}", e);
            }
            match storage.add_playlist(&user_id, &playlist_id, &outcome.track_ids, true) {
                Ok(()) => format!(
                    "✅ Now tracking {} with {} tracks. Auto-check is on.",
                    playlist_id, outcome.count
                ),
                Err(StorageError::AlreadyExists(_)) => {
                    match storage.update_playlist_tracks(&user_id, &playlist_id, &outcome.track_ids)
                    {
                        Ok(()) => format!(
                            "🔄 {} refreshed, now {} tracks.",
                            playlist_id, outcome.count
                        ),
                        Err(e) => format!("❌ Error: {}", e),
                    }
                }
                Err(e) => format!("❌ Error: {}", e),
            }
        };
        reply(&bot, chat_id, &msg).await;
    });
}

/// Resolves a bare track URL to its metadata, then follows up with lyrics.
fn spawn_track_lookup(bot: Arc<TelegramBot>, chat_id: i64, url: String) {
    tokio::spawn(async move {
        let Some(track_id) = id_from_url(&url).map(String::from) else {
            reply(&bot, chat_id, "🤷 That track URL looks malformed.").await;
            return;
        };
        match bot.fetcher.lookup(&track_id).await {
            Ok(info) => {
                let duration = info.duration.as_deref().unwrap_or("?");
                let msg = format!(
                    "🎵 {}\n👤 {}\n⏱ {}\n🔗 {}",
                    info.title, info.artists, duration, info.audio_url
                );
                reply(&bot, chat_id, &msg).await;
            }
            Err(e) => {
                reply(&bot, chat_id, &format!("❌ Could not fetch that track: {}", e)).await;
                return;
            }
        }
        match bot.fetcher.lyrics(&track_id).await {
            Ok(lyrics) if !lyrics.is_empty() => {
                reply(&bot, chat_id, &format!("📜 Lyrics:\n{}", lyrics)).await;
            }
            Ok(_) => {
                reply(&bot, chat_id, "Lyrics not found! 🤕").await;
            }
            Err(e) => {
                warn!("Lyrics fetch for {} failed: {:?}", track_id, e);
            }
        }
    });
}

async fn reply(bot: &TelegramBot, chat_id: i64, text: &str) {
    if let Err(e) = bot.notify_text(chat_id, text).await {
        warn!("Reply to chat {} failed: {:?}", chat_id, e);
    }
}
