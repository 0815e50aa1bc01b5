// bot/telegram/listener.rs

use crate::bot::telegram::TelegramBot;
use crate::bot::telegram::command_handler::handle_command;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::{Duration, sleep};

#[derive(Debug, Deserialize)]
struct TelegramApiResponse {
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

/// Polls for Telegram updates and dispatches incoming messages.
pub async fn listen_for_commands(bot: &Arc<TelegramBot>) {
    let url = format!("https://api.telegram.org/bot{}/getUpdates", bot.bot_token);
    loop {
        let current_offset = bot.offset.load(std::sync::atomic::Ordering::SeqCst);
        let response = bot
            .client
            .get(&url)
            .query(&[("offset", (current_offset + 1).to_string()), ("timeout", "30".to_string())])
            .send()
            .await;
        if let Ok(resp) = response {
            if let Ok(api_response) = resp.json::<TelegramApiResponse>().await {
                for update in api_response.result {
                    if let Some(message) = update.message.as_ref() {
                        if let Some(text) = message.text.as_deref() {
                            handle_command(bot, message.chat.id, text).await;
                        }
                    }
                    bot.offset
                        .store(update.update_id + 1, std::sync::atomic::Ordering::SeqCst);
                }
            }
        }
        sleep(Duration::from_secs(1)).await;
    }
}
