// bot/telegram/sender.rs

use crate::bot::telegram::TelegramBot;
use crate::model::NotifyError;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Sends a plain text message to one chat.
pub async fn send_text(bot: &TelegramBot, chat_id: i64, text: &str) -> Result<(), NotifyError> {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", bot.bot_token);
    let params = [("chat_id", chat_id.to_string()), ("text", text.to_string())];
    let response = match timeout(
        Duration::from_secs(10),
        bot.client.post(&url).form(&params).send(),
    )
    .await
    {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            warn!("❌ Telegram send() failed: {:?}", e);
            return Err(NotifyError::ApiError(format!("Send failed: {}", e)));
        }
        Err(_) => {
            warn!("⏳ Telegram send() timed out");
            return Err(NotifyError::Unreachable);
        }
    };
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_else(|_| "unknown".into());
        warn!("❌ Telegram API responded [{}]: {}", status, body);
        return Err(NotifyError::Unreachable);
    }
    info!("✅ Telegram text sent to chat {}", chat_id);
    Ok(())
}
