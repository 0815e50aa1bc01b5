pub mod telegram;

pub use telegram::TelegramBot;
