pub mod session;
pub mod traits;
pub mod webdriver;

pub use session::ScrapeSession;
pub use webdriver::WebdriverSurface;

use crate::config::ScraperConfig;
use crate::model::{ScrapeOutcome, ScrapeStatus};
use std::collections::HashSet;

/// Opens a fresh browser session and scrapes the playlist at `url`.
/// A failure to open the session is reported as a `RenderEngineError`
/// outcome; there is no context to tear down in that case.
pub async fn scrape_playlist(config: &ScraperConfig, url: &str) -> ScrapeOutcome {
    match WebdriverSurface::open(&config.webdriver_url).await {
        Ok(surface) => {
            ScrapeSession::new(config.clone())
                .scrape(Box::new(surface), url)
                .await
        }
        Err(err) => ScrapeOutcome::new(
            ScrapeStatus::RenderEngineError,
            HashSet::new(),
            Some(err.to_string()),
        ),
    }
}
