// WebDriver-backed track surface (Chrome via a Selenium/chromedriver endpoint).
use crate::model::SurfaceError;
use crate::scraper::traits::TrackSurface;
use std::time::Duration;
use thirtyfour::error::WebDriverError;
use thirtyfour::{By, DesiredCapabilities, WebDriver, WebElement};
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Track rows inside the playlist list container.
const TRACK_LINK_SELECTOR: &str =
    r#"div[data-testid="playlist-tracklist"] a[data-testid="internal-track-link"]"#;
/// Any rendered track link, used as the first-paint probe.
const FIRST_ROW_SELECTOR: &str = r#"a[data-testid="internal-track-link"]"#;

const FIRST_ROW_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct WebdriverSurface {
    driver: WebDriver,
}

impl WebdriverSurface {
    /// Opens a fresh browser session against a WebDriver server
    /// (e.g. `http://localhost:4444`).
    pub async fn open(server_url: &str) -> Result<Self, SurfaceError> {
        let caps = DesiredCapabilities::chrome();
        let driver = WebDriver::new(server_url, caps)
            .await
            .map_err(|e| SurfaceError::SessionLost(e.to_string()))?;
        Ok(Self { driver })
    }

    async fn rows(&self) -> Result<Vec<WebElement>, SurfaceError> {
        self.driver
            .find_all(By::Css(TRACK_LINK_SELECTOR))
            .await
            .map_err(map_webdriver_error)
    }
}

#[async_trait::async_trait]
impl TrackSurface for WebdriverSurface {
    async fn goto(&self, url: &str) -> Result<(), SurfaceError> {
        self.driver
            .goto(url)
            .await
            .map_err(|e| SurfaceError::Navigation(e.to_string()))
    }

    async fn wait_for_first_row(&self, timeout: Duration) -> Result<(), SurfaceError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.driver.find(By::Css(FIRST_ROW_SELECTOR)).await {
                Ok(_) => return Ok(()),
                Err(WebDriverError::NoSuchElement(_)) => {}
                Err(e) => return Err(map_webdriver_error(e)),
            }
            if Instant::now() >= deadline {
                return Err(SurfaceError::FirstRowTimeout(timeout));
            }
            sleep(FIRST_ROW_POLL_INTERVAL).await;
        }
    }

    async fn row_count(&self) -> Result<usize, SurfaceError> {
        Ok(self.rows().await?.len())
    }

    async fn row_href(&self, index: usize) -> Result<Option<String>, SurfaceError> {
        let rows = self.rows().await?;
        let Some(row) = rows.get(index) else {
            // The virtualized list shrank between count and read.
            debug!("row {} no longer rendered", index);
            return Ok(None);
        };
        row.attr("href").await.map_err(map_webdriver_error)
    }

    async fn scroll_row_into_view(&self, index: usize) -> Result<(), SurfaceError> {
        let rows = self.rows().await?;
        match rows.get(index) {
            Some(row) => row.scroll_into_view().await.map_err(map_webdriver_error),
            None => Err(SurfaceError::RowDetached(format!(
                "scroll target {} not rendered",
                index
            ))),
        }
    }

    async fn pause(&self, delay: Duration) {
        sleep(delay).await;
    }

    async fn close(self: Box<Self>) -> Result<(), SurfaceError> {
        self.driver
            .quit()
            .await
            .map_err(|e| SurfaceError::SessionLost(e.to_string()))
    }
}

fn map_webdriver_error(e: WebDriverError) -> SurfaceError {
    match e {
        WebDriverError::NoSuchElement(_) | WebDriverError::StaleElementReference(_) => {
            SurfaceError::RowDetached(e.to_string())
        }
        other => SurfaceError::SessionLost(other.to_string()),
    }
}
