// Core structs: ScrapeOutcome, TrackInfo
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Terminal status of one playlist scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStatus {
    Success,
    EmptyOrUnreachableList,
    RenderEngineError,
    Timeout,
    Cancelled,
}

/// Result of one playlist scrape. Non-success outcomes still carry whatever
/// track ids were collected before the scrape stopped.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub status: ScrapeStatus,
    pub track_ids: HashSet<String>,
    pub count: usize,
    pub message: Option<String>,
}

impl ScrapeOutcome {
    pub fn new(status: ScrapeStatus, track_ids: HashSet<String>, message: Option<String>) -> Self {
        let count = track_ids.len();
        Self {
            status,
            track_ids,
            count,
            message,
        }
    }

    pub fn success(track_ids: HashSet<String>) -> Self {
        Self::new(ScrapeStatus::Success, track_ids, None)
    }

    pub fn is_success(&self) -> bool {
        self.status == ScrapeStatus::Success
    }

    /// Timeout and Cancelled are best-effort: the set is genuine progress,
    /// just possibly incomplete.
    pub fn is_partial(&self) -> bool {
        matches!(self.status, ScrapeStatus::Timeout | ScrapeStatus::Cancelled)
    }
}

/// Track metadata as returned by the download API.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub id: String,
    pub title: String,
    pub artists: String,
    pub audio_url: String,
    pub format: String,
    pub duration: Option<String>,
    pub cover_url: Option<String>,
}

/// Failures of the rendering surface behind a scrape session.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("no track rows became visible within {0:?}")]
    FirstRowTimeout(Duration),
    #[error("render session lost: {0}")]
    SessionLost(String),
    #[error("row detached: {0}")]
    RowDetached(String),
}

impl SurfaceError {
    /// Transient errors are absorbed inside a sweep (the row is skipped);
    /// everything else aborts the scrape.
    pub fn is_transient(&self) -> bool {
        matches!(self, SurfaceError::RowDetached(_))
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("missing field in API response: {0}")]
    MissingField(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tag error: {0}")]
    Tag(#[from] id3::Error),
    #[error("tag error: {0}")]
    Mp4Tag(#[from] mp4ameta::Error),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram api error: {0}")]
    ApiError(String),
    #[error("telegram unreachable")]
    Unreachable,
}
