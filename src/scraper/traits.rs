use crate::model::SurfaceError;
use std::time::Duration;

/// The rendering capability a scrape session drives: a lazily-rendered track
/// list that grows as rows are scrolled into view. Implemented by the real
/// WebDriver backend and by scripted fakes in tests.
#[async_trait::async_trait]
pub trait TrackSurface: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), SurfaceError>;

    /// Blocks until at least one track row is rendered, or fails with
    /// `FirstRowTimeout` once the budget expires.
    async fn wait_for_first_row(&self, timeout: Duration) -> Result<(), SurfaceError>;

    /// Number of track rows currently rendered.
    async fn row_count(&self) -> Result<usize, SurfaceError>;

    /// Href of the nth rendered row. `Ok(None)` when the row has no href or
    /// the surface shrank under us.
    async fn row_href(&self, index: usize) -> Result<Option<String>, SurfaceError>;

    /// Scrolls the nth rendered row into view, triggering lazy loading.
    async fn scroll_row_into_view(&self, index: usize) -> Result<(), SurfaceError>;

    /// Gives the surface time to render newly loaded rows.
    async fn pause(&self, delay: Duration);

    /// Releases the rendering context. Consumes the surface.
    async fn close(self: Box<Self>) -> Result<(), SurfaceError>;
}
