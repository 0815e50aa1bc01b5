// Incremental convergent scrape of a lazily-rendered track list.
//
// The surface exposes no total count and no "end of list" event. The only
// usable signal of exhaustion is a fixed point: a scroll-and-wait cycle that
// produces zero growth in the rendered-row count. The session scrolls the
// last rendered row into view, waits for the surface to settle, re-counts,
// and converges once the count stops moving for `quiet_rounds` cycles.

use crate::config::ScraperConfig;
use crate::model::{ScrapeOutcome, ScrapeStatus, SurfaceError};
use crate::scraper::traits::TrackSurface;
use crate::utils::id_from_url;
use std::collections::HashSet;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

pub struct ScrapeSession {
    config: ScraperConfig,
}

impl ScrapeSession {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    /// Scrapes the complete set of track ids from the playlist at `url`.
    /// The surface is released on every exit path, including timeout.
    pub async fn scrape(&self, surface: Box<dyn TrackSurface>, url: &str) -> ScrapeOutcome {
        self.run(surface, url, None).await
    }

    /// Like [`scrape`](Self::scrape), but abandons the loop at the next
    /// suspension point once `cancel` is notified. The partial set collected
    /// so far is returned with status `Cancelled`.
    pub async fn scrape_with_cancel(
        &self,
        surface: Box<dyn TrackSurface>,
        url: &str,
        cancel: &Notify,
    ) -> ScrapeOutcome {
        self.run(surface, url, Some(cancel)).await
    }

    async fn run(
        &self,
        surface: Box<dyn TrackSurface>,
        url: &str,
        cancel: Option<&Notify>,
    ) -> ScrapeOutcome {
        let mut collected: HashSet<String> = HashSet::new();

        // The drive future borrows `collected`, so whatever was inserted
        // before a timeout or cancellation survives the future being dropped.
        let verdict = {
            let drive = self.drive(surface.as_ref(), url, &mut collected);
            tokio::pin!(drive);
            let supervised = async {
                match cancel {
                    Some(cancel) => tokio::select! {
                        res = &mut drive => Some(res),
                        _ = cancel.notified() => None,
                    },
                    None => Some(drive.as_mut().await),
                }
            };
            match self.config.overall_timeout() {
                Some(budget) => tokio::time::timeout(budget, supervised).await,
                None => Ok(supervised.await),
            }
        };

        let outcome = match verdict {
            Err(_) => {
                warn!("scrape of {} exceeded its overall budget", url);
                ScrapeOutcome::new(
                    ScrapeStatus::Timeout,
                    collected,
                    Some("overall scrape budget exceeded".to_string()),
                )
            }
            Ok(None) => {
                info!("scrape of {} cancelled by caller", url);
                ScrapeOutcome::new(
                    ScrapeStatus::Cancelled,
                    collected,
                    Some("scrape cancelled".to_string()),
                )
            }
            Ok(Some(Ok(()))) => {
                info!("scrape of {} converged with {} tracks", url, collected.len());
                ScrapeOutcome::success(collected)
            }
            Ok(Some(Err(err))) => {
                warn!("scrape of {} failed: {}", url, err);
                let status = match err {
                    SurfaceError::FirstRowTimeout(_) => ScrapeStatus::EmptyOrUnreachableList,
                    _ => ScrapeStatus::RenderEngineError,
                };
                ScrapeOutcome::new(status, collected, Some(err.to_string()))
            }
        };

        if let Err(err) = surface.close().await {
            warn!("failed to release render session: {}", err);
        }
        outcome
    }

    async fn drive(
        &self,
        surface: &dyn TrackSurface,
        url: &str,
        collected: &mut HashSet<String>,
    ) -> Result<(), SurfaceError> {
        surface.goto(url).await?;
        surface.wait_for_first_row(self.config.initial_wait()).await?;

        let required_quiet = self.config.quiet_rounds.max(1);
        let mut last_count = 0usize;
        let mut quiet_rounds = 0u32;

        loop {
            let current = self.sweep(surface, collected).await?;
            if current == last_count {
                quiet_rounds += 1;
                if quiet_rounds >= required_quiet {
                    debug!("converged at {} rendered rows", current);
                    break;
                }
            } else {
                quiet_rounds = 0;
                last_count = current;
            }

            if current > 0 {
                if let Err(err) = surface.scroll_row_into_view(current - 1).await {
                    if err.is_transient() {
                        debug!("scroll target detached, retrying next round: {}", err);
                    } else {
                        return Err(err);
                    }
                }
            }
            surface.pause(self.config.scroll_settle()).await;
        }

        // Rows rendered by the very last scroll may never have been swept:
        // the loop exits on the no-growth check before folding them in.
        self.sweep(surface, collected).await?;
        Ok(())
    }

    /// One extraction pass over the currently rendered rows. Returns the
    /// rendered-row count, which is the loop's progress signal (a render
    /// pass may re-render rows already collected, so the deduplicated total
    /// says nothing about growth).
    async fn sweep(
        &self,
        surface: &dyn TrackSurface,
        collected: &mut HashSet<String>,
    ) -> Result<usize, SurfaceError> {
        let count = surface.row_count().await?;
        for index in 0..count {
            match surface.row_href(index).await {
                Ok(Some(href)) => {
                    if let Some(id) = id_from_url(&href) {
                        collected.insert(id.to_string());
                    }
                }
                Ok(None) => {}
                Err(err) if err.is_transient() => {
                    debug!("row {} vanished mid-pass, skipping: {}", index, err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeState {
        stage: usize,
        row_count_calls: usize,
    }

    /// Counters observable after the surface has been consumed by a scrape.
    struct Probe {
        closed: Arc<AtomicUsize>,
        scrolls: Arc<AtomicUsize>,
    }

    /// Scripted surface: `stages[i]` is the list of rendered hrefs after i
    /// scrolls. Scrolling past the last stage is a no-op (plateau).
    struct FakeSurface {
        stages: Vec<Vec<String>>,
        /// When set, the surface ignores scrolls and instead jumps to the
        /// final stage right after this many `row_count` calls — rows that
        /// appear between the convergence check and loop exit.
        grow_after_count_calls: Option<usize>,
        fail_goto: bool,
        first_row_renders: bool,
        fail_row_count_at_call: Option<usize>,
        transient_row: Option<usize>,
        settle_sleeps: bool,
        state: Mutex<FakeState>,
        closed: Arc<AtomicUsize>,
        scrolls: Arc<AtomicUsize>,
    }

    impl FakeSurface {
        fn new(stages: Vec<Vec<&str>>) -> (Self, Probe) {
            let probe = Probe {
                closed: Arc::new(AtomicUsize::new(0)),
                scrolls: Arc::new(AtomicUsize::new(0)),
            };
            let surface = Self {
                stages: stages
                    .into_iter()
                    .map(|s| s.into_iter().map(String::from).collect())
                    .collect(),
                grow_after_count_calls: None,
                fail_goto: false,
                first_row_renders: true,
                fail_row_count_at_call: None,
                transient_row: None,
                settle_sleeps: false,
                state: Mutex::new(FakeState::default()),
                closed: probe.closed.clone(),
                scrolls: probe.scrolls.clone(),
            };
            (surface, probe)
        }

        /// A surface that renders one more row per scroll, for far longer
        /// than any test budget allows.
        fn endless() -> (Self, Probe) {
            let stages: Vec<Vec<String>> = (0..64)
                .map(|n| (0..=n).map(|i| format!("/track/t{i}")).collect())
                .collect();
            let (mut surface, probe) = Self::new(vec![]);
            surface.stages = stages;
            surface.settle_sleeps = true;
            (surface, probe)
        }

        fn rendered(&self) -> Vec<String> {
            let state = self.state.lock().unwrap();
            self.stages[state.stage].clone()
        }
    }

    #[async_trait::async_trait]
    impl TrackSurface for FakeSurface {
        async fn goto(&self, url: &str) -> Result<(), SurfaceError> {
            if self.fail_goto {
                return Err(SurfaceError::Navigation(format!("cannot reach {url}")));
            }
            Ok(())
        }

        async fn wait_for_first_row(&self, timeout: Duration) -> Result<(), SurfaceError> {
            if !self.first_row_renders {
                return Err(SurfaceError::FirstRowTimeout(timeout));
            }
            Ok(())
        }

        async fn row_count(&self) -> Result<usize, SurfaceError> {
            let mut state = self.state.lock().unwrap();
            state.row_count_calls += 1;
            if self.fail_row_count_at_call == Some(state.row_count_calls) {
                return Err(SurfaceError::SessionLost("tab crashed".to_string()));
            }
            if let Some(after) = self.grow_after_count_calls {
                if state.row_count_calls > after {
                    state.stage = self.stages.len() - 1;
                }
            }
            Ok(self.stages[state.stage].len())
        }

        async fn row_href(&self, index: usize) -> Result<Option<String>, SurfaceError> {
            if self.transient_row == Some(index) {
                return Err(SurfaceError::RowDetached(format!("row {index} went stale")));
            }
            Ok(self.rendered().get(index).cloned())
        }

        async fn scroll_row_into_view(&self, _index: usize) -> Result<(), SurfaceError> {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
            let mut state = self.state.lock().unwrap();
            if self.grow_after_count_calls.is_none() && state.stage + 1 < self.stages.len() {
                state.stage += 1;
            }
            Ok(())
        }

        async fn pause(&self, delay: Duration) {
            if self.settle_sleeps {
                tokio::time::sleep(delay).await;
            }
        }

        async fn close(self: Box<Self>) -> Result<(), SurfaceError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn session() -> ScrapeSession {
        ScrapeSession::new(ScraperConfig::default())
    }

    fn ids(outcome: &ScrapeOutcome) -> Vec<String> {
        let mut v: Vec<String> = outcome.track_ids.iter().cloned().collect();
        v.sort();
        v
    }

    #[tokio::test]
    async fn collects_all_rows_across_growth() {
        // [a,b,c] pre-rendered, [d,e] appended after the first scroll.
        let (surface, probe) = FakeSurface::new(vec![
            vec!["/track/a", "/track/b", "/track/c"],
            vec!["/track/a", "/track/b", "/track/c", "/track/d", "/track/e"],
        ]);
        let outcome = session().scrape(Box::new(surface), "https://x/playlist/p").await;

        assert_eq!(outcome.status, ScrapeStatus::Success);
        assert_eq!(outcome.count, 5);
        assert_eq!(ids(&outcome), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reextraction_never_duplicates() {
        // The same ids re-rendered (and repeated) across passes collapse.
        let (surface, _probe) = FakeSurface::new(vec![
            vec!["/track/x", "/track/x", "/track/y"],
            vec!["/track/y", "/track/x", "/track/z", "/track/x"],
        ]);
        let outcome = session().scrape(Box::new(surface), "u").await;

        assert_eq!(outcome.status, ScrapeStatus::Success);
        assert_eq!(outcome.count, 3);
        assert_eq!(outcome.count, outcome.track_ids.len());
        assert_eq!(ids(&outcome), vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn terminates_once_growth_stops() {
        // Growth stops after 2 scrolls; one confirming scroll, then done.
        let (surface, probe) = FakeSurface::new(vec![
            vec!["/track/a"],
            vec!["/track/a", "/track/b"],
            vec!["/track/a", "/track/b", "/track/c"],
        ]);
        let outcome = session().scrape(Box::new(surface), "u").await;

        assert_eq!(outcome.status, ScrapeStatus::Success);
        assert_eq!(outcome.count, 3);
        assert_eq!(probe.scrolls.load(Ordering::SeqCst), 3);
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn final_pass_catches_rows_rendered_at_loop_exit() {
        // The surface grows exactly once more right as convergence is
        // declared: only the mandatory final sweep can see row d.
        let (mut surface, _probe) = FakeSurface::new(vec![
            vec!["/track/a", "/track/b", "/track/c"],
            vec!["/track/a", "/track/b", "/track/c", "/track/d"],
        ]);
        surface.grow_after_count_calls = Some(2);
        let outcome = session().scrape(Box::new(surface), "u").await;

        assert_eq!(outcome.status, ScrapeStatus::Success);
        assert_eq!(ids(&outcome), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn unreachable_list_fails_fast_with_empty_set() {
        let (mut surface, probe) = FakeSurface::new(vec![vec![]]);
        surface.first_row_renders = false;
        let outcome = session().scrape(Box::new(surface), "u").await;

        assert_eq!(outcome.status, ScrapeStatus::EmptyOrUnreachableList);
        assert!(outcome.track_ids.is_empty());
        assert_eq!(outcome.count, 0);
        assert!(outcome.message.is_some());
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn navigation_failure_is_a_render_engine_error() {
        let (mut surface, probe) = FakeSurface::new(vec![vec!["/track/a"]]);
        surface.fail_goto = true;
        let outcome = session().scrape(Box::new(surface), "u").await;

        assert_eq!(outcome.status, ScrapeStatus::RenderEngineError);
        assert!(outcome.track_ids.is_empty());
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn session_loss_mid_loop_keeps_partial_set() {
        let (mut surface, probe) = FakeSurface::new(vec![
            vec!["/track/a"],
            vec!["/track/a", "/track/b"],
        ]);
        surface.fail_row_count_at_call = Some(2);
        let outcome = session().scrape(Box::new(surface), "u").await;

        assert_eq!(outcome.status, ScrapeStatus::RenderEngineError);
        assert_eq!(ids(&outcome), vec!["a"]);
        assert_eq!(outcome.count, 1);
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn detached_rows_are_skipped_not_fatal() {
        let (mut surface, _probe) = FakeSurface::new(vec![
            vec!["/track/a", "/track/b", "/track/c"],
        ]);
        surface.transient_row = Some(1);
        let outcome = session().scrape(Box::new(surface), "u").await;

        assert_eq!(outcome.status, ScrapeStatus::Success);
        assert_eq!(ids(&outcome), vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn overall_timeout_yields_partial_set() {
        let (surface, probe) = FakeSurface::endless();
        let config = ScraperConfig {
            overall_timeout_ms: Some(3_500),
            ..ScraperConfig::default()
        };
        let outcome = ScrapeSession::new(config).scrape(Box::new(surface), "u").await;

        assert_eq!(outcome.status, ScrapeStatus::Timeout);
        assert!(!outcome.track_ids.is_empty());
        assert_eq!(outcome.count, outcome.track_ids.len());
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop_and_still_tears_down() {
        let (surface, probe) = FakeSurface::endless();
        let cancel = Notify::new();
        cancel.notify_one();
        let outcome = session()
            .scrape_with_cancel(Box::new(surface), "u", &cancel)
            .await;

        assert_eq!(outcome.status, ScrapeStatus::Cancelled);
        assert_eq!(outcome.count, outcome.track_ids.len());
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn extra_quiet_rounds_delay_convergence() {
        let (surface, _probe) = FakeSurface::new(vec![
            vec!["/track/a"],
            vec!["/track/a", "/track/b"],
        ]);
        let config = ScraperConfig { quiet_rounds: 2, ..ScraperConfig::default() };
        let outcome = ScrapeSession::new(config).scrape(Box::new(surface), "u").await;

        assert_eq!(outcome.status, ScrapeStatus::Success);
        assert_eq!(ids(&outcome), vec!["a", "b"]);
    }
}
