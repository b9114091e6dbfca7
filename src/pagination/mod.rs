//! Server-confirmed paging over the list of concluded elections.
//!
//! The election list and its pagination metadata are replaced together, and
//! only by the response to the most recently issued request. Responses to
//! superseded requests are dropped whether they succeeded or failed.

use crate::cache::NameCache;
use crate::model::election::{Election, ElectionId, ElectionPage, InvalidPageSize, PageSize, PaginationState};
use crate::source::{ElectionSource, FetchError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    #[error("Failed to fetch elections: {0}")]
    Fetch(#[from] FetchError),
    #[error("Page numbers start at 1, got {0}")]
    InvalidPage(u32),
    #[error(transparent)]
    InvalidPageSize(#[from] InvalidPageSize),
}

pub type Result<T> = std::result::Result<T, PaginationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// The response was committed; carries the new server state.
    Applied(PaginationState),
    /// A newer request was issued while this one was in flight.
    Superseded,
    /// Nothing to fetch (e.g. `next_page` on the last page).
    Unchanged,
}

struct Committed {
    ticket: u64,
    page: Arc<ElectionPage>,
}

pub struct PaginationController {
    source: Arc<dyn ElectionSource>,
    names: Option<Arc<NameCache>>,
    issued: AtomicU64,
    committed: Mutex<Committed>,
}

impl PaginationController {
    pub fn new(source: Arc<dyn ElectionSource>, page_size: PageSize) -> Self {
        let page = ElectionPage {
            elections: Vec::new(),
            pagination: PaginationState {
                items_per_page: page_size,
                ..PaginationState::default()
            },
        };
        Self {
            source,
            names: None,
            issued: AtomicU64::new(0),
            committed: Mutex::new(Committed {
                ticket: 0,
                page: Arc::new(page),
            }),
        }
    }

    /// Invalidate `names` whenever a new election list is committed.
    pub fn with_name_cache(mut self, names: Arc<NameCache>) -> Self {
        self.names = Some(names);
        self
    }

    fn committed(&self) -> MutexGuard<'_, Committed> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Arc<ElectionPage> {
        Arc::clone(&self.committed().page)
    }

    pub fn pagination(&self) -> PaginationState {
        self.committed().page.pagination
    }

    pub fn election(&self, id: &ElectionId) -> Option<Election> {
        self.committed().page.find(id).cloned()
    }

    /// Fetch `page` at `size` and commit it if no newer request was issued meanwhile.
    pub async fn load(&self, page: u32, size: PageSize) -> Result<PageOutcome> {
        if page == 0 {
            return Err(PaginationError::InvalidPage(page));
        }
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(ticket, page, size = size.get(), "fetching election page");

        let response = self.source.fetch_page(page, size).await;

        if ticket != self.issued.load(Ordering::SeqCst) {
            debug!(ticket, page, "discarding superseded page response");
            return Ok(PageOutcome::Superseded);
        }

        let fetched = response.map_err(|e| {
            warn!(page, error = %e, "election page fetch failed");
            PaginationError::from(e)
        })?;

        let pagination = fetched.pagination;
        {
            let mut committed = self.committed();
            if ticket <= committed.ticket {
                debug!(ticket, page, "discarding stale page response");
                return Ok(PageOutcome::Superseded);
            }
            committed.ticket = ticket;
            committed.page = Arc::new(fetched);
        }
        if let Some(names) = &self.names {
            names.invalidate();
        }
        info!(
            page = pagination.current_page,
            total_pages = pagination.total_pages,
            total_items = pagination.total_items,
            "election page committed"
        );
        Ok(PageOutcome::Applied(pagination))
    }

    pub async fn goto_page(&self, page: u32) -> Result<PageOutcome> {
        let size = self.pagination().items_per_page;
        self.load(page, size).await
    }

    /// Changing the page size starts over at page 1.
    pub async fn set_page_size(&self, size: PageSize) -> Result<PageOutcome> {
        self.load(1, size).await
    }

    pub async fn next_page(&self) -> Result<PageOutcome> {
        let state = self.pagination();
        if !state.has_next {
            return Ok(PageOutcome::Unchanged);
        }
        self.load(state.current_page + 1, state.items_per_page).await
    }

    pub async fn prev_page(&self) -> Result<PageOutcome> {
        let state = self.pagination();
        if !state.has_prev || state.current_page <= 1 {
            return Ok(PageOutcome::Unchanged);
        }
        self.load(state.current_page - 1, state.items_per_page).await
    }

    pub async fn refresh(&self) -> Result<PageOutcome> {
        let state = self.pagination();
        self.load(state.current_page.max(1), state.items_per_page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::election::Candidate;
    use crate::source::fake::FakeSource;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::time::Duration;

    fn elections(n: usize) -> Vec<Election> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Election {
                id: ElectionId::new(format!("e-{}", i + 1)),
                subject: format!("Election {}", i + 1),
                start_time: start + ChronoDuration::days(i as i64),
                end_time: start + ChronoDuration::days(i as i64 + 1),
                candidates: vec![Candidate::new("u-1", i as u64)],
            })
            .collect()
    }

    #[tokio::test]
    async fn commits_page_and_metadata_together() {
        let source = Arc::new(FakeSource::new(elections(30)));
        let controller = PaginationController::new(source, PageSize::Six);

        let outcome = controller.load(2, PageSize::Twelve).await.unwrap();

        let page = controller.snapshot();
        assert!(matches!(outcome, PageOutcome::Applied(s) if s.current_page == 2));
        assert_eq!(page.pagination.current_page, 2);
        assert_eq!(page.pagination.total_pages, 3);
        assert!(page.pagination.has_next && page.pagination.has_prev);
        let ids: Vec<&str> = page.elections.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"e-13"));
        assert_eq!(ids.len(), 12);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched() {
        let source = Arc::new(FakeSource::new(elections(30)));
        let controller = PaginationController::new(source.clone(), PageSize::Six);
        controller.load(1, PageSize::Six).await.unwrap();
        let before = controller.snapshot();

        source.fail_page(2).await;
        let err = controller.next_page().await.unwrap_err();

        assert!(matches!(err, PaginationError::Fetch(FetchError::Network(_))));
        assert_eq!(*controller.snapshot(), *before);
        assert_eq!(controller.pagination().current_page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_for_superseded_request_is_dropped() {
        let source = Arc::new(FakeSource::new(elections(30)));
        source.delay_page(2, Duration::from_millis(500)).await;
        let controller = PaginationController::new(source, PageSize::Six);

        let (slow, fast) = tokio::join!(controller.load(2, PageSize::Six), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            controller.load(3, PageSize::Six).await
        });

        assert_eq!(slow.unwrap(), PageOutcome::Superseded);
        assert!(matches!(fast.unwrap(), PageOutcome::Applied(_)));
        assert_eq!(controller.pagination().current_page, 3);
        assert_eq!(controller.snapshot().elections[0].id, ElectionId::new("e-13"));
    }

    #[tokio::test]
    async fn page_zero_is_rejected_without_fetching() {
        let source = Arc::new(FakeSource::new(elections(3)));
        let controller = PaginationController::new(source.clone(), PageSize::Six);
        let err = controller.goto_page(0).await.unwrap_err();
        assert_eq!(err, PaginationError::InvalidPage(0));
        assert_eq!(source.page_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn next_page_on_last_page_is_unchanged() {
        let source = Arc::new(FakeSource::new(elections(4)));
        let controller = PaginationController::new(source, PageSize::Six);
        controller.refresh().await.unwrap();
        assert_eq!(controller.next_page().await.unwrap(), PageOutcome::Unchanged);
        assert_eq!(controller.prev_page().await.unwrap(), PageOutcome::Unchanged);
    }

    #[tokio::test]
    async fn page_size_change_restarts_at_first_page() {
        let source = Arc::new(FakeSource::new(elections(30)));
        let controller = PaginationController::new(source, PageSize::Six);
        controller.load(3, PageSize::Six).await.unwrap();
        controller.set_page_size(PageSize::TwentyFour).await.unwrap();
        let state = controller.pagination();
        assert_eq!(state.current_page, 1);
        assert_eq!(state.items_per_page, PageSize::TwentyFour);
    }
}
