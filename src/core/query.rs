//! List controller
//!
//! One generic replacement for the per-page "fetch current page / fetch
//! everything for search / filter client-side / paginate" logic. Server
//! pagination is used while no search is active; a search fetches the
//! full set once and paginates the filtered result locally.

use async_trait::async_trait;

use crate::api::ApiError;

/// Upper bound for any page size sent to the server
pub const MAX_PAGE_SIZE: u32 = 100;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One page of results plus the total across all pages
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Something a list view can page through
#[async_trait]
pub trait ListSource<T>: Send + Sync {
    /// Fetch one page; `page` starts at 1
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page<T>, ApiError>;

    /// Fetch the complete set, used for client-side search
    async fn fetch_all(&self) -> Result<Vec<T>, ApiError>;
}

#[async_trait]
impl<'a, T, S> ListSource<T> for &'a S
where
    T: Send + 'static,
    S: ListSource<T> + ?Sized,
{
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page<T>, ApiError> {
        (**self).fetch_page(page, page_size).await
    }

    async fn fetch_all(&self) -> Result<Vec<T>, ApiError> {
        (**self).fetch_all().await
    }
}

/// Items that can be matched by a free-text search
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;

    /// Case-insensitive substring match over `search_fields`
    fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Static list, paged locally
pub struct VecSource<T> {
    items: Vec<T>,
}

impl<T> VecSource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> ListSource<T> for VecSource<T> {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page<T>, ApiError> {
        Ok(Page {
            items: page_slice(&self.items, page, page_size).to_vec(),
            total: self.items.len() as u64,
        })
    }

    async fn fetch_all(&self) -> Result<Vec<T>, ApiError> {
        Ok(self.items.clone())
    }
}

/// What to show when a fetch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep the last items and expose the error for a retry prompt
    #[default]
    RetryPanel,
    /// Show an empty list and only log the error
    SilentEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed { error: ApiError },
    /// Search results arrived after a newer search started; ignored
    Stale,
}

/// Handle for an in-flight search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    term: String,
}

impl SearchTicket {
    pub fn term(&self) -> &str {
        &self.term
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Server,
    Search { term: String },
}

pub struct ListController<T, S> {
    source: S,
    policy: FailurePolicy,
    page: u32,
    page_size: u32,
    total: u64,
    items: Vec<T>,
    mode: Mode,
    /// Filtered full set while searching
    matches: Vec<T>,
    generation: u64,
    error: Option<String>,
}

impl<T, S> ListController<T, S>
where
    T: Searchable + Clone + Send,
    S: ListSource<T>,
{
    pub fn new(source: S, page_size: u32, policy: FailurePolicy) -> Self {
        Self {
            source,
            policy,
            page: 1,
            page_size: clamp_page_size(page_size),
            total: 0,
            items: Vec::new(),
            mode: Mode::Server,
            matches: Vec::new(),
            generation: 0,
            error: None,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total, self.page_size)
    }

    /// Error to display in a retry panel, if the last load failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn search_term(&self) -> Option<&str> {
        match &self.mode {
            Mode::Search { term } => Some(term),
            Mode::Server => None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Load page `page` (1-based) in the current mode
    pub async fn load_page(&mut self, page: u32) -> LoadOutcome {
        let page = page.max(1);
        match self.mode {
            Mode::Server => match self.source.fetch_page(page, self.page_size).await {
                Ok(result) => {
                    self.page = page;
                    self.total = result.total;
                    self.items = result.items;
                    self.error = None;
                    LoadOutcome::Loaded
                }
                Err(e) => self.fail(e),
            },
            Mode::Search { .. } => {
                self.page = page.min(self.total_pages());
                self.items = page_slice(&self.matches, self.page, self.page_size).to_vec();
                LoadOutcome::Loaded
            }
        }
    }

    pub async fn reload(&mut self) -> LoadOutcome {
        self.load_page(self.page).await
    }

    pub async fn next_page(&mut self) -> LoadOutcome {
        if !self.has_next() {
            return LoadOutcome::Loaded;
        }
        self.load_page(self.page + 1).await
    }

    pub async fn prev_page(&mut self) -> LoadOutcome {
        if !self.has_prev() {
            return LoadOutcome::Loaded;
        }
        self.load_page(self.page - 1).await
    }

    /// Change page size and return to page 1
    pub async fn set_page_size(&mut self, page_size: u32) -> LoadOutcome {
        self.page_size = clamp_page_size(page_size);
        if let Mode::Search { .. } = self.mode {
            self.total = self.matches.len() as u64;
        }
        self.load_page(1).await
    }

    /// Search, or return to server pagination when `term` is blank
    pub async fn search(&mut self, term: &str) -> LoadOutcome {
        let ticket = self.begin_search(term);
        if ticket.term.is_empty() {
            self.mode = Mode::Server;
            self.matches.clear();
            return self.load_page(1).await;
        }
        let result = self.source.fetch_all().await;
        self.complete_search(ticket, result)
    }

    /// Start a search; any ticket issued earlier becomes stale
    pub fn begin_search(&mut self, term: &str) -> SearchTicket {
        self.generation += 1;
        SearchTicket {
            generation: self.generation,
            term: term.trim().to_string(),
        }
    }

    /// Apply results for `ticket` unless a newer search has started
    pub fn complete_search(
        &mut self,
        ticket: SearchTicket,
        result: Result<Vec<T>, ApiError>,
    ) -> LoadOutcome {
        if ticket.generation != self.generation {
            tracing::debug!("Discarding stale results for search '{}'", ticket.term);
            return LoadOutcome::Stale;
        }

        match result {
            Ok(all) => {
                self.matches = all.into_iter().filter(|item| item.matches(&ticket.term)).collect();
                self.total = self.matches.len() as u64;
                self.page = 1;
                self.items = page_slice(&self.matches, 1, self.page_size).to_vec();
                self.mode = Mode::Search { term: ticket.term };
                self.error = None;
                LoadOutcome::Loaded
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: ApiError) -> LoadOutcome {
        tracing::warn!("List fetch failed: {}", error);
        match self.policy {
            FailurePolicy::RetryPanel => {
                self.error = Some(error.to_string());
            }
            FailurePolicy::SilentEmpty => {
                self.items.clear();
                self.matches.clear();
                self.total = 0;
                self.page = 1;
                self.error = None;
            }
        }
        LoadOutcome::Failed { error }
    }
}

pub fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Number of pages, never less than 1
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Items of 1-based `page`; empty past the end
pub fn page_slice<T>(items: &[T], page: u32, page_size: u32) -> &[T] {
    let page_size = page_size.max(1) as usize;
    let start = (page.max(1) as usize - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = (start + page_size).min(items.len());
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(String);

    impl Searchable for Row {
        fn search_fields(&self) -> Vec<&str> {
            vec![self.0.as_str()]
        }
    }

    fn rows(n: usize) -> Vec<Row> {
        (1..=n).map(|i| Row(format!("row-{:02}", i))).collect()
    }

    /// Source that can be told to fail, counting calls
    struct FlakySource {
        inner: VecSource<Row>,
        failing: bool,
        all_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ListSource<Row> for FlakySource {
        async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page<Row>, ApiError> {
            if self.failing {
                return Err(ApiError::network("offline"));
            }
            self.inner.fetch_page(page, page_size).await
        }

        async fn fetch_all(&self) -> Result<Vec<Row>, ApiError> {
            self.all_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(ApiError::new(500, "boom"));
            }
            self.inner.fetch_all().await
        }
    }

    fn flaky(failing: bool) -> (FlakySource, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FlakySource {
            inner: VecSource::new(rows(25)),
            failing,
            all_calls: Arc::clone(&calls),
        };
        (source, calls)
    }

    #[test]
    fn test_server_pagination() {
        tokio_test::block_on(async {
            let mut list = ListController::new(VecSource::new(rows(25)), 10, FailurePolicy::RetryPanel);
            assert_eq!(list.load_page(1).await, LoadOutcome::Loaded);
            assert_eq!(list.items().len(), 10);
            assert_eq!(list.total_pages(), 3);
            assert!(!list.has_prev());

            list.next_page().await;
            list.next_page().await;
            assert_eq!(list.page(), 3);
            assert_eq!(list.items().len(), 5);

            // already on the last page
            list.next_page().await;
            assert_eq!(list.page(), 3);

            list.prev_page().await;
            assert_eq!(list.items()[0], Row("row-11".into()));
        });
    }

    #[test]
    fn test_search_filters_and_paginates_locally() {
        tokio_test::block_on(async {
            let (source, calls) = flaky(false);
            let mut list = ListController::new(source, 5, FailurePolicy::RetryPanel);

            assert_eq!(list.search("ROW-1").await, LoadOutcome::Loaded);
            // row-10 .. row-19
            assert_eq!(list.total(), 10);
            assert_eq!(list.items().len(), 5);
            assert_eq!(list.search_term(), Some("ROW-1"));

            list.next_page().await;
            assert_eq!(list.items()[0], Row("row-15".into()));
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            list.search("  ").await;
            assert_eq!(list.search_term(), None);
            assert_eq!(list.total(), 25);
            assert_eq!(list.page(), 1);
        });
    }

    #[test]
    fn test_page_size_is_clamped() {
        tokio_test::block_on(async {
            let mut list = ListController::new(VecSource::new(rows(3)), 0, FailurePolicy::RetryPanel);
            assert_eq!(list.page_size(), 1);
            list.set_page_size(10_000).await;
            assert_eq!(list.page_size(), MAX_PAGE_SIZE);
            assert_eq!(list.items().len(), 3);
        });
    }

    #[test]
    fn test_retry_panel_keeps_items_and_reports_error() {
        tokio_test::block_on(async {
            let (source, _) = flaky(false);
            let mut list = ListController::new(source, 10, FailurePolicy::RetryPanel);
            list.load_page(1).await;
            list.source.failing = true;

            let outcome = list.load_page(2).await;
            assert!(matches!(outcome, LoadOutcome::Failed { .. }));
            assert_eq!(list.items().len(), 10);
            assert_eq!(list.page(), 1);
            assert!(list.error().unwrap().contains("offline"));
        });
    }

    #[test]
    fn test_silent_empty_clears_items() {
        tokio_test::block_on(async {
            let (source, _) = flaky(true);
            let mut list = ListController::new(source, 10, FailurePolicy::SilentEmpty);

            let outcome = list.search("row").await;
            assert!(matches!(outcome, LoadOutcome::Failed { .. }));
            assert!(list.items().is_empty());
            assert_eq!(list.total(), 0);
            assert!(list.error().is_none());
        });
    }

    #[test]
    fn test_stale_search_results_are_discarded() {
        let mut list = ListController::new(VecSource::new(rows(25)), 10, FailurePolicy::RetryPanel);

        let older = list.begin_search("row-0");
        let newer = list.begin_search("row-2");

        assert_eq!(list.complete_search(newer, Ok(rows(25))), LoadOutcome::Loaded);
        assert_eq!(list.total(), 6);

        assert_eq!(list.complete_search(older, Ok(rows(25))), LoadOutcome::Stale);
        assert_eq!(list.search_term(), Some("row-2"));
        assert_eq!(list.total(), 6);
    }

    #[test]
    fn test_helpers() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        let items = [1, 2, 3];
        assert_eq!(page_slice(&items, 2, 2), &[3]);
        assert!(page_slice(&items, 5, 2).is_empty());
    }
}
