//! Fan-out/fan-in retrieval of every page of a collection whose total size is
//! known up front.
//!
//! One task is spawned per page, but at most `max_in_flight` of them talk to
//! the remote at any time. Pages append into a single pre-sized buffer behind
//! a mutex that is only held for the append. A failed page never aborts its
//! siblings: its items are missing from the result and the failure is
//! reported next to the items that did arrive.
//!
//! Items come back in completion order, not page order. Sort by
//! [`Identity`] when stable output matters.

use crate::core::planner::FetchPlan;
use crate::domain::model::{Identity, PageDescriptor};
use crate::utils::error::{InventoryError, Result};
use std::collections::HashSet;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

#[derive(Debug)]
pub struct PageFailure {
    pub page: u32,
    pub cause: InventoryError,
}

impl From<PageFailure> for InventoryError {
    fn from(failure: PageFailure) -> Self {
        InventoryError::PageFetchFailed {
            page: failure.page,
            source: Box::new(failure.cause),
        }
    }
}

/// Items gathered by a concurrent fetch plus the pages that did not make it.
#[derive(Debug)]
pub struct FetchOutcome<T> {
    pub items: Vec<T>,
    pub failures: Vec<PageFailure>,
}

impl<T> FetchOutcome<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.failures.iter().map(|f| f.page).collect();
        pages.sort_unstable();
        pages
    }

    /// All items, or `PartialFetch` if any page failed.
    pub fn into_complete(self) -> Result<Vec<T>> {
        if self.failures.is_empty() {
            Ok(self.items)
        } else {
            Err(InventoryError::PartialFetch {
                failed_pages: self.failures.len(),
                fetched: self.items.len(),
            })
        }
    }
}

impl<T: Identity> FetchOutcome<T> {
    pub fn sorted_by_id(mut self) -> Self {
        self.items.sort_by_key(Identity::id);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrentFetcher {
    max_in_flight: usize,
    page_timeout: Option<Duration>,
}

impl Default for ConcurrentFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

impl ConcurrentFetcher {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
            page_timeout: None,
        }
    }

    pub fn with_page_timeout(mut self, page_timeout: Option<Duration>) -> Self {
        self.page_timeout = page_timeout;
        self
    }

    /// Fetches pages `1..=ceil(total_count / page_size)` concurrently and
    /// returns once every page task has finished.
    pub async fn fetch_all<T, F, Fut>(
        &self,
        total_count: usize,
        page_size: NonZeroUsize,
        fetch_page: F,
        cancel: &CancellationToken,
    ) -> FetchOutcome<T>
    where
        T: Send + 'static,
        F: Fn(PageDescriptor) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        let plan = FetchPlan::new(total_count, page_size);
        if plan.is_empty() {
            tracing::debug!("Nothing to fetch, total count is 0");
            return FetchOutcome::empty();
        }

        tracing::debug!(
            "Fetching {} items in {} pages of {} ({} in flight)",
            plan.total_count,
            plan.page_count,
            plan.page_size,
            self.max_in_flight
        );

        let fetch_page = Arc::new(fetch_page);
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let items: Arc<Mutex<Vec<T>>> = Arc::new(Mutex::new(Vec::with_capacity(total_count)));

        let mut join_set = JoinSet::new();
        let mut pending = HashSet::with_capacity(plan.page_count);

        for page in plan.pages() {
            let fetch_page = Arc::clone(&fetch_page);
            let permits = Arc::clone(&permits);
            let items = Arc::clone(&items);
            let cancel = cancel.clone();
            let page_timeout = self.page_timeout;

            pending.insert(page.index);
            join_set.spawn(async move {
                let result =
                    run_page(page, fetch_page.as_ref(), &permits, page_timeout, &cancel).await;
                let result = match result {
                    Ok(page_items) => {
                        items.lock().await.extend(page_items);
                        Ok(())
                    }
                    Err(cause) => Err(cause),
                };
                (page.index, result)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((page, Ok(()))) => {
                    pending.remove(&page);
                }
                Ok((page, Err(cause))) => {
                    pending.remove(&page);
                    tracing::warn!("Page {} of {} failed: {}", page, plan.page_count, cause);
                    failures.push(PageFailure { page, cause });
                }
                Err(e) => tracing::error!("Page task panicked: {}", e),
            }
        }

        // Whatever is still pending belongs to a task that panicked.
        for page in pending {
            failures.push(PageFailure {
                page,
                cause: InventoryError::TaskAborted {
                    page,
                    message: "page task panicked".to_string(),
                },
            });
        }

        let items = match Arc::try_unwrap(items) {
            Ok(items) => items.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.lock().await),
        };

        if failures.is_empty() {
            tracing::debug!("Fetched {} items from {} pages", items.len(), plan.page_count);
        } else {
            tracing::warn!(
                "Fetched {} items, {} of {} pages failed",
                items.len(),
                failures.len(),
                plan.page_count
            );
        }

        FetchOutcome { items, failures }
    }
}

async fn run_page<T, F, Fut>(
    page: PageDescriptor,
    fetch_page: &F,
    permits: &Semaphore,
    page_timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<Vec<T>>
where
    F: Fn(PageDescriptor) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let _permit = tokio::select! {
        _ = cancel.cancelled() => return Err(InventoryError::Cancelled),
        permit = permits.acquire() => permit.map_err(|_| InventoryError::Cancelled)?,
    };

    tracing::debug!("Requesting page {}", page.index);
    let call = fetch_page(page);
    let bounded = async {
        match page_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(InventoryError::PageTimedOut {
                    page: page.index,
                    timeout: limit,
                }),
            },
            None => call.await,
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(InventoryError::Cancelled),
        result = bounded => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// Ids `(index - 1) * size + 1 ..` for the page, clipped to `total`.
    fn page_ids(page: PageDescriptor, total: usize) -> Vec<u64> {
        let start = (page.index as usize - 1) * page.size.get();
        let end = (start + page.size.get()).min(total);
        (start + 1..=end).map(|id| id as u64).collect()
    }

    #[tokio::test]
    async fn test_all_pages_succeed() {
        let fetcher = ConcurrentFetcher::new(4);
        let outcome = fetcher
            .fetch_all(
                250,
                size(100),
                |page| async move { Ok(page_ids(page, 250)) },
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.items.len(), 250);
        let ids: HashSet<u64> = outcome.items.into_iter().collect();
        assert_eq!(ids, (1..=250).collect());
    }

    #[tokio::test]
    async fn test_completion_order_does_not_change_membership() {
        let fetcher = ConcurrentFetcher::new(10);
        // later pages answer first
        let outcome = fetcher
            .fetch_all(
                500,
                size(50),
                |page| async move {
                    let delay = 5 * (11 - page.index as u64);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(page_ids(page, 500))
                },
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.items.len(), 500);
        let ids: HashSet<u64> = outcome.items.iter().copied().collect();
        assert_eq!(ids, (1..=500).collect());
    }

    #[tokio::test]
    async fn test_zero_total_spawns_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let outcome: FetchOutcome<u64> = ConcurrentFetcher::default()
            .fetch_all(
                0,
                size(100),
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(Vec::new()) }
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(outcome.items.is_empty());
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_failed_page_keeps_other_pages() {
        let outcome = ConcurrentFetcher::new(3)
            .fetch_all(
                300,
                size(100),
                |page| async move {
                    if page.index == 2 {
                        Err(InventoryError::UnexpectedStatus {
                            code: 502,
                            expected: 200,
                        })
                    } else {
                        Ok(page_ids(page, 300))
                    }
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.items.len(), 200);
        assert_eq!(outcome.failed_pages(), vec![2]);
        assert!(matches!(
            outcome.failures[0].cause,
            InventoryError::UnexpectedStatus { code: 502, .. }
        ));

        let ids: HashSet<u64> = outcome.items.iter().copied().collect();
        assert!(ids.contains(&1) && ids.contains(&300));
        assert!(!ids.contains(&150));

        match outcome.into_complete() {
            Err(InventoryError::PartialFetch {
                failed_pages,
                fetched,
            }) => {
                assert_eq!(failed_pages, 1);
                assert_eq!(fetched, 200);
            }
            other => panic!("expected PartialFetch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_trailing_empty_page_is_harmless() {
        // remote shrank between count and fetch
        let outcome = ConcurrentFetcher::default()
            .fetch_all(
                200,
                size(100),
                |page| async move {
                    if page.index == 2 {
                        Ok(Vec::new())
                    } else {
                        Ok(page_ids(page, 200))
                    }
                },
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.items.len(), 100);
    }

    #[tokio::test]
    async fn test_in_flight_requests_are_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (current, highest) = (Arc::clone(&in_flight), Arc::clone(&peak));

        let outcome = ConcurrentFetcher::new(3)
            .fetch_all(
                20,
                size(1),
                move |page| {
                    let current = Arc::clone(&current);
                    let highest = Arc::clone(&highest);
                    async move {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        highest.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok(vec![page.index])
                    }
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.items.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_hung_page_times_out() {
        let fetcher = ConcurrentFetcher::new(4).with_page_timeout(Some(Duration::from_millis(50)));
        let outcome = fetcher
            .fetch_all(
                30,
                size(10),
                |page| async move {
                    if page.index == 3 {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                    Ok(page_ids(page, 30))
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.items.len(), 20);
        assert_eq!(outcome.failed_pages(), vec![3]);
        assert!(matches!(
            outcome.failures[0].cause,
            InventoryError::PageTimedOut { page: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancellation_releases_join_barrier() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome: FetchOutcome<u64> = ConcurrentFetcher::new(2)
            .fetch_all(
                40,
                size(10),
                |_| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                },
                &cancel,
            )
            .await;

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.failed_pages(), vec![1, 2, 3, 4]);
        assert!(outcome
            .failures
            .iter()
            .all(|f| matches!(f.cause, InventoryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_panicking_page_is_reported() {
        let outcome = ConcurrentFetcher::default()
            .fetch_all(
                30,
                size(10),
                |page| async move {
                    if page.index == 2 {
                        panic!("boom");
                    }
                    Ok(page_ids(page, 30))
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.items.len(), 20);
        assert_eq!(outcome.failed_pages(), vec![2]);
        assert!(matches!(
            outcome.failures[0].cause,
            InventoryError::TaskAborted { page: 2, .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_fifty_pages_with_random_latency_lose_nothing() {
        let outcome = ConcurrentFetcher::new(16)
            .fetch_all(
                50 * 40,
                size(40),
                |page| {
                    let delay = rand::rng().random_range(0..25u64);
                    async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        Ok(page_ids(page, 50 * 40))
                    }
                },
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.items.len(), 2000);
        let ids: HashSet<u64> = outcome.items.iter().copied().collect();
        assert_eq!(ids.len(), 2000);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Item(u64);

    impl Identity for Item {
        fn id(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_sorted_by_id() {
        let outcome = FetchOutcome {
            items: vec![Item(3), Item(1), Item(2)],
            failures: Vec::new(),
        }
        .sorted_by_id();

        assert_eq!(outcome.items, vec![Item(1), Item(2), Item(3)]);
    }

    #[test]
    fn test_page_failure_into_error() {
        let err: InventoryError = PageFailure {
            page: 4,
            cause: InventoryError::Cancelled,
        }
        .into();

        assert!(matches!(err, InventoryError::PageFetchFailed { page: 4, .. }));
    }
}
