use crate::domain::model::Page;
use crate::utils::error::{InventoryError, Result};
use std::future::Future;
use std::ops::ControlFlow;
use tokio_util::sync::CancellationToken;

/// Walks a cursor-paginated collection one page at a time, starting at page 1
/// and following `next_page` until it is 0. The first error aborts the walk.
pub async fn fetch_all_sequential<T, F, Fut>(
    fetch_page: F,
    cancel: &CancellationToken,
) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items: Vec<T> = Vec::new();
    let last_page = walk(fetch_page, cancel, |page_items| {
        items.extend(page_items);
        ControlFlow::Continue(())
    })
    .await?;

    tracing::debug!("Fetched {} items, last page {}", items.len(), last_page);
    Ok(items)
}

/// Like [`fetch_all_sequential`], but stops requesting pages as soon as an
/// item matches `predicate`.
pub async fn find_sequential<T, F, Fut, P>(
    fetch_page: F,
    mut predicate: P,
    cancel: &CancellationToken,
) -> Result<Option<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
    P: FnMut(&T) -> bool,
{
    let mut found = None;
    let last_page = walk(fetch_page, cancel, |page_items| {
        match page_items.into_iter().find(|item| predicate(item)) {
            Some(item) => {
                found = Some(item);
                ControlFlow::Break(())
            }
            None => ControlFlow::Continue(()),
        }
    })
    .await?;

    tracing::debug!(
        "Search stopped at page {} ({})",
        last_page,
        if found.is_some() { "match" } else { "no match" }
    );
    Ok(found)
}

/// Drives the cursor and hands every page to `on_page`. Returns the last page
/// requested.
async fn walk<T, F, Fut, V>(
    mut fetch_page: F,
    cancel: &CancellationToken,
    mut on_page: V,
) -> Result<u32>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
    V: FnMut(Vec<T>) -> ControlFlow<()>,
{
    let mut page = 1;

    loop {
        tracing::debug!("Requesting page {}", page);
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return Err(InventoryError::Cancelled),
            fetched = fetch_page(page) => fetched?,
        };

        if on_page(fetched.items).is_break() {
            return Ok(page);
        }

        match fetched.next_page {
            0 => return Ok(page),
            next_page if next_page <= page => {
                return Err(InventoryError::UnexpectedPagination { page, next_page });
            }
            next_page => page = next_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_follows_cursor_until_exhausted() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requested);

        let items = fetch_all_sequential(
            move |page| {
                log.lock().unwrap().push(page);
                async move {
                    let next_page = if page < 3 { page + 1 } else { 0 };
                    Ok(Page {
                        items: vec![page * 10, page * 10 + 1],
                        next_page,
                    })
                }
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(items, vec![10, 11, 20, 21, 30, 31]);
        assert_eq!(*requested.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_single_page() {
        let items = fetch_all_sequential(
            |_| async { Ok(Page::last(vec!["only"])) },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(items, vec!["only"]);
    }

    #[tokio::test]
    async fn test_error_fails_fast() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<Vec<u32>> = fetch_all_sequential(
            move |page| {
                *counter.lock().unwrap() += 1;
                async move {
                    if page == 2 {
                        Err(InventoryError::UnexpectedStatus {
                            code: 500,
                            expected: 200,
                        })
                    } else {
                        Ok(Page {
                            items: vec![page],
                            next_page: page + 1,
                        })
                    }
                }
            },
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(InventoryError::UnexpectedStatus { code: 500, .. })
        ));
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_non_advancing_cursor_is_rejected() {
        let result: Result<Vec<u32>> = fetch_all_sequential(
            |page| async move {
                Ok(Page {
                    items: vec![page],
                    next_page: 1,
                })
            },
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(InventoryError::UnexpectedPagination {
                page: 1,
                next_page: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_walk() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<Vec<u32>> = fetch_all_sequential(
            |_| async {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Ok(Page::last(vec![1]))
            },
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(InventoryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_find_stops_at_first_match() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requested);

        let found = find_sequential(
            move |page| {
                log.lock().unwrap().push(page);
                async move {
                    Ok(Page {
                        items: vec![page * 10, page * 10 + 1],
                        next_page: page + 1,
                    })
                }
            },
            |item| *item == 21,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(found, Some(21));
        assert_eq!(*requested.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_find_without_match_walks_every_page() {
        let found = find_sequential(
            |page| async move {
                let next_page = if page < 3 { page + 1 } else { 0 };
                Ok(Page {
                    items: vec![page],
                    next_page,
                })
            },
            |item| *item > 3,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(found, None);
    }
}
