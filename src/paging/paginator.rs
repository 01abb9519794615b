// SPDX-License-Identifier: GPL-3.0-only
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::terminology::error::RemoteError;
use crate::terminology::models::Page;

/// Result of draining a paged endpoint. `complete` is false when the
/// wall-clock budget (or a server anomaly like a missing cursor) cut
/// the accumulation short of the reported total.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub complete: bool,
}

/// Drive a search-after cursor until the server-reported total is
/// reached or the wall-clock budget expires. Items are accumulated
/// exactly once each, in server order. Any non-success page fails the
/// whole call.
pub async fn collect_all<T, F, Fut>(
    mut fetch_page: F,
    initial_cursor: Option<String>,
    limit: usize,
    budget: Duration,
) -> Result<Paged<T>, RemoteError>
where
    F: FnMut(Option<String>, usize) -> Fut,
    Fut: Future<Output = Result<Page<T>, RemoteError>>,
{
    let started = Instant::now();
    let mut items: Vec<T> = Vec::new();
    let mut cursor = initial_cursor;

    loop {
        let page = fetch_page(cursor.clone(), limit).await?;
        let fetched = page.items.len();
        let total = page.total;
        items.extend(page.items);
        cursor = page.search_after;

        if fetched == 0 || items.len() as u64 >= total || cursor.is_none() {
            let complete = items.len() as u64 >= total;
            if !complete {
                warn!(
                    collected = items.len(),
                    total, "Server stopped paging before the reported total"
                );
            }
            return Ok(Paged { items, complete });
        }
        if started.elapsed() >= budget {
            warn!(
                collected = items.len(),
                total,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Pagination budget exhausted, returning partial results"
            );
            return Ok(Paged {
                items,
                complete: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    fn scripted_pages(pages: Vec<Page<String>>) -> Arc<Mutex<std::vec::IntoIter<Page<String>>>> {
        Arc::new(Mutex::new(pages.into_iter()))
    }

    fn page(total: u64, items: &[&str], cursor: Option<&str>) -> Page<String> {
        Page {
            total,
            items: items.iter().map(|s| s.to_string()).collect(),
            search_after: cursor.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_accumulates_all_pages_in_server_order() {
        let pages = scripted_pages(vec![
            page(4, &["a", "b"], Some("c1")),
            page(4, &["c", "d"], Some("c2")),
        ]);
        let result = collect_all(
            |_cursor, _limit| {
                let pages = Arc::clone(&pages);
                async move { Ok(pages.lock().unwrap().next().unwrap()) }
            },
            None,
            2,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(result.items, vec!["a", "b", "c", "d"]);
        assert!(result.complete);
    }

    #[tokio::test]
    async fn test_passes_cursor_forward() {
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let pages = scripted_pages(vec![
            page(3, &["a", "b"], Some("next-cursor")),
            page(3, &["c"], None),
        ]);
        let seen_clone = Arc::clone(&seen);
        let result = collect_all(
            move |cursor, _limit| {
                seen_clone.lock().unwrap().push(cursor);
                let pages = Arc::clone(&pages);
                async move { Ok(pages.lock().unwrap().next().unwrap()) }
            },
            None,
            2,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert!(result.complete);
        let cursors = seen.lock().unwrap();
        assert_eq!(*cursors, vec![None, Some("next-cursor".to_string())]);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_marks_incomplete() {
        let pages = scripted_pages(vec![
            page(100, &["a", "b"], Some("c1")),
            page(100, &["c", "d"], Some("c2")),
        ]);
        let result = collect_all(
            |_cursor, _limit| {
                let pages = Arc::clone(&pages);
                async move { Ok(pages.lock().unwrap().next().unwrap()) }
            },
            None,
            2,
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert_eq!(result.items.len(), 2);
        assert!(!result.complete);
    }

    #[tokio::test]
    async fn test_missing_cursor_below_total_is_incomplete() {
        let pages = scripted_pages(vec![page(10, &["a", "b"], None)]);
        let result = collect_all(
            |_cursor, _limit| {
                let pages = Arc::clone(&pages);
                async move { Ok(pages.lock().unwrap().next().unwrap()) }
            },
            None,
            2,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(result.items.len(), 2);
        assert!(!result.complete);
    }

    #[tokio::test]
    async fn test_remote_failure_stops_the_call() {
        let result: Result<Paged<String>, RemoteError> = collect_all(
            |_cursor, _limit| async {
                Err(RemoteError::CallFailed {
                    status: 503,
                    reason: "overloaded".to_string(),
                })
            },
            None,
            2,
            Duration::from_secs(10),
        )
        .await;

        assert!(matches!(
            result,
            Err(RemoteError::CallFailed { status: 503, .. })
        ));
    }
}
