//! Page-following driver for queries, scans and counts.
//!
//! Stores hand back one page per call; this module keeps requesting pages
//! until the result set is exhausted or the caller's limit is reached, and
//! throttles requests when a capacity rate limit is set.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use super::{Attributes, Page, PageRequest, Result, StoreError, StoreItem};

/// Boxed page future, the shape `#[async_trait]` methods return.
pub type PageFuture<'a> = Pin<Box<dyn Future<Output = Result<Page>> + Send + 'a>>;

/// Limits applied across all pages of one operation.
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub page_size: Option<usize>,
    pub rate_limit: Option<f64>,
    pub start_key: Option<Attributes>,
}

/// Spaces out page requests so consumed capacity stays under `rate` units/s.
#[derive(Debug)]
struct RateLimiter {
    rate: f64,
    started: Instant,
    consumed: f64,
}

impl RateLimiter {
    fn new(rate: f64) -> Self {
        Self {
            rate,
            started: Instant::now(),
            consumed: 0.0,
        }
    }

    /// Fails when the wait needed for `rate` does not fit in a `Duration`.
    async fn consume(&mut self, units: f64) -> Result<()> {
        self.consumed += units;
        let target = Duration::try_from_secs_f64(self.consumed / self.rate).map_err(|_| {
            StoreError::InvalidData(format!(
                "Rate limit {} is too low for {} consumed capacity units",
                self.rate, self.consumed
            ))
        })?;
        let elapsed = self.started.elapsed();
        if target > elapsed {
            sleep(target - elapsed).await;
        }
        Ok(())
    }
}

/// Walks pages produced by `fetch`, calling `on_page` with each one.
///
/// `on_page` returns how many results the page contributed; walking stops once
/// the running total reaches `pagination.limit`.
async fn walk<'a, F, P>(pagination: Pagination, mut fetch: F, mut on_page: P) -> Result<usize>
where
    F: FnMut(PageRequest) -> PageFuture<'a>,
    P: FnMut(Page, Option<usize>) -> usize,
{
    let mut total = 0;
    if pagination.limit == Some(0) {
        return Ok(total);
    }

    let mut limiter = pagination
        .rate_limit
        .filter(|rate| *rate > 0.0)
        .map(RateLimiter::new);
    let mut start_key = pagination.start_key;

    loop {
        let remaining = pagination.limit.map(|limit| limit - total);
        let page_limit = match (pagination.page_size, remaining) {
            (Some(size), Some(remaining)) => Some(size.min(remaining)),
            (size, remaining) => size.or(remaining),
        };

        let page = fetch(PageRequest {
            exclusive_start_key: start_key.take(),
            limit: page_limit,
        })
        .await?;

        if let Some(limiter) = limiter.as_mut() {
            limiter.consume(page.consumed_capacity).await?;
        }

        let next_key = page.last_evaluated_key.clone();
        total += on_page(page, remaining);

        if pagination.limit.is_some_and(|limit| total >= limit) {
            break;
        }
        match next_key {
            Some(key) => start_key = Some(key),
            None => break,
        }
    }

    Ok(total)
}

/// Collects items across pages.
pub async fn collect_items<'a, F>(pagination: Pagination, fetch: F) -> Result<Vec<StoreItem>>
where
    F: FnMut(PageRequest) -> PageFuture<'a>,
{
    let mut items = Vec::new();
    walk(pagination, fetch, |page, remaining| {
        let mut page_items = page.items;
        if let Some(remaining) = remaining {
            page_items.truncate(remaining);
        }
        let added = page_items.len();
        items.extend(page_items);
        added
    })
    .await?;
    Ok(items)
}

/// Sums match counts across pages.
pub async fn count_items<'a, F>(pagination: Pagination, fetch: F) -> Result<usize>
where
    F: FnMut(PageRequest) -> PageFuture<'a>,
{
    walk(pagination, fetch, |page, remaining| match remaining {
        Some(remaining) => page.count.min(remaining),
        None => page.count,
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};

    use super::*;
    use crate::store::ItemKey;

    fn item(n: i64) -> StoreItem {
        let mut attributes = Attributes::new();
        attributes.insert("id".to_string(), json!(n));
        StoreItem::new(ItemKey::new(n), attributes)
    }

    fn start_of(request: &PageRequest) -> i64 {
        request
            .exclusive_start_key
            .as_ref()
            .and_then(|key| key.get("id"))
            .and_then(Value::as_i64)
            .map(|id| id + 1)
            .unwrap_or(0)
    }

    /// Serves ids `0..total` in pages of at most `max_page` items.
    fn fake_source(
        total: i64,
        max_page: usize,
        requests: Arc<Mutex<Vec<PageRequest>>>,
    ) -> impl FnMut(PageRequest) -> PageFuture<'static> {
        move |request: PageRequest| -> PageFuture<'static> {
            requests.lock().unwrap().push(request.clone());
            let start = start_of(&request);
            let size = request.limit.unwrap_or(max_page).min(max_page) as i64;
            let end = (start + size).min(total);
            let items: Vec<StoreItem> = (start..end).map(item).collect();
            let last = if end < total {
                items.last().map(|i| i.attributes().clone())
            } else {
                None
            };
            let mut page = Page::of_items(items, last);
            page.consumed_capacity = 1.0;
            Box::pin(async move { Ok(page) })
        }
    }

    #[tokio::test]
    async fn test_collect_follows_all_pages() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let items = collect_items(Pagination::default(), fake_source(7, 3, requests.clone()))
            .await
            .unwrap();

        assert_eq!(items.len(), 7);
        assert_eq!(requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_collect_stops_at_limit() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let pagination = Pagination {
            limit: Some(4),
            page_size: Some(3),
            ..Default::default()
        };
        let items = collect_items(pagination, fake_source(10, 10, requests.clone()))
            .await
            .unwrap();

        assert_eq!(items.len(), 4);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].limit, Some(3));
        assert_eq!(requests[1].limit, Some(1));
    }

    #[tokio::test]
    async fn test_zero_limit_fetches_nothing() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let pagination = Pagination {
            limit: Some(0),
            ..Default::default()
        };
        let items = collect_items(pagination, fake_source(10, 10, requests.clone()))
            .await
            .unwrap();

        assert!(items.is_empty());
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_key_is_forwarded() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let mut start = Attributes::new();
        start.insert("id".to_string(), json!(4));
        let pagination = Pagination {
            start_key: Some(start),
            ..Default::default()
        };
        let items = collect_items(pagination, fake_source(8, 10, requests))
            .await
            .unwrap();

        let ids: Vec<i64> = items
            .iter()
            .filter_map(|i| i.get("id").and_then(Value::as_i64))
            .collect();
        assert_eq!(ids, vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn test_count_sums_pages() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let count = count_items(Pagination::default(), fake_source(11, 4, requests))
            .await
            .unwrap();
        assert_eq!(count, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spaces_requests() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let pagination = Pagination {
            page_size: Some(1),
            rate_limit: Some(2.0),
            ..Default::default()
        };
        let started = Instant::now();
        collect_items(pagination, fake_source(4, 1, requests))
            .await
            .unwrap();

        // Four pages at one unit each, two units per second.
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_tiny_rate_limit_is_rejected() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let pagination = Pagination {
            rate_limit: Some(1e-20),
            ..Default::default()
        };
        let err = collect_items(pagination, fake_source(3, 10, requests))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidData(_)));
    }
}
