//! Paginated fetch cursor
//!
//! Backends differ in how they page: Microsoft Graph hands out opaque
//! continuation links with a server-side batch cap, LDAP searches return
//! the whole result set in one pass. Neither supports server-side offset
//! semantics, so the gateway normalizes both to the same shape: accumulate
//! native batches until the requested window is covered, then slice in
//! memory.
//!
//! For backends without a continuation concept the first batch carries
//! everything and the loop body never runs; the cost of deep pages there
//! is one full scan of the result set, not extra round trips.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{DirectoryError, DirectoryResult};

/// Sentinel total count meaning "unknown / not computed".
pub const TOTAL_UNKNOWN: i64 = -1;

/// A 1-based page window request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: u32,
    /// Maximum items per page, at least 1.
    pub page_size: u32,
}

impl PageRequest {
    /// Create a page request. Zero values are normalized up to 1.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Number of items preceding the requested window.
    pub fn skip(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 100)
    }
}

/// One page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// The items of this page, at most `page_size` of them.
    pub items: Vec<T>,
    /// Total matching items: a backend-reported count, the size of the
    /// scanned set, or [`TOTAL_UNKNOWN`].
    pub total_count: i64,
    /// Echo of the requested page number.
    pub page: u32,
    /// Echo of the requested page size.
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Whether a usable total count is present.
    pub fn has_total(&self) -> bool {
        self.total_count >= 0
    }

    /// Map the items of this page, keeping the window metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// One native backend batch.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    /// Records of this batch.
    pub items: Vec<T>,
    /// Opaque token for the next batch, `None` when exhausted.
    pub continuation: Option<String>,
    /// Backend-reported total across all batches, if it offers one.
    pub total: Option<u64>,
}

impl<T> Batch<T> {
    /// A final batch with no continuation and no reported total.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            continuation: None,
            total: None,
        }
    }
}

/// Per-backend batch adapter driven by [`collect_page`].
///
/// Implementations issue requests at the backend's own maximum batch size
/// (a capability constant, not the caller's page size) and surface the
/// backend's native continuation token unchanged.
#[async_trait]
pub trait BatchSource: Send {
    type Item: Send;

    /// Fetch the first batch, requesting a native total count when the
    /// backend supports one.
    async fn fetch_first(&mut self) -> DirectoryResult<Batch<Self::Item>>;

    /// Fetch the batch identified by a continuation token.
    async fn fetch_next(&mut self, continuation: &str) -> DirectoryResult<Batch<Self::Item>>;
}

#[async_trait]
impl<S: BatchSource + ?Sized> BatchSource for &mut S {
    type Item = S::Item;

    async fn fetch_first(&mut self) -> DirectoryResult<Batch<Self::Item>> {
        (**self).fetch_first().await
    }

    async fn fetch_next(&mut self, continuation: &str) -> DirectoryResult<Batch<Self::Item>> {
        (**self).fetch_next(continuation).await
    }
}

/// Run one backend round trip, abandoning its wait when the token fires.
///
/// The connection-established state is unaffected; only this operation's
/// wait is abandoned.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    round_trip: impl std::future::Future<Output = DirectoryResult<T>>,
) -> DirectoryResult<T> {
    tokio::select! {
        () = cancel.cancelled() => Err(DirectoryError::Cancelled),
        result = round_trip => result,
    }
}

/// Accumulate batches until the requested window is satisfied, then slice.
///
/// Cancellation is checked on entry and before every round trip. Any batch
/// fault aborts the whole operation; accumulated items are discarded and
/// no partial page is returned.
pub async fn collect_page<S: BatchSource>(
    mut source: S,
    request: &PageRequest,
    cancel: &CancellationToken,
) -> DirectoryResult<Page<S::Item>> {
    if cancel.is_cancelled() {
        return Err(DirectoryError::Cancelled);
    }

    let skip = request.skip();
    let wanted = skip + request.page_size as usize;

    let first = source.fetch_first().await?;
    let mut total = first.total;
    let mut items = first.items;
    let mut continuation = first.continuation;

    while let Some(token) = continuation.take() {
        if items.len() >= wanted {
            break;
        }
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }

        let batch = source.fetch_next(&token).await?;
        total = total.or(batch.total);
        items.extend(batch.items);
        continuation = batch.continuation;
    }

    // When the backend reported no total, the scan ran to exhaustion or to
    // window satisfaction; the accumulated length is the best lower bound.
    let total_count = total.map_or(items.len() as i64, |t| t as i64);

    let window: Vec<S::Item> = items
        .into_iter()
        .skip(skip)
        .take(request.page_size as usize)
        .collect();

    Ok(Page {
        items: window,
        total_count,
        page: request.page,
        page_size: request.page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory source serving a fixed dataset in fixed-size batches.
    struct FakeSource {
        records: Vec<u32>,
        batch_size: usize,
        report_total: bool,
        fetches: u32,
        fail_on_fetch: Option<u32>,
    }

    impl FakeSource {
        fn new(count: u32, batch_size: usize) -> Self {
            Self {
                records: (0..count).collect(),
                batch_size,
                report_total: false,
                fetches: 0,
                fail_on_fetch: None,
            }
        }

        fn reporting_total(mut self) -> Self {
            self.report_total = true;
            self
        }

        fn failing_on(mut self, fetch: u32) -> Self {
            self.fail_on_fetch = Some(fetch);
            self
        }

        fn batch_at(&mut self, offset: usize) -> DirectoryResult<Batch<u32>> {
            self.fetches += 1;
            if self.fail_on_fetch == Some(self.fetches) {
                return Err(DirectoryError::operation_failed("backend dropped the batch"));
            }

            let end = (offset + self.batch_size).min(self.records.len());
            let items = self.records[offset..end].to_vec();
            let continuation = if end < self.records.len() {
                Some(end.to_string())
            } else {
                None
            };
            Ok(Batch {
                items,
                continuation,
                total: self.report_total.then(|| self.records.len() as u64),
            })
        }
    }

    #[async_trait]
    impl BatchSource for FakeSource {
        type Item = u32;

        async fn fetch_first(&mut self) -> DirectoryResult<Batch<u32>> {
            self.batch_at(0)
        }

        async fn fetch_next(&mut self, continuation: &str) -> DirectoryResult<Batch<u32>> {
            let offset: usize = continuation.parse().unwrap();
            self.batch_at(offset)
        }
    }

    #[test]
    fn test_page_request_skip() {
        assert_eq!(PageRequest::new(1, 10).skip(), 0);
        assert_eq!(PageRequest::new(3, 10).skip(), 20);
        // Zero inputs are normalized, never panic or underflow.
        assert_eq!(PageRequest::new(0, 0).skip(), 0);
    }

    #[tokio::test]
    async fn test_first_page_of_25_records() {
        let source = FakeSource::new(25, 100);
        let page = collect_page(source, &PageRequest::new(1, 10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.items, (0..10).collect::<Vec<_>>());
        assert_eq!(page.total_count, 25);
    }

    #[tokio::test]
    async fn test_last_partial_page_of_25_records() {
        let source = FakeSource::new(25, 100);
        let page = collect_page(source, &PageRequest::new(3, 10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.items, (20..25).collect::<Vec<_>>());
        assert_eq!(page.total_count, 25);
        assert!(page.has_total());
    }

    #[tokio::test]
    async fn test_page_beyond_end_is_empty_with_total() {
        let source = FakeSource::new(25, 100);
        let page = collect_page(source, &PageRequest::new(5, 10), &CancellationToken::new())
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 25);
    }

    #[tokio::test]
    async fn test_never_exceeds_page_size_with_larger_batches() {
        // Backend batch size (50) far above the requested page size (7).
        let source = FakeSource::new(200, 50);
        let page = collect_page(source, &PageRequest::new(2, 7), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.items.len(), 7);
        assert_eq!(page.items, (7..14).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_pagination_idempotence_across_window_shapes() {
        let wide = collect_page(
            FakeSource::new(60, 8),
            &PageRequest::new(1, 20),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        let narrow = collect_page(
            FakeSource::new(60, 8),
            &PageRequest::new(2, 10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(&wide.items[10..20], &narrow.items[..]);
    }

    #[tokio::test]
    async fn test_stops_fetching_once_window_is_covered() {
        // 10 batches exist; page 1 of 10 with batch size 10 needs exactly one.
        let mut source = FakeSource::new(100, 10);
        let page = collect_page(
            &mut source,
            &PageRequest::new(1, 10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(page.items.len(), 10);
        assert_eq!(source.fetches, 1);
    }

    #[tokio::test]
    async fn test_backend_reported_total_wins_over_scan_length() {
        // Window satisfied after the first batch; reported total still 40.
        let source = FakeSource::new(40, 10).reporting_total();
        let page = collect_page(source, &PageRequest::new(1, 5), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_count, 40);
    }

    #[tokio::test]
    async fn test_truncated_scan_total_is_lower_bound() {
        // No reported total and the scan stops early: total reflects what
        // was scanned, not the full 100.
        let source = FakeSource::new(100, 10);
        let page = collect_page(source, &PageRequest::new(1, 10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.total_count, 10);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = collect_page(FakeSource::new(10, 5), &PageRequest::new(1, 10), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Cancelled));
    }

    #[tokio::test]
    async fn test_fault_mid_scan_discards_accumulation() {
        // Second round trip fails; the caller sees the error, not a
        // partial page.
        let source = FakeSource::new(30, 10).failing_on(2);
        let err = collect_page(source, &PageRequest::new(2, 15), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DirectoryError::OperationFailed { .. }));
    }

    #[tokio::test]
    async fn test_single_batch_backend_never_loops() {
        // Linear-scan backend: everything in the first batch, no token.
        let mut source = FakeSource::new(30, 1000);
        let page = collect_page(
            &mut source,
            &PageRequest::new(2, 10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(source.fetches, 1);
        assert_eq!(page.items, (10..20).collect::<Vec<_>>());
        assert_eq!(page.total_count, 30);
    }

    #[tokio::test]
    async fn test_cancellable_aborts_pending_round_trip() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cancellable(&cancel, async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(1u32)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DirectoryError::Cancelled));
    }

    #[test]
    fn test_page_map_keeps_window() {
        let page = Page {
            items: vec![1u32, 2, 3],
            total_count: 9,
            page: 2,
            page_size: 3,
        };
        let mapped = page.map(|n| n.to_string());
        assert_eq!(mapped.items, vec!["1", "2", "3"]);
        assert_eq!(mapped.total_count, 9);
        assert_eq!(mapped.page, 2);
    }
}
