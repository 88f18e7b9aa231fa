//! Pagination windowing tests over mocked `@odata.nextLink` batches.

mod common;

use common::*;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

use dirgate_core::page::PageRequest;
use dirgate_core::service::DirectoryService;

/// Serves a fixed sequence of pages, one per request.
struct PaginatedResponder {
    pages: Vec<Value>,
    served: Arc<AtomicU32>,
}

impl Respond for PaginatedResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let index = self.served.fetch_add(1, Ordering::SeqCst) as usize;
        if index < self.pages.len() {
            ResponseTemplate::new(200).set_body_json(self.pages[index].clone())
        } else {
            ResponseTemplate::new(200).set_body_json(odata_page(vec![], None, None))
        }
    }
}

/// Mount `total` users in batches of `batch_size` with count reporting.
async fn mount_batched_users(server: &MockServer, total: usize, batch_size: usize) -> Arc<AtomicU32> {
    let mut pages = Vec::new();
    let mut offset = 0;
    while offset < total {
        let end = (offset + batch_size).min(total);
        let items: Vec<Value> = (offset..end)
            .map(|i| user_json(&format!("u-{i}"), &format!("user{i}")))
            .collect();
        let next = if end < total {
            Some(format!("{}/v1.0/users?$skiptoken=page{}", server.uri(), end))
        } else {
            None
        };
        pages.push(odata_page(items, next, Some(total as u64)));
        offset = end;
    }

    let served = Arc::new(AtomicU32::new(0));
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(PaginatedResponder {
            pages,
            served: Arc::clone(&served),
        })
        .mount(server)
        .await;
    served
}

#[tokio::test]
async fn test_window_spans_backend_batches() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_batched_users(&server, 5, 2).await;

    let service = service_for(&server);
    let page = service
        .users_page_raw(
            "accountEnabled eq true",
            &PageRequest::new(2, 2),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].username, "user2");
    assert_eq!(page.items[1].username, "user3");
    assert_eq!(page.total_count, 5);
    assert_eq!(page.page, 2);
}

#[tokio::test]
async fn test_cursor_stops_once_window_is_covered() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    let served = mount_batched_users(&server, 10, 2).await;

    let service = service_for(&server);
    let page = service
        .users_page_raw(
            "accountEnabled eq true",
            &PageRequest::new(1, 4),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(page.items.len(), 4);
    assert_eq!(page.total_count, 10);
    // Two batches cover skip 0 + size 4; the other three are never fetched.
    assert_eq!(served.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_window_never_exceeds_page_size() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_batched_users(&server, 10, 10).await;

    let service = service_for(&server);
    let page = service
        .users_page_raw(
            "accountEnabled eq true",
            &PageRequest::new(1, 3),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total_count, 10);
}

#[tokio::test]
async fn test_last_partial_page_of_25_records() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_batched_users(&server, 25, 10).await;

    let service = service_for(&server);
    let cancel = CancellationToken::new();

    let first = service
        .users_page_raw("accountEnabled eq true", &PageRequest::new(1, 10), &cancel)
        .await
        .unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.total_count, 25);

    // Fresh responder state for the second window over the same dataset.
    server.reset().await;
    mount_token_endpoint(&server).await;
    mount_batched_users(&server, 25, 10).await;

    let third = service
        .users_page_raw("accountEnabled eq true", &PageRequest::new(3, 10), &cancel)
        .await
        .unwrap();
    assert_eq!(third.items.len(), 5);
    assert_eq!(third.total_count, 25);
}

#[tokio::test]
async fn test_window_beyond_end_is_empty() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_batched_users(&server, 5, 2).await;

    let service = service_for(&server);
    let page = service
        .users_page_raw(
            "accountEnabled eq true",
            &PageRequest::new(10, 10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 5);
}

#[tokio::test]
async fn test_adjacent_windows_tile_the_dataset() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_batched_users(&server, 12, 5).await;

    let service = service_for(&server);
    let cancel = CancellationToken::new();

    let wide = service
        .users_page_raw("accountEnabled eq true", &PageRequest::new(1, 8), &cancel)
        .await
        .unwrap();

    server.reset().await;
    mount_token_endpoint(&server).await;
    mount_batched_users(&server, 12, 5).await;

    let narrow = service
        .users_page_raw("accountEnabled eq true", &PageRequest::new(2, 4), &cancel)
        .await
        .unwrap();

    let wide_ids: Vec<&str> = wide.items[4..8].iter().map(|u| u.external_id.as_str()).collect();
    let narrow_ids: Vec<&str> = narrow.items.iter().map(|u| u.external_id.as_str()).collect();
    assert_eq!(wide_ids, narrow_ids);
}
