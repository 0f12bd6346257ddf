//! Integration tests for the tracker
//!
//! These tests use wiremock to stand in for the search provider and test
//! the full run cycle end-to-end against an in-memory store.

use rank_tracker::config::{
    ClientConfig, Config, CrawlConfig, OutputConfig, RetryConfig, SearchConfig,
};
use rank_tracker::crawler::{
    build_http_client, Coordinator, FetchOutcome, HttpPageFetcher, PageFetcher, Throttle,
};
use rank_tracker::state::CrawlState;
use rank_tracker::storage::{RunStatus, SqliteStorage, Storage};
use rank_tracker::ProductId;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/api/search";

/// Creates a test configuration pointed at the mock provider
fn create_test_config(base_url: &str, export_dir: &Path) -> Config {
    Config {
        search: SearchConfig {
            endpoint: format!("{}{}", base_url, API_PATH),
            search_page: format!("{}/search", base_url),
            sort: "RECOMMEND".to_string(),
            known_promoted_markers: vec!["AD".to_string()],
        },
        crawl: CrawlConfig {
            page_size: 3,
            max_pages: 2,
            min_delay: 0, // No politeness delay in tests
            max_delay: 0,
            request_timeout: 5,
        },
        retry: RetryConfig {
            max_attempts: 2,
            delay_between_attempts: 0,
        },
        client: ClientConfig::default(),
        output: OutputConfig {
            database_path: ":memory:".to_string(),
            export_dir: export_dir.to_string_lossy().into_owned(),
            channel: "newStore".to_string(),
        },
    }
}

fn fetcher_for(config: &Config) -> HttpPageFetcher {
    let client = build_http_client(&config.client, Duration::from_secs(5))
        .expect("Failed to build client");
    HttpPageFetcher::new(
        client,
        &config.search,
        &config.client.accept_language,
        Throttle::none(),
    )
    .expect("Failed to create fetcher")
}

/// Builds one provider card; `promoted` becomes the card type
fn card(id: u64, page: u32, promoted: Option<&str>) -> Value {
    json!({
        "card": {
            "product": {
                "nvMid": id.to_string(),
                "mallName": format!("store-{}", id),
                "productName": format!("item-{}", id),
                "cardType": promoted,
                "page": page
            }
        }
    })
}

fn body(cards: Vec<Value>, cursor: Option<u64>) -> Value {
    json!({ "data": { "cursor": cursor, "data": cards } })
}

async fn mount_page(server: &MockServer, keyword: &str, cursor: u64, response: Value) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("query", keyword))
        .and(query_param("cursor", cursor.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_decodes_page_and_sends_query() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp.path());

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("query", "blue widget"))
        .and(query_param("cursor", "1"))
        .and(query_param("pageSize", "3"))
        .and(query_param("sort", "RECOMMEND"))
        .and(query_param("searchMethod", "all.basic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(
            vec![card(11, 1, Some("AD")), card(12, 1, None)],
            Some(2),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&config);
    let outcome = fetcher.fetch("blue widget", 1, 3, 1).await;

    match outcome {
        FetchOutcome::Page(page) => {
            assert_eq!(page.items.len(), 2);
            assert_eq!(page.next_cursor, Some(2));
            assert_eq!(page.items[0].identifier, ProductId(11));
            assert_eq!(page.items[0].promoted.as_deref(), Some("AD"));
            assert_eq!(page.items[1].promoted, None);
        }
        other => panic!("expected a page, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_classifies_failures() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp.path());

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("query", "empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(vec![], None)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("query", "broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("query", "blocked"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Access denied</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&config);

    assert_eq!(fetcher.fetch("empty", 1, 3, 1).await, FetchOutcome::EndOfData);
    assert_eq!(
        fetcher.fetch("broken", 1, 3, 1).await,
        FetchOutcome::TransportFailure("HTTP 500".to_string())
    );
    assert!(matches!(
        fetcher.fetch("blocked", 1, 3, 1).await,
        FetchOutcome::DecodeFailure(_)
    ));
}

#[tokio::test]
async fn test_begin_warms_up_search_page() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp.path());

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "widget"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    fetcher_for(&config).begin("widget").await;
}

#[tokio::test]
async fn test_full_run_groups_rows_per_product() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp.path());

    // "alpha": target on the second page, behind a promoted card
    mount_page(
        &mock_server,
        "alpha",
        1,
        body(
            vec![card(1, 1, Some("AD")), card(2, 1, None), card(3, 1, None)],
            Some(2),
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "alpha",
        2,
        body(vec![card(4, 2, None), card(700, 2, None), card(5, 2, None)], Some(3)),
    )
    .await;

    // "beta": target first
    mount_page(&mock_server, "beta", 1, body(vec![card(700, 1, None)], None)).await;

    // "gamma": no results at all
    mount_page(&mock_server, "gamma", 1, body(vec![], None)).await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage.add_tracked_item(ProductId(700), "alpha").unwrap();
    storage.add_tracked_item(ProductId(300), "gamma").unwrap();
    storage.add_tracked_item(ProductId(700), "beta").unwrap();

    let fetcher = fetcher_for(&config);
    let mut coordinator =
        Coordinator::with_parts(config, "test-hash".to_string(), storage, Box::new(fetcher));

    let summary = coordinator.run().await.expect("Run failed");

    assert_eq!(summary.items_total, 3);
    assert_eq!(summary.found, 2);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.batches_flushed, 1);
    assert_eq!(summary.rows_written, 2);
    // alpha resolves 5 entries (stops at the target), beta 1, gamma 0
    assert_eq!(summary.records_resolved, 6);

    let storage = coordinator.into_storage();

    let rows = storage.sheet_rows("700").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].keyword, "alpha");
    assert_eq!(rows[0].rank, "4");
    assert_eq!(rows[0].store, "store-700");
    assert_eq!(rows[0].item, "item-700");
    assert_eq!(rows[1].keyword, "beta");
    assert_eq!(rows[1].rank, "1");

    assert_eq!(storage.sheet_header("300").unwrap(), None);

    let run = storage.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");

    let outcomes = storage.crawl_outcomes(summary.run_id).unwrap();
    assert_eq!(outcomes.get(&CrawlState::Found), Some(&2));
    assert_eq!(outcomes.get(&CrawlState::Exhausted), Some(&1));

    let export = summary.export_path.expect("Expected an export file");
    let text = std::fs::read_to_string(&export).unwrap();
    let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(lines[0], "keyword,no,rank,nvMid,mallName,productName");
    assert_eq!(lines[1], "alpha,1,AD,1,store-1,item-1");
    assert_eq!(lines.len(), 7);
}

#[tokio::test]
async fn test_second_run_appends_after_existing_rows() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp.path());

    mount_page(
        &mock_server,
        "widget",
        1,
        body(vec![card(9, 1, None), card(42, 1, None)], None),
    )
    .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage.add_tracked_item(ProductId(42), "widget").unwrap();

    let mut coordinator = Coordinator::with_parts(
        config.clone(),
        "h".to_string(),
        storage,
        Box::new(fetcher_for(&config)),
    );
    coordinator.run().await.expect("First run failed");

    let storage = coordinator.into_storage();
    let mut coordinator =
        Coordinator::with_parts(config.clone(), "h".to_string(), storage, Box::new(fetcher_for(&config)));
    coordinator.run().await.expect("Second run failed");

    let storage = coordinator.into_storage();
    let rows = storage.sheet_rows("42").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].row_index, 1);
    assert_eq!(rows[1].row_index, 2);
    assert!(rows.iter().all(|r| r.rank == "2"));
}

#[tokio::test]
async fn test_transport_failure_is_retried() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp.path());

    // First request fails, the repeat succeeds
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("query", "flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "flaky", 1, body(vec![card(5, 1, None)], None)).await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage.add_tracked_item(ProductId(5), "flaky").unwrap();

    let fetcher = fetcher_for(&config);
    let mut coordinator =
        Coordinator::with_parts(config, "h".to_string(), storage, Box::new(fetcher));
    let summary = coordinator.run().await.expect("Run failed");

    assert_eq!(summary.found, 1);
    assert_eq!(summary.failed, 0);

    let storage = coordinator.into_storage();
    assert_eq!(storage.sheet_rows("5").unwrap()[0].rank, "1");
}

#[tokio::test]
async fn test_provider_down_marks_item_failed() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp.path());

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(2) // one request per attempt
        .mount(&mock_server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage.add_tracked_item(ProductId(5), "down").unwrap();

    let fetcher = fetcher_for(&config);
    let mut coordinator =
        Coordinator::with_parts(config, "h".to_string(), storage, Box::new(fetcher));
    let summary = coordinator.run().await.expect("Run should still complete");

    assert_eq!(summary.failed, 1);
    assert!(summary.export_path.is_none());

    let storage = coordinator.into_storage();
    assert_eq!(storage.list_sheets().unwrap(), vec![]);
    let run = storage.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}
