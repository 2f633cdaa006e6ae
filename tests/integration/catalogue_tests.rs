//! Integration tests for the catalogue clients
//!
//! These tests use wiremock to stand in for a CKAN action API and for a
//! WebDriver endpoint.

use catalogue_scanner::catalogue::{
    ApiCatalogue, BrowserCatalogue, CatalogueClient, CatalogueError, Source, SourceProfile,
    WebDriverSession,
};
use catalogue_scanner::session::{HttpSession, RetryPolicy};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACTION_PATH: &str = "/api/3/action";

fn profile(base_url: &str, source: Source) -> SourceProfile {
    SourceProfile::new(
        source,
        format!("{}{}", base_url, ACTION_PATH),
        format!("{}/dataset/{{dataset}}", base_url),
        format!("{}/dataset/{{dataset}}/resource/{{resource}}", base_url),
    )
}

fn api_catalogue(mock_server: &MockServer) -> ApiCatalogue {
    ApiCatalogue::new(
        profile(&mock_server.uri(), Source::Registry),
        HttpSession::with_client(reqwest::Client::new(), RetryPolicy::none()),
    )
}

fn action(name: &str) -> String {
    format!("{}/{}", ACTION_PATH, name)
}

fn search_page(start: usize, len: usize, count: usize) -> serde_json::Value {
    let results: Vec<_> = (start..start + len)
        .map(|i| json!({ "id": format!("ds-{:03}", i) }))
        .collect();
    json!({ "success": true, "result": { "count": count, "results": results } })
}

#[tokio::test]
async fn test_package_list() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(action("package_list")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": ["crops", "soils", "water"]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let catalogue = api_catalogue(&mock_server);
    let ids = catalogue.dataset_ids(&BTreeMap::new()).await.unwrap();
    assert_eq!(ids, ["crops", "soils", "water"]);
}

#[tokio::test]
async fn test_search_pages_until_count() {
    let mock_server = MockServer::start().await;

    // Paged requests carry `start`; mounted first so they win over the count call
    for (start, len) in [(0, 100), (100, 100), (200, 50)] {
        Mock::given(method("GET"))
            .and(path(action("package_search")))
            .and(query_param("rows", "100"))
            .and(query_param("start", start.to_string()))
            .and(query_param("fq", "owner_org:aafc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_page(start, len, 250)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(action("package_search")))
        .and(query_param("fq", "owner_org:aafc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(0, 0, 250)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut filters = BTreeMap::new();
    filters.insert("owner_org".to_string(), "aafc".to_string());

    let catalogue = api_catalogue(&mock_server);
    let ids = catalogue.dataset_ids(&filters).await.unwrap();

    assert_eq!(ids.len(), 250);
    assert_eq!(ids.first().map(String::as_str), Some("ds-000"));
    assert_eq!(ids.last().map(String::as_str), Some("ds-249"));
}

#[tokio::test]
async fn test_search_stops_on_empty_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(action("package_search")))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(0, 30, 40)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(action("package_search")))
        .and(query_param("start", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(0, 0, 40)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(action("package_search")))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(0, 0, 40)))
        .mount(&mock_server)
        .await;

    let mut filters = BTreeMap::new();
    filters.insert("collection".to_string(), "primary".to_string());

    let ids = api_catalogue(&mock_server)
        .dataset_ids(&filters)
        .await
        .unwrap();
    assert_eq!(ids.len(), 30);
}

#[tokio::test]
async fn test_search_stops_when_pages_repeat() {
    let mock_server = MockServer::start().await;

    // A server that ignores `start` and always serves the first page
    Mock::given(method("GET"))
        .and(path(action("package_search")))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(0, 100, 250)))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut filters = BTreeMap::new();
    filters.insert("owner_org".to_string(), "aafc".to_string());

    let ids = api_catalogue(&mock_server)
        .dataset_ids(&filters)
        .await
        .unwrap();
    assert_eq!(ids.len(), 100);
}

#[tokio::test]
async fn test_package_show_returns_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(action("package_show")))
        .and(query_param("id", "crops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": { "id": "crops", "resources": [] }
        })))
        .mount(&mock_server)
        .await;

    let dataset = api_catalogue(&mock_server)
        .fetch_dataset("crops")
        .await
        .unwrap();
    assert_eq!(dataset["id"], "crops");
}

#[tokio::test]
async fn test_envelope_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(action("package_show")))
        .and(query_param("id", "refused"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": { "message": "Not found" }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(action("package_show")))
        .and(query_param("id", "empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(action("package_show")))
        .and(query_param("id", "broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(action("resource_show")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let catalogue = api_catalogue(&mock_server);

    assert!(matches!(
        catalogue.fetch_dataset("refused").await,
        Err(CatalogueError::ApiFailure { .. })
    ));
    assert!(matches!(
        catalogue.fetch_dataset("empty").await,
        Err(CatalogueError::MissingResult { .. })
    ));
    assert!(matches!(
        catalogue.fetch_dataset("broken").await,
        Err(CatalogueError::UnexpectedStatus { status: 500, .. })
    ));
    assert!(matches!(
        catalogue.fetch_resource("r1").await,
        Err(CatalogueError::Json { .. })
    ));
}

#[tokio::test]
async fn test_browser_catalogue_over_webdriver() {
    let driver = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "s-1", "capabilities": {} }
        })))
        .expect(1)
        .mount(&driver)
        .await;

    // Each request navigates twice to survive the SSO redirect
    Mock::given(method("POST"))
        .and(path("/session/s-1/url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(2)
        .mount(&driver)
        .await;

    let page = r#"<html><head></head><body><pre>{"success": true, "result": {"id": "crops", "title": "Crops &amp; Soils"}}</pre></body></html>"#;
    Mock::given(method("GET"))
        .and(path("/session/s-1/source"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": page })))
        .expect(1)
        .mount(&driver)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/session/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&driver)
        .await;

    let session = WebDriverSession::connect(
        &driver.uri(),
        "MicrosoftEdge",
        &["--headless=new".to_string()],
        true,
        Duration::from_secs(5),
    )
    .await
    .unwrap();
    assert_eq!(session.session_id(), "s-1");

    let catalogue = BrowserCatalogue::new(
        profile("https://catalogue.example.org", Source::Catalogue),
        session,
    );
    let dataset = catalogue.fetch_dataset("crops").await.unwrap();
    assert_eq!(dataset["id"], "crops");
    assert_eq!(dataset["title"], "Crops & Soils");

    catalogue.close().await.unwrap();
}

#[tokio::test]
async fn test_webdriver_error_reply() {
    let driver = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": {
                "error": "session not created",
                "message": "browser binary not found"
            }
        })))
        .mount(&driver)
        .await;

    let result = WebDriverSession::connect(
        &driver.uri(),
        "MicrosoftEdge",
        &[],
        false,
        Duration::from_secs(5),
    )
    .await;

    match result {
        Err(CatalogueError::Browser(message)) => {
            assert!(message.contains("session not created"));
            assert!(message.contains("browser binary not found"));
        }
        other => panic!("expected a browser error, got {:?}", other),
    }
}
