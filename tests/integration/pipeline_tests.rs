//! Integration tests for the scan pipeline
//!
//! A wiremock server plays a CKAN catalogue (action API plus the resource
//! files themselves). The tests run collection, reconciliation, derivation and
//! export end-to-end against it.

use catalogue_scanner::catalogue::{ApiCatalogue, CatalogueClient, Source, SourceProfile};
use catalogue_scanner::collector::{collect_all, RecordKind};
use catalogue_scanner::derive::{complete_missing_fields, FormatTable};
use catalogue_scanner::inventory::{DatasetRecord, ResourceRecord, UNREACHABLE_URL_STATUS};
use catalogue_scanner::output::{compute_statistics, export_inventory, read_table};
use catalogue_scanner::reconcile::reconcile;
use catalogue_scanner::session::{HttpSession, RetryPolicy};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const ACTION_PATH: &str = "/api/3/action";

/// Answers `package_show` for any ID; IDs listed in `failing` get
/// `success: false`
struct PackageShow {
    base_url: String,
    org: &'static str,
    failing: Vec<String>,
}

impl Respond for PackageShow {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();

        if self.failing.contains(&id) {
            return ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": { "message": "Authorization error" }
            }));
        }
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": dataset_payload(&self.base_url, self.org, &id)
        }))
    }
}

fn dataset_payload(base_url: &str, org: &str, id: &str) -> Value {
    json!({
        "id": id,
        "title_translated": { "en": format!("Crop survey {}", id), "fr": format!("Enquête {}", id) },
        "organization": { "name": org, "title": "Agriculture and Agri-Food Canada | Agriculture et Agroalimentaire Canada" },
        "maintainer_email": "Jane.Doe@example.gc.ca",
        "date_published": "2023-01-15 00:00:00",
        "metadata_created": "2023-01-10T08:00:00.123456",
        "frequency": "P1Y",
        "num_resources": 2,
        "resources": [
            {
                "id": format!("{}-data", id),
                "package_id": id,
                "name": "Crop yields",
                "name_translated": { "fr": "Rendements" },
                "created": "2024-01-01T00:00:00",
                "metadata_modified": "2024-03-01T12:00:00",
                "format": "CSV",
                "language": ["en"],
                "resource_type": "dataset",
                "url": format!("{}/files/{}.csv", base_url, id)
            },
            {
                "id": format!("{}-dd", id),
                "package_id": id,
                "name": "Data dictionary",
                "created": "2024-01-01T00:00:00",
                "format": "XLSX",
                "language": ["fr"],
                "resource_type": "guide",
                "url": "see attached document"
            }
        ]
    })
}

fn profile(base_url: &str, source: Source) -> SourceProfile {
    SourceProfile::new(
        source,
        format!("{}{}", base_url, ACTION_PATH),
        format!("{}/dataset/{{dataset}}", base_url),
        format!("{}/dataset/{{dataset}}/resource/{{resource}}", base_url),
    )
}

fn session() -> HttpSession {
    HttpSession::with_client(reqwest::Client::new(), RetryPolicy::none())
}

/// Starts a catalogue serving every dataset except the `failing` ones
async fn start_catalogue(org: &'static str, failing: &[&str]) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/package_show", ACTION_PATH)))
        .respond_with(PackageShow {
            base_url: mock_server.uri(),
            org,
            failing: failing.iter().map(|id| id.to_string()).collect(),
        })
        .mount(&mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path_regex(r"^/files/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    mock_server
}

fn client(mock_server: &MockServer, source: Source) -> Arc<dyn CatalogueClient> {
    Arc::new(ApiCatalogue::new(profile(&mock_server.uri(), source), session()))
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("valid date")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_collect_all_skips_failed_datasets() {
    let all: Vec<String> = (0..40).map(|i| format!("ds-{:02}", i)).collect();
    // One dataset in ten fails
    let failing: Vec<&str> = all
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 10 == 3)
        .map(|(_, id)| id.as_str())
        .collect();
    let mock_server = start_catalogue("aafc-aac", &failing).await;

    let collection = collect_all(
        client(&mock_server, Source::Registry),
        session(),
        all.clone(),
        6,
    )
    .await;

    assert_eq!(collection.inventory.datasets.len(), 36);
    assert_eq!(collection.inventory.resources.len(), 72);
    assert_eq!(collection.failure_count(RecordKind::Dataset), 4);
    assert_eq!(collection.failure_count(RecordKind::Resource), 0);

    let mut failed: Vec<_> = collection.failures.iter().map(|f| f.id.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, failing);
}

#[tokio::test]
async fn test_extracted_rows_and_derived_flags() {
    let mock_server = start_catalogue("aafc-aac", &[]).await;
    let base_url = mock_server.uri();

    let mut inventory = collect_all(
        client(&mock_server, Source::Registry),
        session(),
        ids(&["crops"]),
        2,
    )
    .await
    .inventory;

    let dataset = &inventory.datasets[0];
    assert_eq!(dataset.id, "crops");
    assert_eq!(dataset.title_en.as_deref(), Some("Crop survey crops"));
    assert_eq!(dataset.title_fr.as_deref(), Some("Enquête crops"));
    assert_eq!(dataset.maintainer_email.as_deref(), Some("jane.doe@example.gc.ca"));
    assert_eq!(dataset.maintainer_name.as_deref(), Some("Jane Doe"));
    assert_eq!(dataset.num_resources, Some(2));
    assert_eq!(dataset.published, Some(at(2023, 1, 15)));
    assert_eq!(dataset.registry_org_name.as_deref(), Some("aafc-aac"));
    assert_eq!(
        dataset.registry_org_title.as_deref(),
        Some("Agriculture and Agri-Food Canada")
    );
    assert_eq!(
        dataset.registry_link,
        Some(format!("{}/dataset/crops", base_url))
    );
    assert!(dataset.on_registry);
    assert!(!dataset.on_catalogue);
    assert!(!dataset.harvested);
    assert_eq!(dataset.modified, None);
    assert_eq!(dataset.up_to_date, None);

    let data = &inventory.resources[0];
    assert_eq!(data.id, "crops-data");
    assert_eq!(data.title_fr.as_deref(), Some("Rendements"));
    assert_eq!(data.lang, "eng");
    assert_eq!(data.url_status, 200);
    assert_eq!(
        data.registry_link,
        Some(format!("{}/dataset/crops/resource/crops-data", base_url))
    );

    let dictionary = &inventory.resources[1];
    assert_eq!(dictionary.id, "crops-dd");
    assert_eq!(dictionary.lang, "fra");
    assert_eq!(dictionary.url_status, UNREACHABLE_URL_STATUS);

    complete_missing_fields(&mut inventory, &FormatTable::builtin(), at(2024, 6, 1));

    let dataset = &inventory.datasets[0];
    assert_eq!(
        dataset.modified,
        NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(12, 0, 0))
    );
    assert_eq!(dataset.up_to_date, Some(true));
    assert_eq!(dataset.official_lang, Some(true));
    assert_eq!(dataset.open_formats, Some(true));
    assert_eq!(dataset.spec, Some(true));

    // A year and a half later the yearly dataset is overdue
    complete_missing_fields(&mut inventory, &FormatTable::builtin(), at(2025, 9, 1));
    assert_eq!(inventory.datasets[0].up_to_date, Some(false));
}

#[tokio::test]
async fn test_unreachable_resources_are_kept() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/package_show", ACTION_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {
                "id": "soils",
                "frequency": "PT1S",
                "resources": [
                    {
                        "id": "r-en",
                        "package_id": "soils",
                        "name": "Soil survey",
                        "created": "2024-01-01T00:00:00",
                        "format": "CSV",
                        "language": ["en"],
                        "url": "not a url"
                    },
                    {
                        "id": "r-fr",
                        "package_id": "soils",
                        "name": "Relevé des sols",
                        "created": "2024-01-01T00:00:00",
                        "format": "CSV",
                        "language": ["fr"],
                        "url": "http://127.0.0.1:1/gone.csv"
                    }
                ]
            }
        })))
        .mount(&mock_server)
        .await;

    let collection = collect_all(
        client(&mock_server, Source::Registry),
        session(),
        ids(&["soils"]),
        2,
    )
    .await;

    assert!(collection.failures.is_empty());
    let mut inventory = collection.inventory;
    let statuses: Vec<_> = inventory
        .resources
        .iter()
        .map(|r| (r.id.as_str(), r.url_status))
        .collect();
    assert_eq!(
        statuses,
        [("r-en", UNREACHABLE_URL_STATUS), ("r-fr", UNREACHABLE_URL_STATUS)]
    );

    complete_missing_fields(&mut inventory, &FormatTable::builtin(), at(2024, 6, 1));
    assert_eq!(inventory.datasets[0].official_lang, Some(true));

    let stats = compute_statistics(&inventory, &collection.failures);
    assert_eq!(stats.resources, 2);
    assert_eq!(stats.unreachable_urls, 2);
    assert_eq!(stats.skipped_resources, 0);
}

#[tokio::test]
async fn test_reconcile_with_second_catalogue() {
    let registry = start_catalogue("aafc-aac", &[]).await;
    let catalogue = start_catalogue("aafc", &["broken"]).await;

    let mut inventory = collect_all(
        client(&registry, Source::Registry),
        session(),
        ids(&["alpha", "beta"]),
        4,
    )
    .await
    .inventory;

    let report = reconcile(
        &mut inventory,
        client(&catalogue, Source::Catalogue),
        ids(&["beta", "gamma", "broken", "beta"]),
        session(),
        4,
    )
    .await;

    assert_eq!(report.added, 1);
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, "broken");

    let dataset_ids: Vec<_> = inventory.datasets.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(dataset_ids, ["alpha", "beta", "gamma"]);

    let alpha = &inventory.datasets[0];
    assert!(alpha.on_registry);
    assert!(!alpha.on_catalogue);
    assert_eq!(alpha.catalogue_link, None);

    // Shared: registry columns kept, catalogue columns filled
    let beta = &inventory.datasets[1];
    assert!(beta.on_registry);
    assert!(beta.on_catalogue);
    assert_eq!(beta.registry_org_name.as_deref(), Some("aafc-aac"));
    assert_eq!(beta.catalogue_org_name.as_deref(), Some("aafc"));
    assert_eq!(
        beta.registry_link,
        Some(format!("{}/dataset/beta", registry.uri()))
    );
    assert_eq!(
        beta.catalogue_link,
        Some(format!("{}/dataset/beta", catalogue.uri()))
    );

    let gamma = &inventory.datasets[2];
    assert!(!gamma.on_registry);
    assert!(gamma.on_catalogue);
    assert_eq!(gamma.registry_link, None);

    for resource in inventory.resources.iter().filter(|r| r.dataset_id == "beta") {
        assert_eq!(
            resource.catalogue_link,
            Some(format!(
                "{}/dataset/beta/resource/{}",
                catalogue.uri(),
                resource.id
            ))
        );
        assert!(resource.registry_link.is_some());
    }
    for resource in inventory.resources.iter().filter(|r| r.dataset_id == "alpha") {
        assert_eq!(resource.catalogue_link, None);
    }
    assert_eq!(inventory.resources.len(), 6);
}

#[tokio::test]
async fn test_export_round_trip() {
    let mock_server = start_catalogue("aafc-aac", &[]).await;
    let mut inventory = collect_all(
        client(&mock_server, Source::Registry),
        session(),
        ids(&["crops", "soils"]),
        2,
    )
    .await
    .inventory;
    let generated_at = at(2024, 6, 1);
    complete_missing_fields(&mut inventory, &FormatTable::builtin(), generated_at);

    let dir = tempfile::tempdir().unwrap();
    let export = export_inventory(&inventory, dir.path(), generated_at).unwrap();

    assert!(export
        .datasets
        .timestamped
        .ends_with("datasets_inventory_2024-06-01_000000.csv"));
    assert!(export
        .resources
        .latest
        .ends_with("_latest_resources_inventory.csv"));

    let datasets: Vec<DatasetRecord> = read_table(&export.datasets.latest).unwrap();
    let resources: Vec<ResourceRecord> = read_table(&export.resources.timestamped).unwrap();
    assert_eq!(datasets, inventory.datasets);
    assert_eq!(resources, inventory.resources);
}
