//! Concurrent dataset collection
//!
//! One task per dataset ID fetches the dataset, extracts its row, then
//! extracts and probes each embedded resource. Tasks run on the tokio runtime
//! with at most `max_workers` in flight, gated by a semaphore. Each task
//! returns its own rows; the rows are merged once every task has finished and
//! the tables are then sorted, so no table is ever shared between tasks.
//!
//! A failed fetch or extraction only loses the affected record. It is logged,
//! counted in [`Collection::failures`], and sibling tasks carry on.

mod progress;

pub use progress::ProgressCounter;

use crate::catalogue::CatalogueClient;
use crate::inventory::{extract_dataset, extract_resource, Inventory};
use crate::session::HttpSession;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Kind of record a failure was about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Dataset,
    Resource,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Dataset => write!(f, "dataset"),
            RecordKind::Resource => write!(f, "resource"),
        }
    }
}

/// A record that could not be collected
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: RecordKind,
    pub id: String,
    pub reason: String,
}

impl Failure {
    pub(crate) fn new(kind: RecordKind, id: impl Into<String>, reason: impl fmt::Display) -> Self {
        let failure = Self {
            kind,
            id: id.into(),
            reason: reason.to_string(),
        };
        tracing::warn!("Skipped {} {}: {}", failure.kind, failure.id, failure.reason);
        failure
    }
}

/// Rows collected from one batch of dataset IDs, plus what was skipped
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub inventory: Inventory,
    pub failures: Vec<Failure>,
}

impl Collection {
    fn merge(&mut self, other: Collection) {
        self.inventory.extend(other.inventory);
        self.failures.extend(other.failures);
    }

    /// Number of skipped records of the given kind
    pub fn failure_count(&self, kind: RecordKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

/// Collects every dataset in `ids`, with their resources, from the catalogue
///
/// # Arguments
///
/// * `client` - Catalogue to fetch datasets from
/// * `probe` - Session used for resource URL status probes
/// * `ids` - Dataset IDs to collect
/// * `max_workers` - Maximum number of datasets in flight
///
/// # Returns
///
/// The sorted tables and the list of skipped records. Collection itself never
/// fails.
pub async fn collect_all(
    client: Arc<dyn CatalogueClient>,
    probe: HttpSession,
    ids: Vec<String>,
    max_workers: usize,
) -> Collection {
    let source = client.profile().source;
    tracing::info!(
        "Collecting {} datasets from the {} ({} workers)",
        ids.len(),
        source,
        max_workers
    );

    let workers = Arc::new(Semaphore::new(max_workers.max(1)));
    let progress = Arc::new(ProgressCounter::new(format!("{} datasets", source), ids.len()));
    let mut tasks = JoinSet::new();

    for id in ids {
        let client = Arc::clone(&client);
        let probe = probe.clone();
        let workers = Arc::clone(&workers);
        let progress = Arc::clone(&progress);

        tasks.spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                return Collection {
                    failures: vec![Failure::new(RecordKind::Dataset, id, "worker pool closed")],
                    ..Collection::default()
                };
            };
            let collection = collect_dataset(client.as_ref(), &probe, &id).await;
            progress.advance(&id);
            collection
        });
    }

    let mut collection = Collection::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(task) => collection.merge(task),
            Err(e) => {
                tracing::error!("Collection task did not complete: {}", e);
                collection
                    .failures
                    .push(Failure::new(RecordKind::Dataset, "<unknown>", e));
            }
        }
    }
    collection.inventory.sort();

    tracing::info!(
        "Collected {} datasets and {} resources from the {} ({} datasets and {} resources skipped)",
        collection.inventory.datasets.len(),
        collection.inventory.resources.len(),
        source,
        collection.failure_count(RecordKind::Dataset),
        collection.failure_count(RecordKind::Resource)
    );
    collection
}

/// Fetches one dataset and maps it and its resources to rows
async fn collect_dataset(client: &dyn CatalogueClient, probe: &HttpSession, id: &str) -> Collection {
    let mut collection = Collection::default();
    let profile = client.profile();

    let payload = match client.fetch_dataset(id).await {
        Ok(payload) => payload,
        Err(e) => {
            collection
                .failures
                .push(Failure::new(RecordKind::Dataset, id, e));
            return collection;
        }
    };

    match extract_dataset(&payload, profile) {
        Ok(record) => collection.inventory.datasets.push(record),
        Err(e) => collection
            .failures
            .push(Failure::new(RecordKind::Dataset, id, e)),
    }

    let resources = payload
        .get("resources")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for resource in resources {
        match extract_resource(resource, profile, probe).await {
            Ok(record) => collection.inventory.resources.push(record),
            Err(e) => {
                let resource_id = resource["id"].as_str().unwrap_or("<no id>");
                collection
                    .failures
                    .push(Failure::new(RecordKind::Resource, resource_id, e));
            }
        }
    }

    collection
}
