//! Cross-catalogue reconciliation
//!
//! Merges the datasets of a second catalogue into an inventory built from the
//! first one:
//! - datasets only found on the second catalogue are collected in full and
//!   appended
//! - datasets found on both are re-fetched from the second catalogue to fill
//!   its presence flag, organization columns and deep links, on the dataset
//!   and on each of its resources
//!
//! Columns owned by the first catalogue are left untouched. A failed fetch
//! skips that one dataset.

use crate::catalogue::{CatalogueClient, SourceProfile};
use crate::collector::{collect_all, Failure, RecordKind};
use crate::inventory::{extract_provenance, Inventory, Provenance};
use crate::session::HttpSession;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Datasets found only on the second catalogue and appended
    pub added: usize,

    /// Datasets present on both catalogues whose provenance was refreshed
    pub refreshed: usize,

    pub failures: Vec<Failure>,
}

/// Reconciles `inventory` with the datasets `other_ids` of another catalogue
///
/// # Arguments
///
/// * `inventory` - Tables collected from the first catalogue
/// * `other` - The second catalogue
/// * `other_ids` - Dataset IDs found on the second catalogue
/// * `probe` - Session for URL probes of newly collected resources
/// * `max_workers` - Maximum number of datasets in flight
pub async fn reconcile(
    inventory: &mut Inventory,
    other: Arc<dyn CatalogueClient>,
    other_ids: Vec<String>,
    probe: HttpSession,
    max_workers: usize,
) -> ReconcileReport {
    let (shared, new): (Vec<String>, Vec<String>) = {
        let known = inventory.dataset_ids();
        let mut seen = HashSet::new();
        other_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .partition(|id| known.contains(id.as_str()))
    };
    tracing::info!(
        "Reconciling with the {}: {} shared datasets, {} new",
        other.profile().source,
        shared.len(),
        new.len()
    );

    let mut report = ReconcileReport::default();

    let collection = collect_all(Arc::clone(&other), probe, new, max_workers).await;
    report.added = collection.inventory.datasets.len();
    report.failures.extend(collection.failures);
    inventory.extend(collection.inventory);

    let (provenances, failures) = fetch_provenances(Arc::clone(&other), shared, max_workers).await;
    report.failures.extend(failures);
    for (id, provenance) in provenances {
        if apply(inventory, &id, provenance, other.profile()) {
            report.refreshed += 1;
        }
    }

    inventory.sort();
    tracing::info!(
        "Reconciliation done: {} datasets added, {} refreshed, {} skipped",
        report.added,
        report.refreshed,
        report.failures.len()
    );
    report
}

/// Writes a refreshed provenance into the dataset and its resources
fn apply(
    inventory: &mut Inventory,
    id: &str,
    provenance: Provenance,
    profile: &SourceProfile,
) -> bool {
    let Some(dataset) = inventory.dataset_mut(id) else {
        return false;
    };
    dataset.apply_provenance(provenance);
    for resource in inventory.resources_of_mut(id) {
        resource.set_link(profile);
    }
    true
}

/// Fetches the provenance of every shared dataset from the other catalogue
async fn fetch_provenances(
    other: Arc<dyn CatalogueClient>,
    ids: Vec<String>,
    max_workers: usize,
) -> (Vec<(String, Provenance)>, Vec<Failure>) {
    let workers = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut tasks = JoinSet::new();

    for id in ids {
        let other = Arc::clone(&other);
        let workers = Arc::clone(&workers);
        tasks.spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|e| Failure::new(RecordKind::Dataset, id.as_str(), e))?;
            let payload = other
                .fetch_dataset(&id)
                .await
                .map_err(|e| Failure::new(RecordKind::Dataset, id.as_str(), e))?;
            let provenance = extract_provenance(&payload, other.profile())
                .map_err(|e| Failure::new(RecordKind::Dataset, id.as_str(), e))?;
            Ok::<_, Failure>((id, provenance))
        });
    }

    let mut provenances = Vec::new();
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(provenance)) => provenances.push(provenance),
            Ok(Err(failure)) => failures.push(failure),
            Err(e) => failures.push(Failure::new(RecordKind::Dataset, "<unknown>", e)),
        }
    }
    (provenances, failures)
}
