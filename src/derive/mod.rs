//! Field derivation
//!
//! Runs after collection (and reconciliation) is complete. Resources are
//! grouped by dataset once, and every pass reads the same grouping, so all
//! passes agree on which resources belong to a dataset:
//! 1. `modified` from the resources' activity dates
//! 2. `up_to_date` from `modified` and the declared frequency
//! 3. `official_lang`, `open_formats` and `spec` from the resource set

mod compliance;
mod dates;
mod formats;

pub use compliance::{get_official_lang, get_open_formats, get_spec, get_up_to_date, infer_modified};
pub use dates::{date_ago, DurationError, Frequency, TimeUnit, UNSCHEDULED};
pub use formats::{FormatTable, FormatType};

use crate::inventory::{Inventory, ResourceRecord};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Resources grouped by parent dataset
pub struct ResourceIndex<'a> {
    by_dataset: HashMap<&'a str, Vec<&'a ResourceRecord>>,
}

impl<'a> ResourceIndex<'a> {
    pub fn build(resources: &'a [ResourceRecord]) -> Self {
        let mut by_dataset: HashMap<&str, Vec<&ResourceRecord>> = HashMap::new();
        for resource in resources {
            by_dataset
                .entry(resource.dataset_id.as_str())
                .or_default()
                .push(resource);
        }
        Self { by_dataset }
    }

    /// Resources of a dataset (empty if it has none)
    pub fn resources_of(&self, dataset_id: &str) -> &[&'a ResourceRecord] {
        self.by_dataset
            .get(dataset_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Computes `modified` and the four compliance flags of every dataset
pub fn complete_missing_fields(inventory: &mut Inventory, formats: &FormatTable, now: NaiveDateTime) {
    let index = ResourceIndex::build(&inventory.resources);

    for dataset in inventory.datasets.iter_mut() {
        let resources = index.resources_of(&dataset.id);

        dataset.modified = infer_modified(dataset, resources);
        dataset.up_to_date = Some(get_up_to_date(dataset, now));
        dataset.official_lang = Some(get_official_lang(resources));
        dataset.open_formats = Some(get_open_formats(resources, formats));
        dataset.spec = Some(get_spec(resources));
    }

    tracing::info!(
        "Derived fields for {} datasets from {} resources",
        inventory.datasets.len(),
        inventory.resources.len()
    );
}
