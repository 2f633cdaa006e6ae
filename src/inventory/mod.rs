//! Dataset and resource inventories
//!
//! This module holds the two tables the scanner produces and the functions
//! that fill them:
//! - [`DatasetRecord`] / [`ResourceRecord`]: flat rows, one per catalogue item
//! - [`extract_dataset`] / [`extract_resource`]: payload to row mapping
//! - [`Inventory`]: the pair of tables with deterministic ordering

mod extract;
mod lang;
mod names;
mod records;

pub use extract::{
    extract_dataset, extract_provenance, extract_resource, is_well_formed_url, parse_timestamp,
    resource_fields, Provenance, UNREACHABLE_URL_STATUS,
};
pub use lang::to_iso639_3;
pub use names::infer_name_from_email;
pub use records::{DatasetRecord, ResourceRecord};

use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while mapping one payload to a row
///
/// These are isolated per record: the record is dropped and the scan goes on.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{record} payload has no `{field}`")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("{record} {id}: invalid `{field}`: {message}")]
    InvalidField {
        record: &'static str,
        id: String,
        field: &'static str,
        message: String,
    },

    #[error("resource {id}: unknown language code `{code}`")]
    UnknownLanguage { id: String, code: String },
}

/// The datasets and resources tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub datasets: Vec<DatasetRecord>,
    pub resources: Vec<ResourceRecord>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the rows of another inventory
    pub fn extend(&mut self, other: Inventory) {
        self.datasets.extend(other.datasets);
        self.resources.extend(other.resources);
    }

    /// Sorts datasets by id and resources by dataset then id
    pub fn sort(&mut self) {
        self.datasets.sort_by(|a, b| a.id.cmp(&b.id));
        self.resources.sort_by(|a, b| {
            a.dataset_id
                .cmp(&b.dataset_id)
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    /// IDs of every dataset row
    pub fn dataset_ids(&self) -> HashSet<&str> {
        self.datasets.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn dataset_mut(&mut self, id: &str) -> Option<&mut DatasetRecord> {
        self.datasets.iter_mut().find(|d| d.id == id)
    }

    /// Resources whose parent is the given dataset
    pub fn resources_of_mut<'a>(
        &'a mut self,
        dataset_id: &'a str,
    ) -> impl Iterator<Item = &'a mut ResourceRecord> + 'a {
        self.resources
            .iter_mut()
            .filter(move |r| r.dataset_id == dataset_id)
    }
}
