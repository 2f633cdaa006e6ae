//! Per-dataset compliance rules
//!
//! Every rule looks at one dataset together with the complete set of its
//! resources.

use crate::derive::dates::Frequency;
use crate::derive::formats::FormatTable;
use crate::inventory::{DatasetRecord, ResourceRecord};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Titles of data dictionaries and specifications: `Data dictionary`,
/// `Specification`, `dd_crops.csv`, `crops-dd.csv`
static SPEC_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)data dictionary|specification|(?:^|\s)dd[_-]|[_-]dd(?:$|[\s.])")
        .expect("specification title pattern is valid")
});

const DATASET_RESOURCE_TYPE: &str = "dataset";

/// Latest activity across the dataset's resources
///
/// Each resource counts for the later of its `created` and `metadata_modified`
/// dates. A dataset without resources falls back to its `published` date.
pub fn infer_modified(
    dataset: &DatasetRecord,
    resources: &[&ResourceRecord],
) -> Option<NaiveDateTime> {
    resources
        .iter()
        .map(|r| r.last_activity())
        .max()
        .or(dataset.published)
}

/// Whether the dataset was updated within its declared frequency
///
/// Harvested datasets, `PT1S` and frequencies that are not `P<n><unit>`
/// durations are always up to date.
pub fn get_up_to_date(dataset: &DatasetRecord, now: NaiveDateTime) -> bool {
    if dataset.harvested {
        return true;
    }
    let Some(text) = dataset.frequency.as_deref() else {
        return true;
    };

    let frequency = Frequency::parse(text);
    let oldest_valid_update = match frequency.oldest_valid_update(now) {
        None => {
            if let Frequency::Unrecognized(text) = &frequency {
                if text.starts_with('P') {
                    tracing::warn!("Dataset {}: unreadable frequency {}", dataset.id, text);
                }
            }
            return true;
        }
        Some(Err(e)) => {
            tracing::warn!("Dataset {}: frequency {}: {}", dataset.id, text, e);
            return true;
        }
        Some(Ok(oldest)) => oldest,
    };

    match dataset.modified {
        Some(modified) => modified >= oldest_valid_update,
        None => {
            tracing::warn!(
                "Dataset {}: no modification date to compare with frequency {}",
                dataset.id,
                text
            );
            true
        }
    }
}

/// Whether as many resources are in English as in French
pub fn get_official_lang(resources: &[&ResourceRecord]) -> bool {
    let count = |code: &str| {
        resources
            .iter()
            .filter(|r| r.languages().any(|lang| lang == code))
            .count()
    };
    count("eng") == count("fra")
}

/// Whether every format category present has at least one open resource
///
/// Formats missing from the table belong to no category.
pub fn get_open_formats(resources: &[&ResourceRecord], formats: &FormatTable) -> bool {
    let mut categories: BTreeMap<&str, bool> = BTreeMap::new();
    for format_type in resources
        .iter()
        .filter_map(|r| r.format.as_deref())
        .filter_map(|format| formats.lookup(format))
    {
        *categories.entry(format_type.category.as_str()).or_default() |= format_type.open;
    }
    categories.values().all(|open| *open)
}

/// Whether a dataset with data resources also documents them
///
/// Datasets without any `dataset` resource need no data dictionary.
pub fn get_spec(resources: &[&ResourceRecord]) -> bool {
    let has_data = resources
        .iter()
        .any(|r| r.resource_type.as_deref() == Some(DATASET_RESOURCE_TYPE));
    if !has_data {
        return true;
    }
    resources
        .iter()
        .filter_map(|r| r.title_en.as_deref())
        .any(|title| SPEC_TITLE.is_match(title))
}
