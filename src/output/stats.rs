//! Statistics generation from a finished inventory
//!
//! This module summarizes the tables and the skipped records of a run for the
//! end-of-run report.

use crate::collector::{Failure, RecordKind};
use crate::inventory::{DatasetRecord, Inventory, UNREACHABLE_URL_STATUS};

/// Inventory statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryStatistics {
    /// Number of dataset rows
    pub datasets: usize,

    /// Number of resource rows
    pub resources: usize,

    pub on_registry: usize,
    pub on_catalogue: usize,
    pub harvested: usize,

    // Datasets whose flag is set to true
    pub up_to_date: usize,
    pub official_lang: usize,
    pub open_formats: usize,
    pub spec: usize,

    /// Resources whose URL answered 4xx or 5xx
    pub broken_links: usize,

    /// Resources whose URL is malformed or never answered
    pub unreachable_urls: usize,

    pub skipped_datasets: usize,
    pub skipped_resources: usize,
}

/// Computes statistics over the inventory and the records skipped on the way
pub fn compute_statistics(inventory: &Inventory, failures: &[Failure]) -> InventoryStatistics {
    let count = |flag: fn(&DatasetRecord) -> bool| {
        inventory.datasets.iter().filter(|d| flag(d)).count()
    };

    InventoryStatistics {
        datasets: inventory.datasets.len(),
        resources: inventory.resources.len(),
        on_registry: count(|d| d.on_registry),
        on_catalogue: count(|d| d.on_catalogue),
        harvested: count(|d| d.harvested),
        up_to_date: count(|d| d.up_to_date == Some(true)),
        official_lang: count(|d| d.official_lang == Some(true)),
        open_formats: count(|d| d.open_formats == Some(true)),
        spec: count(|d| d.spec == Some(true)),
        broken_links: inventory
            .resources
            .iter()
            .filter(|r| r.url_status >= 400)
            .count(),
        unreachable_urls: inventory
            .resources
            .iter()
            .filter(|r| r.url_status == UNREACHABLE_URL_STATUS)
            .count(),
        skipped_datasets: failures
            .iter()
            .filter(|f| f.kind == RecordKind::Dataset)
            .count(),
        skipped_resources: failures
            .iter()
            .filter(|f| f.kind == RecordKind::Resource)
            .count(),
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &InventoryStatistics) {
    println!("=== Inventory Statistics ===\n");

    println!("Overview:");
    println!("  Datasets: {}", stats.datasets);
    println!("  Resources: {}", stats.resources);
    println!("  On registry: {}", stats.on_registry);
    println!("  On catalogue: {}", stats.on_catalogue);
    println!("  Harvested: {}", stats.harvested);
    println!();

    println!("Compliance:");
    for (label, count) in [
        ("Up to date", stats.up_to_date),
        ("Official languages", stats.official_lang),
        ("Open formats", stats.open_formats),
        ("Data dictionary", stats.spec),
    ] {
        println!(
            "  {}: {} ({:.1}%)",
            label,
            count,
            percentage(count, stats.datasets)
        );
    }
    println!();

    println!("Links:");
    println!("  Broken: {}", stats.broken_links);
    println!("  Unreachable: {}", stats.unreachable_urls);
    println!();

    if stats.skipped_datasets + stats.skipped_resources > 0 {
        println!("Skipped:");
        println!("  Datasets: {}", stats.skipped_datasets);
        println!("  Resources: {}", stats.skipped_resources);
        println!();
    }
}
