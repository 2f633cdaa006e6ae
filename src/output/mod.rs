//! Output module for exporting inventories and run statistics
//!
//! This module handles:
//! - Writing the datasets and resources tables as UTF-8 (BOM) CSV files
//! - Keeping a fixed-name `_latest_` copy of each table next to the
//!   timestamped export
//! - Summarizing an inventory for the end-of-run report

mod csv_export;
pub mod stats;

pub use csv_export::{
    export_inventory, export_table, read_table, write_table, ExportPaths, InventoryExport, Table,
    TableRow,
};
pub use stats::{compute_statistics, print_statistics, InventoryStatistics};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while exporting tables
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;
