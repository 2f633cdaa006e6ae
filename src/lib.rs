//! Catalogue Scanner: an open-data inventory builder
//!
//! This crate crawls a CKAN-based open-data registry, collects every dataset
//! belonging to one organization together with its resources, derives
//! compliance indicators (currency, official languages, open formats, data
//! dictionary) and exports two tabular inventories. A second catalogue can be
//! scanned and reconciled against the first.

pub mod catalogue;
pub mod collector;
pub mod config;
pub mod derive;
pub mod inventory;
pub mod output;
pub mod reconcile;
pub mod session;

use thiserror::Error;

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid link template: {0}")]
    InvalidTemplate(String),
}

// Re-export commonly used types
pub use catalogue::{ApiCatalogue, BrowserCatalogue, CatalogueClient, Source, SourceProfile};
pub use collector::{collect_all, Collection};
pub use config::Config;
pub use derive::complete_missing_fields;
pub use inventory::{DatasetRecord, Inventory, ResourceRecord};
pub use reconcile::reconcile;
pub use session::HttpSession;
