//! CKAN catalogue clients
//!
//! This module exposes one query surface over two ways of reaching a catalogue:
//! - [`ApiCatalogue`]: plain HTTP requests against the JSON action API
//! - [`BrowserCatalogue`]: navigation through an authenticated browser session
//!
//! Both variants funnel every call through a single `request` primitive that
//! checks the transport status, parses the `{ "success": bool, "result": ... }`
//! envelope and returns the `result` payload.

mod api;
mod browser;
mod page;
mod webdriver;

pub use api::ApiCatalogue;
pub use browser::{BrowserCatalogue, BrowserSession};
pub use page::extract_json_payload;
pub use webdriver::WebDriverSession;

use crate::config::CatalogueConfig;
use crate::session::HttpError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Number of rows requested per `package_search` page
pub const PAGE_SIZE: usize = 100;

/// Errors raised by catalogue calls
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Request Error: unexpected status code {status} for {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("CKAN API Error: request's success is False ({url})")]
    ApiFailure { url: String },

    #[error("CKAN API Error: no result in response from {url}")]
    MissingResult { url: String },

    #[error("Unexpected result shape from {url}: {message}")]
    MalformedResult { url: String, message: String },

    #[error("No JSON payload found in page rendered for {url}")]
    NoPayload { url: String },

    #[error("Browser session error: {0}")]
    Browser(String),
}

/// Which catalogue a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// The public open-data registry
    Registry,
    /// The departmental, internal catalogue
    Catalogue,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Registry => write!(f, "registry"),
            Source::Catalogue => write!(f, "catalogue"),
        }
    }
}

/// Addressing information of one catalogue
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub source: Source,
    base_url: String,
    dataset_link: String,
    resource_link: String,
}

impl SourceProfile {
    /// Creates a profile; `base_url` gets a trailing slash if it lacks one
    pub fn new(
        source: Source,
        base_url: impl Into<String>,
        dataset_link: impl Into<String>,
        resource_link: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            source,
            base_url,
            dataset_link: dataset_link.into(),
            resource_link: resource_link.into(),
        }
    }

    /// Builds a profile from a catalogue section of the configuration
    pub fn from_config(source: Source, config: &CatalogueConfig) -> Self {
        Self::new(
            source,
            &config.base_url,
            &config.dataset_link,
            &config.resource_link,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of an action endpoint, e.g. `package_list`
    pub fn action_url(&self, action: &str) -> String {
        format!("{}{}", self.base_url, action)
    }

    /// Public permalink of a dataset
    pub fn dataset_link(&self, dataset_id: &str) -> String {
        self.dataset_link.replace("{dataset}", dataset_id)
    }

    /// Public permalink of a resource
    pub fn resource_link(&self, dataset_id: &str, resource_id: &str) -> String {
        self.resource_link
            .replace("{dataset}", dataset_id)
            .replace("{resource}", resource_id)
    }
}

/// Uniform query surface over a CKAN catalogue
#[async_trait]
pub trait CatalogueClient: Send + Sync {
    /// Addressing information of this catalogue
    fn profile(&self) -> &SourceProfile;

    /// Issues one API call and returns the `result` field of the envelope
    ///
    /// Non-200 status, unparsable JSON and `success != true` are hard errors.
    async fn request(&self, url: &str) -> Result<Value, CatalogueError>;

    /// Returns the IDs of every dataset in the catalogue
    async fn list_all_dataset_ids(&self) -> Result<Vec<String>, CatalogueError> {
        let url = self.profile().action_url("package_list");
        let result = self.request(&url).await?;
        let ids = result
            .as_array()
            .ok_or_else(|| malformed(&url, "package_list result is not a list"))?;
        ids.iter()
            .map(|id| {
                id.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| malformed(&url, "package_list entry is not a string"))
            })
            .collect()
    }

    /// Returns the IDs of datasets matching all the given filters
    ///
    /// The first call learns the total `count`; pages of [`PAGE_SIZE`] are then
    /// requested until that many unique IDs are collected. A page that adds no
    /// new ID (empty, or only repeats) ends the loop early.
    async fn search_dataset_ids(
        &self,
        filters: &BTreeMap<String, String>,
    ) -> Result<Vec<String>, CatalogueError> {
        let fq = join_filters(filters);
        let search = self.profile().action_url("package_search");

        let url = format!("{}?fq={}", search, fq);
        let count = self.request(&url).await?["count"]
            .as_u64()
            .ok_or_else(|| malformed(&url, "missing count"))? as usize;

        let mut ids = Vec::with_capacity(count);
        let mut seen = HashSet::with_capacity(count);
        let mut start = 0;

        while ids.len() < count {
            let url = format!("{}?rows={}&start={}&fq={}", search, PAGE_SIZE, start, fq);
            let page = self.request(&url).await?;
            let results = page["results"]
                .as_array()
                .ok_or_else(|| malformed(&url, "missing results"))?;

            let before = ids.len();
            for dataset in results {
                let id = dataset["id"]
                    .as_str()
                    .ok_or_else(|| malformed(&url, "result without id"))?;
                if seen.insert(id.to_string()) {
                    ids.push(id.to_string());
                }
            }

            if ids.len() == before {
                tracing::warn!(
                    "Search returned {} of {} datasets before running out of new results",
                    ids.len(),
                    count
                );
                break;
            }
            start += PAGE_SIZE;
        }

        tracing::debug!("Search {} matched {} datasets", fq, ids.len());
        Ok(ids)
    }

    /// Returns a dataset payload, including its embedded resources
    async fn fetch_dataset(&self, id: &str) -> Result<Value, CatalogueError> {
        let url = format!("{}?id={}", self.profile().action_url("package_show"), id);
        self.request(&url).await
    }

    /// Returns a single resource payload
    async fn fetch_resource(&self, id: &str) -> Result<Value, CatalogueError> {
        let url = format!("{}?id={}", self.profile().action_url("resource_show"), id);
        self.request(&url).await
    }

    /// Searches with the filters, or lists everything when there are none
    async fn dataset_ids(
        &self,
        filters: &BTreeMap<String, String>,
    ) -> Result<Vec<String>, CatalogueError> {
        if filters.is_empty() {
            self.list_all_dataset_ids().await
        } else {
            self.search_dataset_ids(filters).await
        }
    }
}

/// Joins filters into a single `fq` expression (`field:value+field:value`)
pub fn join_filters(filters: &BTreeMap<String, String>) -> String {
    filters
        .iter()
        .map(|(field, value)| format!("{}:{}", field, value))
        .collect::<Vec<_>>()
        .join("+")
}

/// Checks the CKAN envelope and returns its `result` payload
pub(crate) fn unwrap_envelope(url: &str, data: Value) -> Result<Value, CatalogueError> {
    if data.get("success").and_then(Value::as_bool) != Some(true) {
        return Err(CatalogueError::ApiFailure {
            url: url.to_string(),
        });
    }

    match data {
        Value::Object(mut envelope) => {
            envelope
                .remove("result")
                .ok_or_else(|| CatalogueError::MissingResult {
                    url: url.to_string(),
                })
        }
        _ => Err(CatalogueError::MissingResult {
            url: url.to_string(),
        }),
    }
}

fn malformed(url: &str, message: &str) -> CatalogueError {
    CatalogueError::MalformedResult {
        url: url.to_string(),
        message: message.to_string(),
    }
}
