//! Flat dataset and resource rows
//!
//! Field order is the column order of the exported tables.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One row of the datasets table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: String,
    pub title_en: Option<String>,
    pub title_fr: Option<String>,
    pub published: Option<NaiveDateTime>,

    /// Latest activity across the dataset's resources (derived)
    pub modified: Option<NaiveDateTime>,

    pub metadata_created: Option<NaiveDateTime>,
    pub metadata_modified: Option<NaiveDateTime>,

    /// Count reported by the catalogue, which may differ from the collected rows
    pub num_resources: Option<u32>,

    pub maintainer_email: Option<String>,
    pub maintainer_name: Option<String>,
    pub collection: Option<String>,
    pub frequency: Option<String>,

    // Compliance flags, set once the resource table is complete
    pub up_to_date: Option<bool>,
    pub official_lang: Option<bool>,
    pub open_formats: Option<bool>,
    pub spec: Option<bool>,

    pub registry_link: Option<String>,
    pub catalogue_link: Option<String>,

    pub on_registry: bool,
    pub on_catalogue: bool,

    /// Freshness is managed by an upstream harvest source
    pub harvested: bool,

    /// Not published on the public registry
    pub internal: bool,

    pub registry_org_name: Option<String>,
    pub registry_org_title: Option<String>,
    pub catalogue_org_name: Option<String>,
    pub catalogue_org_title: Option<String>,
}

/// One row of the resources table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    pub title_en: Option<String>,
    pub title_fr: Option<String>,
    pub created: NaiveDateTime,
    pub metadata_modified: Option<NaiveDateTime>,
    pub format: Option<String>,

    /// Slash-joined ISO 639-3 codes, e.g. `eng/fra`
    pub lang: String,

    /// Parent dataset (not enforced)
    pub dataset_id: String,

    pub resource_type: Option<String>,
    pub url: Option<String>,

    /// HEAD status of `url`, or -1 when `url` is not a well-formed URL
    pub url_status: i32,

    pub registry_link: Option<String>,
    pub catalogue_link: Option<String>,
}

impl ResourceRecord {
    /// Latest of `created` and `metadata_modified`
    pub fn last_activity(&self) -> NaiveDateTime {
        match self.metadata_modified {
            Some(modified) => modified.max(self.created),
            None => self.created,
        }
    }

    /// Language codes of the resource
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.lang.split('/').filter(|code| !code.is_empty())
    }
}
