//! Payload to record mapping
//!
//! Catalogue payloads are ragged: the same information can live under several
//! keys depending on the catalogue and on how old the dataset is. Each such
//! field is described as an ordered list of key paths, and the first path
//! holding a present value (not null, not an empty string) wins.

use crate::catalogue::{Source, SourceProfile};
use crate::inventory::lang::to_iso639_3;
use crate::inventory::names::infer_name_from_email;
use crate::inventory::records::{DatasetRecord, ResourceRecord};
use crate::inventory::ExtractError;
use crate::session::HttpSession;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use url::Url;

/// A key path inside a payload, e.g. `["title_translated", "fr"]`
type FieldPath = &'static [&'static str];

const MAINTAINER_EMAIL: &[FieldPath] = &[
    &["maintainer_email"],
    &["data_steward_email"],
    &["author_email"],
];
const DATASET_TITLE_EN: &[FieldPath] = &[&["title_translated", "en"], &["title"]];
const DATASET_TITLE_FR: &[FieldPath] = &[&["title_translated", "fr"], &["title_translated", "fr-t-en"]];
const RESOURCE_TITLE_EN: &[FieldPath] = &[&["name"], &["name_translated", "en"]];
const RESOURCE_TITLE_FR: &[FieldPath] = &[&["name_translated", "fr"], &["name_translated", "fr-t-en"]];
const PUBLISHED: &[FieldPath] = &[&["date_published"]];

const HARVEST_KEYS: [&str; 2] = ["harvest_source_id", "harvest_object_id"];

/// Sentinel status for resources whose URL is malformed or never answered
pub const UNREACHABLE_URL_STATUS: i32 = -1;

/// Source-specific columns of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub source: Source,
    pub org_name: Option<String>,
    pub org_title: Option<String>,
    pub link: String,
}

impl DatasetRecord {
    /// Marks the dataset as present on the provenance's catalogue and fills
    /// that catalogue's organization and link columns
    pub fn apply_provenance(&mut self, provenance: Provenance) {
        match provenance.source {
            Source::Registry => {
                self.on_registry = true;
                self.registry_org_name = provenance.org_name;
                self.registry_org_title = provenance.org_title;
                self.registry_link = Some(provenance.link);
            }
            Source::Catalogue => {
                self.on_catalogue = true;
                self.catalogue_org_name = provenance.org_name;
                self.catalogue_org_title = provenance.org_title;
                self.catalogue_link = Some(provenance.link);
            }
        }
    }
}

impl ResourceRecord {
    /// Fills the deep-link column of the given catalogue
    pub fn set_link(&mut self, profile: &SourceProfile) {
        let link = profile.resource_link(&self.dataset_id, &self.id);
        match profile.source {
            Source::Registry => self.registry_link = Some(link),
            Source::Catalogue => self.catalogue_link = Some(link),
        }
    }
}

/// Maps a `package_show` payload to a dataset row
///
/// Compliance flags and `modified` are left unset; they are derived once the
/// resource table is complete.
pub fn extract_dataset(
    payload: &Value,
    profile: &SourceProfile,
) -> Result<DatasetRecord, ExtractError> {
    let id = required_str(payload, "dataset", "id")?;

    let maintainer_email = first_string(payload, MAINTAINER_EMAIL).map(|e| e.to_lowercase());
    let maintainer_name = maintainer_email.as_deref().map(infer_name_from_email);

    let frequency = match payload.get("frequency") {
        Some(Value::String(frequency)) => Some(frequency.clone()),
        Some(Value::Null) | None => {
            tracing::warn!("Dataset {}: frequency is missing", id);
            None
        }
        Some(other) => {
            tracing::warn!("Dataset {}: frequency is {} (not a string)", id, other);
            Some(other.to_string())
        }
    };

    let num_resources = match payload.get("num_resources") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| invalid("dataset", &id, "num_resources", "not a count"))?,
        ),
    };

    let provenance = extract_provenance_for(payload, profile, &id);
    let mut record = DatasetRecord {
        title_en: first_string(payload, DATASET_TITLE_EN),
        title_fr: first_string(payload, DATASET_TITLE_FR),
        published: timestamp(payload, "dataset", &id, PUBLISHED)?,
        metadata_created: timestamp(payload, "dataset", &id, &[&["metadata_created"]])?,
        metadata_modified: timestamp(payload, "dataset", &id, &[&["metadata_modified"]])?,
        num_resources,
        maintainer_email,
        maintainer_name,
        collection: first_string(payload, &[&["collection"]]),
        frequency,
        harvested: is_harvested(payload),
        internal: flag(payload.get("internal")) || flag(payload.get("private")),
        id,
        ..DatasetRecord::default()
    };
    record.apply_provenance(provenance);

    Ok(record)
}

/// Reads the organization and deep link of a dataset payload
pub fn extract_provenance(
    payload: &Value,
    profile: &SourceProfile,
) -> Result<Provenance, ExtractError> {
    let id = required_str(payload, "dataset", "id")?;
    Ok(extract_provenance_for(payload, profile, &id))
}

fn extract_provenance_for(payload: &Value, profile: &SourceProfile, id: &str) -> Provenance {
    Provenance {
        source: profile.source,
        org_name: first_string(payload, &[&["organization", "name"]]),
        org_title: first_string(payload, &[&["organization", "title"]])
            .map(|title| primary_title(&title)),
        link: profile.dataset_link(id),
    }
}

/// Maps a resource payload to a resource row, probing its URL
///
/// A URL that is not well formed gets [`UNREACHABLE_URL_STATUS`] without any
/// network call. So does a URL whose probe fails at the transport level (dead
/// host, DNS failure); the row is kept either way.
pub async fn extract_resource(
    payload: &Value,
    profile: &SourceProfile,
    probe: &HttpSession,
) -> Result<ResourceRecord, ExtractError> {
    let mut record = resource_fields(payload, profile)?;

    record.url_status = match record.url.as_deref().filter(|url| is_well_formed_url(url)) {
        Some(url) => match probe.status_for(url).await {
            Ok(status) => i32::from(status),
            Err(e) => {
                tracing::warn!("Resource {}: {}", record.id, e);
                UNREACHABLE_URL_STATUS
            }
        },
        None => UNREACHABLE_URL_STATUS,
    };

    Ok(record)
}

/// Every resource column except `url_status`, which is left at the sentinel
pub fn resource_fields(
    payload: &Value,
    profile: &SourceProfile,
) -> Result<ResourceRecord, ExtractError> {
    let id = required_str(payload, "resource", "id")?;
    let dataset_id = required_str(payload, "resource", "package_id")?;
    let created = timestamp(payload, "resource", &id, &[&["created"]])?
        .ok_or(ExtractError::MissingField {
            record: "resource",
            field: "created",
        })?;

    let mut record = ResourceRecord {
        title_en: first_string(payload, RESOURCE_TITLE_EN),
        title_fr: first_string(payload, RESOURCE_TITLE_FR),
        created,
        metadata_modified: timestamp(payload, "resource", &id, &[&["metadata_modified"]])?,
        format: first_string(payload, &[&["format"]]),
        lang: languages(payload, &id)?,
        resource_type: first_string(payload, &[&["resource_type"]]),
        url: first_string(payload, &[&["url"]]),
        url_status: UNREACHABLE_URL_STATUS,
        registry_link: None,
        catalogue_link: None,
        id,
        dataset_id,
    };
    record.set_link(profile);

    Ok(record)
}

/// Whether the text is an absolute http(s) or ftp URL with a host
pub fn is_well_formed_url(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(text) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https" | "ftp")
                && url.host_str().map(|host| !host.is_empty()).unwrap_or(false)
        }
        Err(_) => false,
    }
}

/// Parses the timestamp shapes CKAN catalogues emit
///
/// Accepts ISO 8601 with or without fractional seconds, the registry's
/// `YYYY-MM-DD HH:MM:SS`, RFC 3339 with an offset (converted to UTC) and bare
/// dates (midnight).
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Keeps the first segment of a bilingual `English | French` title
fn primary_title(title: &str) -> String {
    title.split('|').next().unwrap_or(title).trim().to_string()
}

fn languages(payload: &Value, id: &str) -> Result<String, ExtractError> {
    let codes: Vec<&str> = match payload.get("language") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(code)) if !code.is_empty() => vec![code.as_str()],
        _ => Vec::new(),
    };

    let converted = codes
        .into_iter()
        .map(|code| {
            to_iso639_3(code).ok_or_else(|| ExtractError::UnknownLanguage {
                id: id.to_string(),
                code: code.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(converted.join("/"))
}

fn is_harvested(payload: &Value) -> bool {
    if flag(payload.get("harvested")) {
        return true;
    }
    if HARVEST_KEYS
        .iter()
        .any(|key| payload.get(*key).map(is_present).unwrap_or(false))
    {
        return true;
    }
    payload
        .get("extras")
        .and_then(Value::as_array)
        .map(|extras| {
            extras.iter().any(|extra| {
                extra["key"]
                    .as_str()
                    .map(|key| HARVEST_KEYS.contains(&key))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn is_present(value: &Value) -> bool {
    !(value.is_null() || value.as_str() == Some(""))
}

fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(payload, |value, key| value.get(*key))
        .filter(|value| is_present(value))
}

/// Returns the first present value along the fallback paths
fn first_present<'a>(payload: &'a Value, paths: &[FieldPath]) -> Option<&'a Value> {
    paths.iter().find_map(|path| lookup(payload, path))
}

fn first_string(payload: &Value, paths: &[FieldPath]) -> Option<String> {
    first_present(payload, paths)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn required_str(
    payload: &Value,
    record: &'static str,
    field: &'static str,
) -> Result<String, ExtractError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ExtractError::MissingField { record, field })
}

fn timestamp(
    payload: &Value,
    record: &'static str,
    id: &str,
    paths: &[FieldPath],
) -> Result<Option<NaiveDateTime>, ExtractError> {
    let Some(value) = first_present(payload, paths) else {
        return Ok(None);
    };
    let field = paths.first().and_then(|path| path.last()).copied().unwrap_or("timestamp");
    let text = value
        .as_str()
        .ok_or_else(|| invalid(record, id, field, "not a string"))?;
    parse_timestamp(text)
        .map(Some)
        .ok_or_else(|| invalid(record, id, field, &format!("unrecognized timestamp `{}`", text)))
}

fn invalid(record: &'static str, id: &str, field: &'static str, message: &str) -> ExtractError {
    ExtractError::InvalidField {
        record,
        id: id.to_string(),
        field,
        message: message.to_string(),
    }
}
