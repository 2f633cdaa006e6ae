use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for the catalogue scanner
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    /// The primary (public) registry
    pub registry: CatalogueConfig,
    /// The secondary, internal catalogue; scanned only on request
    #[serde(default)]
    pub catalogue: Option<CatalogueConfig>,
    pub output: OutputConfig,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the scanner
    #[serde(rename = "scanner-name")]
    pub scanner_name: String,

    /// Version of the scanner
    #[serde(rename = "scanner-version")]
    pub scanner_version: String,

    /// Email address for scanner-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent string: `Name/Version (+email)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.scanner_name, self.scanner_version, self.contact_email
        )
    }
}

/// Outbound HTTP behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout: u64,

    /// Maximum number of retries after the first attempt
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base backoff factor in seconds
    #[serde(rename = "backoff-factor")]
    pub backoff_factor: f64,

    /// Upper bound of a single backoff sleep, in seconds
    #[serde(rename = "backoff-max")]
    pub backoff_max: f64,

    /// Response codes that trigger a retry
    #[serde(rename = "retry-statuses")]
    pub retry_statuses: Vec<u16>,

    /// Skip TLS verification when probing resource URLs
    #[serde(rename = "probe-skip-tls-verify")]
    pub probe_skip_tls_verify: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            max_retries: 5,
            backoff_factor: 1.0,
            backoff_max: 120.0,
            retry_statuses: vec![500, 502, 503, 504],
            probe_skip_tls_verify: true,
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Maximum number of datasets fetched concurrently
    #[serde(rename = "max-workers")]
    pub max_workers: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            max_workers: (cpus + 4).min(32),
        }
    }
}

/// How a catalogue is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Plain HTTP requests against the JSON action API
    #[default]
    Api,
    /// Navigation through an authenticated browser session
    Browser,
}

/// One CKAN catalogue
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueConfig {
    /// Action API base URL (e.g. `https://open.canada.ca/data/api/3/action/`)
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(default)]
    pub mode: FetchMode,

    /// Dataset permalink template, with a `{dataset}` placeholder
    #[serde(rename = "dataset-link")]
    pub dataset_link: String,

    /// Resource permalink template, with `{dataset}` and `{resource}` placeholders
    #[serde(rename = "resource-link")]
    pub resource_link: String,

    #[serde(rename = "skip-tls-verify", default)]
    pub skip_tls_verify: bool,

    /// WebDriver endpoint, required in browser mode
    #[serde(rename = "webdriver-url", default)]
    pub webdriver_url: Option<String>,

    #[serde(rename = "browser-name", default = "default_browser_name")]
    pub browser_name: String,

    #[serde(rename = "browser-args", default = "default_browser_args")]
    pub browser_args: Vec<String>,

    /// Search filters joined with AND semantics; empty means list everything
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

fn default_browser_name() -> String {
    "MicrosoftEdge".to_string()
}

fn default_browser_args() -> Vec<String> {
    vec!["--headless=new".to_string(), "--log-level=3".to_string()]
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the exported inventories
    pub directory: String,

    /// Optional CSV (`format,format_type,open`) replacing the built-in format table
    #[serde(rename = "formats-table", default)]
    pub formats_table: Option<String>,
}
