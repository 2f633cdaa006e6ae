use crate::config::types::{
    CatalogueConfig, CollectorConfig, Config, FetchMode, HttpConfig, OutputConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_user_agent_config(&config.user_agent)?;
    validate_http_config(&config.http)?;
    validate_collector_config(&config.collector)?;
    validate_catalogue_config("registry", &config.registry)?;
    if let Some(catalogue) = &config.catalogue {
        validate_catalogue_config("catalogue", catalogue)?;
    }
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.scanner_name.is_empty() {
        return Err(ConfigError::Validation(
            "scanner_name cannot be empty".to_string(),
        ));
    }

    if !config
        .scanner_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "scanner_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.scanner_name
        )));
    }

    validate_email(&config.contact_email)
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout == 0 {
        return Err(ConfigError::Validation(
            "timeout must be >= 1s".to_string(),
        ));
    }

    // Retry count stays bounded
    if config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 20, got {}",
            config.max_retries
        )));
    }

    if !config.backoff_factor.is_finite() || config.backoff_factor < 0.0 {
        return Err(ConfigError::Validation(format!(
            "backoff_factor must be a non-negative number, got {}",
            config.backoff_factor
        )));
    }

    if !config.backoff_max.is_finite() || config.backoff_max < 0.0 {
        return Err(ConfigError::Validation(format!(
            "backoff_max must be a non-negative number, got {}",
            config.backoff_max
        )));
    }

    if let Some(status) = config
        .retry_statuses
        .iter()
        .find(|s| !(500..=599).contains(*s))
    {
        return Err(ConfigError::Validation(format!(
            "retry_statuses may only contain 5xx codes, got {}",
            status
        )));
    }

    Ok(())
}

fn validate_collector_config(config: &CollectorConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 256 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 256, got {}",
            config.max_workers
        )));
    }
    Ok(())
}

fn validate_catalogue_config(section: &str, config: &CatalogueConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid {}.base_url '{}': {}", section, config.base_url, e))
    })?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "{}.base_url must use http or https, got '{}'",
            section, config.base_url
        )));
    }

    if !config.dataset_link.contains("{dataset}") {
        return Err(ConfigError::InvalidTemplate(format!(
            "{}.dataset_link must contain {{dataset}}: '{}'",
            section, config.dataset_link
        )));
    }

    if !config.resource_link.contains("{resource}") {
        return Err(ConfigError::InvalidTemplate(format!(
            "{}.resource_link must contain {{resource}}: '{}'",
            section, config.resource_link
        )));
    }

    if config.mode == FetchMode::Browser {
        let driver = config.webdriver_url.as_deref().ok_or_else(|| {
            ConfigError::Validation(format!(
                "{}.webdriver_url is required in browser mode",
                section
            ))
        })?;
        Url::parse(driver).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid {}.webdriver_url '{}': {}", section, driver, e))
        })?;
    }

    for (field, value) in &config.filters {
        if field.is_empty() || value.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{}.filters entries need a field and a value",
                section
            )));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
