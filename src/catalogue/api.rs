//! JSON action API client

use crate::catalogue::{unwrap_envelope, CatalogueClient, CatalogueError, Source, SourceProfile};
use crate::config::{CatalogueConfig, HttpConfig, UserAgentConfig};
use crate::session::{HttpError, HttpSession};
use async_trait::async_trait;
use serde_json::Value;

/// A catalogue reached through plain HTTP GET requests
#[derive(Debug, Clone)]
pub struct ApiCatalogue {
    profile: SourceProfile,
    session: HttpSession,
}

impl ApiCatalogue {
    pub fn new(profile: SourceProfile, session: HttpSession) -> Self {
        Self { profile, session }
    }

    /// Builds the client and its own session (TLS verification per catalogue)
    pub fn from_config(
        source: Source,
        catalogue: &CatalogueConfig,
        http: &HttpConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, HttpError> {
        let session = HttpSession::new(http, user_agent, catalogue.skip_tls_verify)?;
        Ok(Self::new(
            SourceProfile::from_config(source, catalogue),
            session,
        ))
    }
}

#[async_trait]
impl CatalogueClient for ApiCatalogue {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn request(&self, url: &str) -> Result<Value, CatalogueError> {
        tracing::debug!("GET {}", url);
        let response = self.session.get(url).await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(CatalogueError::UnexpectedStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|e| HttpError::Request {
            url: url.to_string(),
            source: e,
        })?;
        let data: Value = serde_json::from_str(&body).map_err(|e| CatalogueError::Json {
            url: url.to_string(),
            source: e,
        })?;

        unwrap_envelope(url, data)
    }
}
