//! Browser-driven catalogue client
//!
//! Some catalogues sit behind interactive single sign-on and can only be read
//! through a browser that carries the ambient SSO state. Requests become page
//! navigations, and the JSON envelope is recovered from the rendered page.

use crate::catalogue::page::extract_json_payload;
use crate::catalogue::{unwrap_envelope, CatalogueClient, CatalogueError, SourceProfile};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

/// A single browser tab that can be driven remotely
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigates the tab to the URL and waits for the page to load
    async fn navigate(&self, url: &str) -> Result<(), CatalogueError>;

    /// Returns the source of the currently rendered page
    async fn page_source(&self) -> Result<String, CatalogueError>;

    /// Ends the session
    async fn close(&self) -> Result<(), CatalogueError> {
        Ok(())
    }
}

/// A catalogue reached through a browser session
///
/// A browser tab can only show one page at a time, so every request holds a
/// single-permit semaphore from the first navigation until the page source has
/// been read. Callers may fan out freely; requests are served one by one.
pub struct BrowserCatalogue {
    profile: SourceProfile,
    browser: Box<dyn BrowserSession>,
    navigation: Semaphore,
}

impl BrowserCatalogue {
    pub fn new(profile: SourceProfile, browser: impl BrowserSession + 'static) -> Self {
        Self {
            profile,
            browser: Box::new(browser),
            navigation: Semaphore::new(1),
        }
    }

    /// Closes the underlying browser session once pending requests are done
    pub async fn close(&self) -> Result<(), CatalogueError> {
        let _permit = self
            .navigation
            .acquire()
            .await
            .map_err(|_| CatalogueError::Browser("navigation lock closed".to_string()))?;
        self.browser.close().await?;
        self.navigation.close();
        Ok(())
    }
}

#[async_trait]
impl CatalogueClient for BrowserCatalogue {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn request(&self, url: &str) -> Result<Value, CatalogueError> {
        let permit = self
            .navigation
            .acquire()
            .await
            .map_err(|_| CatalogueError::Browser("navigation lock closed".to_string()))?;

        tracing::debug!("NAVIGATE {}", url);
        // The SSO redirect drops the query string on the first visit
        self.browser.navigate(url).await?;
        self.browser.navigate(url).await?;
        let page = self.browser.page_source().await?;
        drop(permit);

        let data = extract_json_payload(&page).ok_or_else(|| CatalogueError::NoPayload {
            url: url.to_string(),
        })?;
        unwrap_envelope(url, data)
    }
}
