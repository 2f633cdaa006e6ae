//! Minimal W3C WebDriver client
//!
//! Only the handful of commands the scanner needs are implemented: create a
//! session, navigate, read the page source and close the session. Commands are
//! plain JSON over HTTP against a running driver (msedgedriver, chromedriver,
//! geckodriver).

use crate::catalogue::browser::BrowserSession;
use crate::catalogue::CatalogueError;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;

/// A live session on a WebDriver endpoint
#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverSession {
    /// Starts a new browser session
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Base URL of the driver, e.g. `http://localhost:9515`
    /// * `browser_name` - `MicrosoftEdge`, `chrome` or `firefox`
    /// * `args` - Command-line arguments for the browser
    /// * `accept_insecure_certs` - Let the browser ignore certificate errors
    /// * `timeout` - Per-command timeout
    pub async fn connect(
        endpoint: &str,
        browser_name: &str,
        args: &[String],
        accept_insecure_certs: bool,
        timeout: Duration,
    ) -> Result<Self, CatalogueError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogueError::Browser(format!("failed to build driver client: {}", e)))?;

        let mut session = Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            session_id: String::new(),
        };

        let value = session
            .command(
                Method::POST,
                "session",
                Some(capabilities(browser_name, args, accept_insecure_certs)),
            )
            .await?;
        session.session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| CatalogueError::Browser("driver returned no session id".to_string()))?
            .to_string();

        tracing::info!(
            "Started {} session {} on {}",
            browser_name,
            session.session_id,
            session.endpoint
        );
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Sends one command and returns the `value` of the reply
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, CatalogueError> {
        let url = format!("{}/{}", self.endpoint, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogueError::Browser(format!("{}: {}", url, e)))?;
        let status = response.status();
        let reply: Value = response
            .json()
            .await
            .map_err(|e| CatalogueError::Browser(format!("{}: invalid reply: {}", url, e)))?;

        let value = reply.get("value").cloned().unwrap_or(Value::Null);
        if !status.is_success() {
            let error = value["error"].as_str().unwrap_or("unknown error");
            let message = value["message"].as_str().unwrap_or_default();
            return Err(CatalogueError::Browser(format!(
                "{} ({}): {}",
                error, status, message
            )));
        }
        Ok(value)
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), CatalogueError> {
        let path = format!("session/{}/url", self.session_id);
        self.command(Method::POST, &path, Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, CatalogueError> {
        let path = format!("session/{}/source", self.session_id);
        let value = self.command(Method::GET, &path, None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CatalogueError::Browser("page source is not a string".to_string()))
    }

    /// Ends the session and closes the browser window
    async fn close(&self) -> Result<(), CatalogueError> {
        let path = format!("session/{}", self.session_id);
        self.command(Method::DELETE, &path, None).await?;
        tracing::info!("Closed browser session {}", self.session_id);
        Ok(())
    }
}

/// Capabilities for a new session, with the vendor-specific options key
fn capabilities(browser_name: &str, args: &[String], accept_insecure_certs: bool) -> Value {
    let options_key = match browser_name.to_ascii_lowercase().as_str() {
        "firefox" => "moz:firefoxOptions",
        "chrome" | "chromium" => "goog:chromeOptions",
        _ => "ms:edgeOptions",
    };

    let mut always_match = serde_json::Map::new();
    always_match.insert("browserName".to_string(), json!(browser_name));
    always_match.insert("acceptInsecureCerts".to_string(), json!(accept_insecure_certs));
    always_match.insert(options_key.to_string(), json!({ "args": args }));

    json!({ "capabilities": { "alwaysMatch": always_match } })
}
