//! HTTP client for the automation backend
//!
//! Thin request/response wrapper: builds URLs, attaches auth and JSON
//! headers, and turns non-2xx responses into `TransportError::Http`.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;

use super::{TransportError, require_run_id};
use crate::config::BackendConfig;

/// Backend HTTP client
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Full URL for a configured path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header("accept", "application/json")
            .header("content-type", "application/json");

        if let Some(auth) = &self.config.basic_auth {
            let (user, pass) = match auth.split_once(':') {
                Some((user, pass)) => (user, Some(pass)),
                None => (auth.as_str(), None),
            };
            builder = builder.basic_auth(user, pass);
        }
        builder
    }

    /// Start a run with a prepared payload; returns the run key.
    pub async fn start_run(&self, payload: &Value) -> Result<String, TransportError> {
        let path = self.config.start_path.clone();
        let response = self.request(Method::POST, &path).json(payload).send().await?;
        let body = Self::read_json(response, "POST", &path).await?;

        body.get("runKey")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or_else(|| TransportError::InvalidResponse(format!("start response has no runKey: {}", body)))
    }

    /// Long-poll for events after `cursor`, letting the server hold up to `wait_secs`.
    pub async fn fetch_events(&self, run_id: &str, cursor: u64, wait_secs: u64) -> Result<Value, TransportError> {
        require_run_id(run_id)?;
        let path = self.config.events_path.clone();
        let timeout = Duration::from_secs(wait_secs) + Duration::from_millis(self.config.request_slack_ms);

        let response = self
            .request(Method::GET, &path)
            .query(&[
                ("runKey", run_id.to_string()),
                ("cursor", cursor.to_string()),
                ("waitSec", wait_secs.to_string()),
            ])
            .timeout(timeout)
            .send()
            .await?;

        Self::read_json(response, "GET", &path).await
    }

    /// Fetch the full current status of a run.
    pub async fn fetch_progress(&self, run_id: &str) -> Result<Value, TransportError> {
        require_run_id(run_id)?;
        let path = self.config.progress_path.clone();

        let response = self
            .request(Method::GET, &path)
            .query(&[("runKey", run_id)])
            .timeout(Duration::from_millis(self.config.request_slack_ms))
            .send()
            .await?;

        Self::read_json(response, "GET", &path).await
    }

    async fn read_json(response: reqwest::Response, method: &str, path: &str) -> Result<Value, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: format!("{} @ {} {}\n{}", status, method, path, body),
            });
        }

        response.json::<Value>().await.map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.config.base_url)
            .field("basic_auth", &self.config.basic_auth.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
