//! Splunk HTTP Event Collector client

use super::{Auth, truncate_body};
use crate::config::HecConfig;
use crate::etl::Loader;
use crate::event::NormalizedEvent;
use eyre::{Context, Result, eyre};
use reqwest::{Client, header};
use std::time::Duration;
use url::Url;

/// Client for the HEC event endpoint.
///
/// One [`load`](Loader::load) call is one POST: the batch is encoded as
/// newline-joined compact JSON objects (not a JSON array). Any 2xx status
/// means the whole batch was accepted; anything else fails the attempt.
#[derive(Clone, Debug)]
pub struct HecClient {
    client: Client,
    url: Url,
}

impl HecClient {
    /// Create a new HecClient posting to the full collector URL, e.g.
    /// `https://splunk:8088/services/collector/event`
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn try_new(url: Url, auth: Auth, timeout: Duration, verify_tls: bool) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse()?);
        if let Some(value) = auth.header_value() {
            let mut value: header::HeaderValue = value.parse()?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .with_context(|| "Failed to build HEC HTTP client")?;

        Ok(Self { client, url })
    }

    pub fn from_config(config: &HecConfig) -> Result<Self> {
        Self::try_new(
            config.url.clone(),
            Auth::new(&config.scheme, Some(config.token.clone())),
            config.timeout,
            config.verify_tls,
        )
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Encode events as the HEC body: one compact JSON object per line
    pub fn encode(events: &[NormalizedEvent]) -> Result<String> {
        Ok(events
            .iter()
            .map(NormalizedEvent::to_line)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| "Failed to serialize events")?
            .join("\n"))
    }

    /// POST an encoded payload once
    pub async fn post(&self, payload: String) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .body(payload)
            .send()
            .await
            .map_err(|e| eyre!("Failed to send HEC request: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("HEC returned {}: {}", status, truncate_body(&body));
        }
        Ok(())
    }

    /// The collector health endpoint for the configured URL.
    ///
    /// Both `…/services/collector` and `…/services/collector/event` map to
    /// `…/services/collector/health`. Other paths resolve `health` relative
    /// to the configured URL.
    pub fn health_url(&self) -> Result<Url> {
        let segments: Vec<&str> = self
            .url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let collector = segments
            .windows(2)
            .position(|pair| pair == ["services", "collector"]);

        match collector {
            Some(at) => {
                let mut url = self.url.clone();
                let mut path = segments[..at + 2].join("/");
                path.insert(0, '/');
                path.push_str("/health");
                url.set_path(&path);
                url.set_query(None);
                Ok(url)
            }
            None => Ok(self.url.join("health")?),
        }
    }

    /// Query the collector health endpoint
    pub async fn test_connection(&self) -> Result<()> {
        let url = self.health_url()?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to reach HEC at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("HEC health check failed ({}): {}", status, truncate_body(&body));
        }
        Ok(())
    }
}

impl Loader for HecClient {
    type Item = NormalizedEvent;

    async fn load(&self, items: &[Self::Item]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let payload = Self::encode(items)?;
        log::trace!("Posting {} event(s), {} bytes", items.len(), payload.len());
        self.post(payload).await?;
        Ok(items.len())
    }
}

impl std::fmt::Display for HecClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}
