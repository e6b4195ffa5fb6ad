//! Nautobot client module
//!
//! Provides `NautobotClient` for paging through REST list endpoints and
//! GraphQL queries. Every request waits on the shared rate limiter first.

use super::{Auth, RateLimiter, truncate_body};
use crate::config::QueryApiConfig;
use crate::error::FetchError;
use crate::etl::{Page, PageSource, QueryDefinition};
use eyre::{Context, Result};
use reqwest::{Client, header};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Nautobot client for making rate-limited API requests.
///
/// Cloning is cheap and clones share the same rate limiter, so concurrent jobs
/// holding clones still respect one process-wide request spacing.
///
/// # Example
/// ```no_run
/// use nautobot_hec_exporter::client::{Auth, NautobotClient, RateLimiter};
/// use nautobot_hec_exporter::etl::{PageSource, QueryDefinition};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use url::Url;
///
/// # async fn example() -> eyre::Result<()> {
/// let url = Url::parse("https://nautobot.example.com")?;
/// let client = NautobotClient::try_new(
///     url,
///     Auth::Token("0123456789abcdef".to_string()),
///     Duration::from_secs(30),
///     true,
///     Arc::new(RateLimiter::new(30.0)),
/// )?;
///
/// let page = client
///     .fetch_page(&QueryDefinition::rest("dcim/devices"), 200, 0)
///     .await?;
/// println!("{} devices", page.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct NautobotClient {
    client: Client,
    url: Url,
    limiter: Arc<RateLimiter>,
}

impl NautobotClient {
    /// Create a new NautobotClient.
    ///
    /// # Arguments
    /// * `url` - Base Nautobot URL (the `/api/` prefix is added per request)
    /// * `auth` - Authentication method, normally [`Auth::Token`]
    /// * `timeout` - Per-request timeout
    /// * `verify_tls` - Whether to verify server certificates
    /// * `limiter` - Rate limiter shared by every request of the run
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn try_new(
        url: Url,
        auth: Auth,
        timeout: Duration,
        verify_tls: bool,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, "application/json".parse()?);
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
            .with_context(|| "Failed to build Nautobot HTTP client")?;

        Ok(Self {
            client,
            url: with_trailing_slash(url),
            limiter,
        })
    }

    /// Build a client (and its rate limiter) from configuration
    pub fn from_config(config: &QueryApiConfig) -> Result<Self> {
        Self::try_new(
            config.url.clone(),
            Auth::Token(config.token.clone()),
            config.timeout,
            config.verify_tls,
            Arc::new(RateLimiter::new(config.max_rps)),
        )
    }

    /// Get the base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Verify the connection and token against Nautobot.
    ///
    /// Makes a GET request to /api/status/.
    pub async fn test_connection(&self) -> Result<Value> {
        self.limiter.wait().await;
        let url = self.url.join("api/status/")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to reach Nautobot at {}", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Nautobot status check failed ({}): {}", status, truncate_body(&body));
        }

        response
            .json()
            .await
            .with_context(|| "Failed to parse Nautobot status response")
    }

    /// GET one page of a REST list endpoint
    async fn fetch_rest(
        &self,
        endpoint: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page, FetchError> {
        let url = self.url.join(&rest_path(endpoint))?;
        log::debug!("GET {} limit={} offset={}", url, limit, offset);

        let response = self
            .client
            .get(url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        let body = checked_json(response).await?;
        decode_rest_page(body)
    }

    /// POST one page of a GraphQL query
    async fn fetch_graphql(
        &self,
        root_field: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page, FetchError> {
        let url = self.url.join("api/graphql/")?;
        log::debug!(
            "POST {} ({}) limit={} offset={}",
            url,
            root_field,
            limit,
            offset
        );

        let response = self
            .client
            .post(url)
            .json(&json!({
                "query": query,
                "variables": {"limit": limit, "offset": offset},
            }))
            .send()
            .await?;
        let body = checked_json(response).await?;
        decode_graphql_page(body, root_field)
    }
}

impl PageSource for NautobotClient {
    async fn fetch_page(
        &self,
        query: &QueryDefinition,
        limit: usize,
        offset: usize,
    ) -> Result<Page, FetchError> {
        self.limiter.wait().await;
        match query {
            QueryDefinition::Rest { endpoint } => self.fetch_rest(endpoint, limit, offset).await,
            QueryDefinition::Graphql { root_field, query } => {
                self.fetch_graphql(root_field, query, limit, offset).await
            }
        }
    }
}

impl std::fmt::Display for NautobotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// `dcim/devices` → `api/dcim/devices/`
fn rest_path(endpoint: &str) -> String {
    let endpoint = endpoint.trim_matches('/');
    let endpoint = endpoint.strip_prefix("api/").unwrap_or(endpoint);
    format!("api/{}/", endpoint)
}

async fn checked_json(response: reqwest::Response) -> Result<Value, FetchError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }
    response.json().await.map_err(|e| FetchError::Decode(e.to_string()))
}

/// Accepts the paginated envelope `{count, next, previous, results}` or a
/// bare array.
fn decode_rest_page(body: Value) -> Result<Page, FetchError> {
    match body {
        Value::Array(records) => Ok(Page::new(records)),
        Value::Object(mut map) => {
            let records = match map.remove("results") {
                Some(Value::Array(records)) => records,
                _ => {
                    return Err(FetchError::Decode(
                        "expected a 'results' array in list response".to_string(),
                    ));
                }
            };
            let page = Page::new(records);
            Ok(match map.get("next") {
                Some(next) => page.with_has_more(!next.is_null()),
                None => page,
            })
        }
        _ => Err(FetchError::Decode(
            "list response is neither an object nor an array".to_string(),
        )),
    }
}

fn decode_graphql_page(body: Value, root_field: &str) -> Result<Page, FetchError> {
    if let Some(errors) = body.get("errors")
        && errors.as_array().is_some_and(|e| !e.is_empty())
    {
        return Err(FetchError::Query(errors.to_string()));
    }

    let data = body
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| FetchError::Decode("GraphQL response has no 'data' object".to_string()))?;

    match data.get(root_field) {
        Some(Value::Array(records)) => Ok(Page::new(records.clone())),
        Some(Value::Null) | None => Ok(Page::default()),
        Some(_) => Err(FetchError::Decode(format!(
            "GraphQL field '{}' is not a list",
            root_field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> NautobotClient {
        NautobotClient::try_new(
            Url::parse(base).unwrap(),
            Auth::Token("t".to_string()),
            Duration::from_secs(5),
            true,
            Arc::new(RateLimiter::new(100.0)),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_keeps_sub_path() {
        let nb = client("https://nb.example.com/nautobot");
        assert_eq!(nb.url().as_str(), "https://nb.example.com/nautobot/");
        assert_eq!(
            nb.url().join(&rest_path("/dcim/devices/")).unwrap().as_str(),
            "https://nb.example.com/nautobot/api/dcim/devices/"
        );
        assert_eq!(rest_path("api/ipam/vlans"), "api/ipam/vlans/");
    }

    #[test]
    fn test_clones_share_limiter() {
        let nb = client("https://nb.example.com");
        let other = nb.clone();
        assert!(Arc::ptr_eq(nb.limiter(), other.limiter()));
    }

    #[test]
    fn test_decode_rest_envelope() {
        let page = decode_rest_page(json!({
            "count": 3,
            "next": "https://nb/api/dcim/devices/?limit=2&offset=2",
            "previous": null,
            "results": [{"id": 1}, {"id": 2}]
        }))
        .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.has_more, Some(true));

        let last = decode_rest_page(json!({"next": null, "results": [{"id": 3}]})).unwrap();
        assert_eq!(last.has_more, Some(false));

        let bare = decode_rest_page(json!([{"id": 1}])).unwrap();
        assert_eq!(bare.has_more, None);

        assert!(matches!(
            decode_rest_page(json!({"detail": "nope"})),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_graphql_errors_are_fetch_errors() {
        let err = decode_graphql_page(
            json!({"data": null, "errors": [{"message": "Cannot query field 'x'"}]}),
            "devices",
        )
        .unwrap_err();
        match err {
            FetchError::Query(msg) => assert!(msg.contains("Cannot query field")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_graphql_records() {
        let page = decode_graphql_page(
            json!({"data": {"devices": [{"name": "a"}, {"name": "b"}]}, "errors": []}),
            "devices",
        )
        .unwrap();
        assert_eq!(page.len(), 2);

        let empty = decode_graphql_page(json!({"data": {}}), "devices").unwrap();
        assert!(empty.is_empty());

        assert!(decode_graphql_page(json!({}), "devices").is_err());
    }
}
