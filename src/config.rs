//! Runtime configuration
//!
//! Read once from the environment (after the dotenv file is sourced) and
//! threaded into each component at construction. Nothing reads process-wide
//! state afterwards.
//!
//! Expected environment variables:
//! - NAUTOBOT_URL, NAUTOBOT_TOKEN (required)
//! - NAUTOBOT_API: `rest` (default) or `graphql`
//! - NAUTOBOT_VERIFY_TLS, NAUTOBOT_TIMEOUT_SECS, NAUTOBOT_PAGE_SIZE, NAUTOBOT_MAX_RPS
//! - SPLUNK_HEC_URL, SPLUNK_HEC_TOKEN (required)
//! - SPLUNK_HEC_SCHEME: `splunk` (default), `bearer` or `token`
//! - SPLUNK_INDEX, SPLUNK_SOURCE, SPLUNK_HOST
//! - SPLUNK_VERIFY_TLS, SPLUNK_BATCH_SIZE, SPLUNK_TIMEOUT_SECS
//! - SPLUNK_RETRIES, SPLUNK_RETRY_DELAY_SECS

use crate::client::AuthType;
use crate::error::ConfigError;
use crate::etl::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Value shipped in sample `.env` files; never a real credential
pub const PLACEHOLDER_TOKEN: &str = "CHANGE_ME";

/// Which flavour of the query API the built-in manifest targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStyle {
    #[default]
    Rest,
    Graphql,
}

impl FromStr for ApiStyle {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "graphql" => Ok(Self::Graphql),
            _ => Err(()),
        }
    }
}

/// Query API (Nautobot) settings
#[derive(Debug, Clone)]
pub struct QueryApiConfig {
    pub url: Url,
    pub token: String,
    pub api: ApiStyle,
    pub verify_tls: bool,
    pub timeout: Duration,
    pub page_size: usize,
    pub max_rps: f64,
}

impl QueryApiConfig {
    pub fn new(url: Url, token: impl Into<String>) -> Self {
        Self {
            url,
            token: token.into(),
            api: ApiStyle::Rest,
            verify_tls: true,
            timeout: Duration::from_secs(30),
            page_size: 200,
            max_rps: 30.0,
        }
    }
}

/// Ingestion endpoint (HEC) settings
#[derive(Debug, Clone)]
pub struct HecConfig {
    pub url: Url,
    pub token: String,
    pub scheme: AuthType,
    pub index: String,
    pub source: String,
    pub host: Option<String>,
    pub verify_tls: bool,
    pub timeout: Duration,
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl HecConfig {
    pub fn new(url: Url, token: impl Into<String>) -> Self {
        Self {
            url,
            token: token.into(),
            scheme: AuthType::Splunk,
            index: "nautobot".to_string(),
            source: "nautobot".to_string(),
            host: None,
            verify_tls: true,
            timeout: Duration::from_secs(10),
            batch_size: 300,
            retry: RetryPolicy::default(),
        }
    }
}

/// Complete exporter configuration
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub query: QueryApiConfig,
    pub hec: HecConfig,
}

impl ExporterConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for missing or placeholder credentials and
    /// for values that cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let mut query = QueryApiConfig::new(env.url("NAUTOBOT_URL")?, env.secret("NAUTOBOT_TOKEN")?);
        query.api = env.parsed("NAUTOBOT_API", query.api)?;
        query.verify_tls = env.flag("NAUTOBOT_VERIFY_TLS", query.verify_tls)?;
        query.timeout = env.seconds("NAUTOBOT_TIMEOUT_SECS", query.timeout)?;
        query.page_size = env.number("NAUTOBOT_PAGE_SIZE", query.page_size)?;
        query.max_rps = env.number("NAUTOBOT_MAX_RPS", query.max_rps)?;

        let mut hec = HecConfig::new(env.url("SPLUNK_HEC_URL")?, env.secret("SPLUNK_HEC_TOKEN")?);
        hec.scheme = env.parsed("SPLUNK_HEC_SCHEME", hec.scheme)?;
        hec.index = env.optional("SPLUNK_INDEX").unwrap_or(hec.index);
        hec.source = env.optional("SPLUNK_SOURCE").unwrap_or(hec.source);
        hec.host = env.optional("SPLUNK_HOST");
        hec.verify_tls = env.flag("SPLUNK_VERIFY_TLS", hec.verify_tls)?;
        hec.timeout = env.seconds("SPLUNK_TIMEOUT_SECS", hec.timeout)?;
        hec.batch_size = env.number("SPLUNK_BATCH_SIZE", hec.batch_size)?;
        hec.retry = RetryPolicy::new(
            env.number("SPLUNK_RETRIES", hec.retry.max_attempts)?,
            env.seconds("SPLUNK_RETRY_DELAY_SECS", hec.retry.delay)?,
        );

        if query.page_size == 0 {
            return Err(invalid("NAUTOBOT_PAGE_SIZE", "must be at least 1"));
        }
        if hec.batch_size == 0 {
            return Err(invalid("SPLUNK_BATCH_SIZE", "must be at least 1"));
        }

        Ok(Self { query, hec })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn secret(&self, key: &str) -> Result<String, ConfigError> {
        let value = self.required(key)?;
        if value == PLACEHOLDER_TOKEN {
            return Err(ConfigError::Placeholder(key.to_string()));
        }
        Ok(value)
    }

    fn url(&self, key: &str) -> Result<Url, ConfigError> {
        let raw = self.required(key)?;
        Url::parse(&raw).map_err(|e| invalid(key, &e.to_string()))
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| invalid(key, &format!("unrecognized value '{}'", raw))),
            None => Ok(default),
        }
    }

    fn number<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, &e.to_string())),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key).map(|v| v.to_lowercase()).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some("0" | "false" | "no" | "off") => Ok(false),
            Some(other) => Err(invalid(key, &format!("'{}' is not a boolean", other))),
        }
    }

    fn seconds(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        match self.optional(key) {
            Some(raw) => {
                let secs: f64 = raw.parse().map_err(|e: std::num::ParseFloatError| invalid(key, &e.to_string()))?;
                Duration::try_from_secs_f64(secs).map_err(|e| invalid(key, &e.to_string()))
            }
            None => Ok(default),
        }
    }
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("NAUTOBOT_URL", "https://nautobot.example.com"),
        ("NAUTOBOT_TOKEN", "nb-token"),
        ("SPLUNK_HEC_URL", "https://splunk.example.com:8088/services/collector/event"),
        ("SPLUNK_HEC_TOKEN", "hec-token"),
    ];

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::from_lookup(lookup(REQUIRED)).unwrap();

        assert_eq!(config.query.api, ApiStyle::Rest);
        assert_eq!(config.query.page_size, 200);
        assert_eq!(config.query.max_rps, 30.0);
        assert_eq!(config.query.timeout, Duration::from_secs(30));
        assert_eq!(config.hec.scheme, AuthType::Splunk);
        assert_eq!(config.hec.index, "nautobot");
        assert_eq!(config.hec.source, "nautobot");
        assert_eq!(config.hec.host, None);
        assert_eq!(config.hec.batch_size, 300);
        assert_eq!(config.hec.retry, RetryPolicy::new(3, Duration::from_secs(2)));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("NAUTOBOT_API", "GraphQL"),
            ("NAUTOBOT_PAGE_SIZE", "50"),
            ("NAUTOBOT_MAX_RPS", "2.5"),
            ("NAUTOBOT_VERIFY_TLS", "false"),
            ("SPLUNK_HEC_SCHEME", "bearer"),
            ("SPLUNK_INDEX", "netops"),
            ("SPLUNK_HOST", "nb01"),
            ("SPLUNK_RETRIES", "5"),
            ("SPLUNK_RETRY_DELAY_SECS", "0.5"),
        ]);

        let config = ExporterConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.query.api, ApiStyle::Graphql);
        assert_eq!(config.query.page_size, 50);
        assert_eq!(config.query.max_rps, 2.5);
        assert!(!config.query.verify_tls);
        assert_eq!(config.hec.scheme, AuthType::Bearer);
        assert_eq!(config.hec.index, "netops");
        assert_eq!(config.hec.host.as_deref(), Some("nb01"));
        assert_eq!(config.hec.retry.max_attempts, 5);
        assert_eq!(config.hec.retry.delay, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_and_placeholder_credentials() {
        let missing = ExporterConfig::from_lookup(lookup(&REQUIRED[..3])).unwrap_err();
        assert_eq!(missing, ConfigError::Missing("SPLUNK_HEC_TOKEN".to_string()));

        let mut pairs = REQUIRED.to_vec();
        pairs[1] = ("NAUTOBOT_TOKEN", "CHANGE_ME");
        let placeholder = ExporterConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(placeholder, ConfigError::Placeholder("NAUTOBOT_TOKEN".to_string()));

        let mut pairs = REQUIRED.to_vec();
        pairs[3] = ("SPLUNK_HEC_TOKEN", "  ");
        assert!(matches!(
            ExporterConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SPLUNK_BATCH_SIZE", "lots"));
        assert!(matches!(
            ExporterConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { var, .. }) if var == "SPLUNK_BATCH_SIZE"
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("NAUTOBOT_PAGE_SIZE", "0"));
        assert!(ExporterConfig::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs[0] = ("NAUTOBOT_URL", "not a url");
        assert!(matches!(
            ExporterConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            for (key, value) in REQUIRED {
                std::env::set_var(key, value);
            }
            std::env::set_var("SPLUNK_BATCH_SIZE", "25");
        }

        let config = ExporterConfig::from_env().unwrap();
        assert_eq!(config.hec.batch_size, 25);
        assert_eq!(config.query.url.as_str(), "https://nautobot.example.com/");

        unsafe {
            for (key, _) in REQUIRED {
                std::env::remove_var(key);
            }
            std::env::remove_var("SPLUNK_BATCH_SIZE");
        }
    }
}
