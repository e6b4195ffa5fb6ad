//! CLI helper functions

use crate::{
    client::{HecClient, NautobotClient},
    config::ExporterConfig,
    etl::{DeliveryClient, RunControl},
    export::{ExportManifest, ExportOrchestrator, ExportSettings, RunMode, RunReport},
};
use eyre::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options of the `export` command
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// YAML manifest replacing the built-in one
    pub manifest: Option<PathBuf>,
    /// Job names to run; empty runs every job
    pub only: Vec<String>,
    pub mode: RunMode,
    pub output_dir: Option<PathBuf>,
    /// Cancel the run after this long
    pub timeout: Option<Duration>,
}

/// Load and validate configuration from environment variables
///
/// Expected environment variables:
/// - NAUTOBOT_URL, NAUTOBOT_TOKEN: query API (required)
/// - SPLUNK_HEC_URL, SPLUNK_HEC_TOKEN: ingestion endpoint (required)
/// - NAUTOBOT_* / SPLUNK_* tuning variables (optional)
pub fn load_config() -> Result<ExporterConfig> {
    ExporterConfig::from_env().context("Invalid configuration")
}

/// Load the manifest from `path`, or the built-in one for the configured API
pub fn load_manifest(path: Option<&Path>, config: Option<&ExporterConfig>) -> Result<ExportManifest> {
    match path {
        Some(path) => {
            log::info!("Loading export manifest from {}", path.display());
            ExportManifest::read(path)
        }
        None => {
            let api = config.map(|c| c.query.api).unwrap_or_default();
            log::debug!("Using built-in {:?} export manifest", api);
            Ok(ExportManifest::for_api(api))
        }
    }
}

/// Run an export
///
/// Pipeline per job: NautobotClient → EventBuilder → BatchBuffer → HecClient
pub async fn run_export(config: &ExporterConfig, options: ExportOptions) -> Result<RunReport> {
    let manifest = load_manifest(options.manifest.as_deref(), Some(config))?;
    // Fail on unknown job names before connecting anywhere
    manifest.select(&options.only)?;

    let source = NautobotClient::from_config(&config.query)
        .context("Failed to create Nautobot client")?;
    log::info!("Query API: {} ({:?})", source, config.query.api);

    let hec = HecClient::from_config(&config.hec).context("Failed to create HEC client")?;
    log::info!("HEC endpoint: {}", hec);
    let delivery = DeliveryClient::new(hec, config.hec.retry);

    let settings = ExportSettings::from_config(config)
        .with_mode(options.mode)
        .with_output_dir(options.output_dir);

    let control = RunControl::new();
    let timer = options.timeout.map(|timeout| control.cancel_after(timeout));

    let orchestrator =
        ExportOrchestrator::new(source, delivery, manifest, settings).with_control(control);
    let report = orchestrator.run(&options.only).await;

    if let Some(timer) = timer {
        timer.abort();
    }
    report
}

/// Test connectivity and credentials of both endpoints
pub async fn test_auth(config: &ExporterConfig) -> Result<()> {
    let nautobot = NautobotClient::from_config(&config.query)
        .context("Failed to create Nautobot client")?;
    let status = nautobot.test_connection().await?;
    let version = status
        .get("nautobot-version")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    log::info!("✓ Nautobot {} reachable (version {})", nautobot, version);

    let hec = HecClient::from_config(&config.hec).context("Failed to create HEC client")?;
    hec.test_connection().await?;
    log::info!("✓ HEC {} healthy", hec);

    Ok(())
}
