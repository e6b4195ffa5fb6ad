//! Export orchestration
//!
//! Runs the selected jobs of a manifest: builds the reference caches each job
//! needs, then drives one [`Pipeline`] per job, either one after another or
//! all together on the current task.

use super::{EventBuilder, ExportJob, ExportManifest, JobReport, RunReport};
use crate::config::ExporterConfig;
use crate::etl::{DeliveryClient, JobPhase, Loader, PageSource, Pipeline, RunControl};
use crate::event::{EventTemplate, NormalizedEvent};
use crate::storage::JsonArrayWriter;
use crate::transform::{
    CacheBuild, FieldDropper, Flattener, RecordNormalizer, ReferenceCache,
};
use eyre::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// How the jobs of a run are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// One job runs to completion before the next starts
    #[default]
    Sequential,
    /// Every job is polled concurrently; query API calls stay serialized by
    /// the shared rate limiter
    Concurrent,
}

/// Run-wide knobs shared by every job
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub page_size: usize,
    pub batch_size: usize,
    pub index: String,
    pub source: String,
    pub default_host: Option<String>,
    pub mode: RunMode,
    /// Mirror event bodies to `<dir>/<job>.json`
    pub output_dir: Option<PathBuf>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            page_size: 200,
            batch_size: 300,
            index: "nautobot".to_string(),
            source: "nautobot".to_string(),
            default_host: None,
            mode: RunMode::default(),
            output_dir: None,
        }
    }
}

impl ExportSettings {
    pub fn from_config(config: &ExporterConfig) -> Self {
        Self {
            page_size: config.query.page_size,
            batch_size: config.hec.batch_size,
            index: config.hec.index.clone(),
            source: config.hec.source.clone(),
            default_host: config.hec.host.clone(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }
}

/// Runs export jobs against one page source and one delivery client
///
/// # Example
/// ```no_run
/// use nautobot_hec_exporter::client::{HecClient, NautobotClient};
/// use nautobot_hec_exporter::config::ExporterConfig;
/// use nautobot_hec_exporter::etl::DeliveryClient;
/// use nautobot_hec_exporter::export::{ExportManifest, ExportOrchestrator, ExportSettings};
///
/// # async fn example() -> eyre::Result<()> {
/// let config = ExporterConfig::from_env()?;
/// let source = NautobotClient::from_config(&config.query)?;
/// let delivery = DeliveryClient::new(HecClient::from_config(&config.hec)?, config.hec.retry);
///
/// let orchestrator = ExportOrchestrator::new(
///     source,
///     delivery,
///     ExportManifest::for_api(config.query.api),
///     ExportSettings::from_config(&config),
/// );
/// let report = orchestrator.run(&[]).await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
pub struct ExportOrchestrator<S, L> {
    source: S,
    delivery: DeliveryClient<L>,
    manifest: ExportManifest,
    settings: ExportSettings,
    control: RunControl,
}

impl<S, L> ExportOrchestrator<S, L>
where
    S: PageSource,
    L: Loader<Item = NormalizedEvent>,
{
    pub fn new(
        source: S,
        delivery: DeliveryClient<L>,
        manifest: ExportManifest,
        settings: ExportSettings,
    ) -> Self {
        Self {
            source,
            delivery,
            manifest,
            settings,
            control: RunControl::new(),
        }
    }

    /// Use an externally owned cancellation flag
    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn manifest(&self) -> &ExportManifest {
        &self.manifest
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn delivery(&self) -> &DeliveryClient<L> {
        &self.delivery
    }

    /// Run the selected jobs (all of them when `only` is empty)
    ///
    /// # Errors
    /// Returns an error only when `only` names a job the manifest lacks;
    /// job failures are reported in the [`RunReport`].
    pub async fn run(&self, only: &[String]) -> Result<RunReport> {
        let jobs = self.manifest.select(only)?;
        log::info!(
            "Exporting {} job(s) ({:?}): {}",
            jobs.len(),
            self.settings.mode,
            jobs.iter()
                .map(|job| job.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let report: RunReport = match self.settings.mode {
            RunMode::Sequential => {
                let mut report = RunReport::new();
                for job in jobs {
                    report.push(self.run_job(job).await);
                }
                report
            }
            RunMode::Concurrent => {
                futures::future::join_all(jobs.into_iter().map(|job| self.run_job(job)))
                    .await
                    .into_iter()
                    .collect()
            }
        };

        log::info!("Run finished: {}", report.totals);
        Ok(report)
    }

    /// Run one job to a terminal phase
    pub async fn run_job(&self, job: &ExportJob) -> JobReport {
        if self.control.is_cancelled() {
            log::warn!("[{}] Skipped, run was cancelled", job.name);
            return JobReport::not_started(&job.name, JobPhase::Cancelled);
        }

        log::info!("[{}] Starting export from {}", job.name, job.query);
        let (normalizer, degraded) = self.prepare_normalizer(job).await;
        log::debug!("[{}] {} -> {}", job.name, JobPhase::Pending, JobPhase::CachesBuilt);

        let template = EventTemplate::new(&self.settings.index, &self.settings.source, &job.sourcetype)
            .with_default_host(self.settings.default_host.clone())
            .with_host_field(job.host_field.clone());
        let builder = EventBuilder::new(normalizer, template);

        let mut pipeline = Pipeline::new(&job.name, &self.source, &job.query, builder, &self.delivery)
            .with_page_size(self.settings.page_size)
            .with_batch_size(self.settings.batch_size)
            .with_control(self.control.clone());

        if let Some(dir) = &self.settings.output_dir {
            let path = JsonArrayWriter::job_path(dir, &job.name);
            match JsonArrayWriter::create(&path) {
                Ok(writer) => pipeline = pipeline.with_output(writer),
                Err(e) => log::error!("[{}] File output disabled: {:#}", job.name, e),
            }
        }

        let outcome = pipeline.run().await;
        JobReport::from_outcome(&job.name, outcome).with_degraded_tables(degraded)
    }

    /// Build every reference cache the job maps a field to, once per table.
    ///
    /// Returns the normalizer and the names of tables that degraded to empty.
    async fn prepare_normalizer(&self, job: &ExportJob) -> (RecordNormalizer, Vec<String>) {
        let mut caches: BTreeMap<&str, Arc<ReferenceCache>> = BTreeMap::new();
        let mut degraded = Vec::new();

        for name in job.required_tables() {
            let Some(table) = self.manifest.table(name) else {
                log::warn!("[{}] No reference table named '{}'", job.name, name);
                continue;
            };

            let build = ReferenceCache::build(&self.source, table, self.settings.page_size).await;
            match &build {
                CacheBuild::Built(cache) => log::info!(
                    "[{}] Cached {} value(s) from '{}'",
                    job.name,
                    cache.len(),
                    name
                ),
                CacheBuild::Degraded(e) => {
                    log::warn!("[{}] {}; values pass through unchanged", job.name, e);
                    degraded.push(name.to_string());
                }
            }
            caches.insert(name, Arc::new(build.into_cache()));
        }

        let mut normalizer = RecordNormalizer::new()
            .with_flattener(Flattener::new(job.timestamps))
            .with_blacklist(FieldDropper::new(&job.blacklist));
        for (field, table) in &job.references {
            if let Some(cache) = caches.get(table.as_str()) {
                normalizer = normalizer.with_reference(field, Arc::clone(cache));
            }
        }

        (normalizer, degraded)
    }
}
