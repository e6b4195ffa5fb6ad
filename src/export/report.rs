//! Job and run reports

use crate::etl::{JobPhase, PipelineOutcome, RunTotals};
use owo_colors::OwoColorize;
use std::fmt;

/// How one job ended
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub name: String,
    pub status: JobPhase,
    pub totals: RunTotals,
    pub batches_sent: usize,
    pub batches_failed: usize,
    /// Fetch error message for failed jobs
    pub error: Option<String>,
    /// Reference tables that could not be built and were left empty
    pub degraded_tables: Vec<String>,
}

impl JobReport {
    pub fn from_outcome(name: impl Into<String>, outcome: PipelineOutcome) -> Self {
        Self {
            name: name.into(),
            status: outcome.phase,
            totals: outcome.totals,
            batches_sent: outcome.batches_sent,
            batches_failed: outcome.batches_failed,
            error: outcome.error.map(|e| e.to_string()),
            degraded_tables: Vec::new(),
        }
    }

    /// Report for a job that never started
    pub fn not_started(name: impl Into<String>, status: JobPhase) -> Self {
        Self {
            name: name.into(),
            status,
            totals: RunTotals::default(),
            batches_sent: 0,
            batches_failed: 0,
            error: None,
            degraded_tables: Vec::new(),
        }
    }

    pub fn with_degraded_tables(mut self, tables: Vec<String>) -> Self {
        self.degraded_tables = tables;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == JobPhase::Done && self.batches_failed == 0
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:<9} {} batches={}/{}",
            self.name,
            self.status.to_string(),
            self.totals,
            self.batches_sent,
            self.batches_sent + self.batches_failed
        )?;
        if !self.degraded_tables.is_empty() {
            write!(f, " degraded={}", self.degraded_tables.join(","))?;
        }
        if let Some(error) = &self.error {
            write!(f, " error={}", error)?;
        }
        Ok(())
    }
}

/// Every job of a run, in execution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub jobs: Vec<JobReport>,
    pub totals: RunTotals,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finished job and fold its totals into the run
    pub fn push(&mut self, job: JobReport) {
        self.totals.merge(&job.totals);
        self.jobs.push(job);
    }

    pub fn job(&self, name: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|job| job.name == name)
    }

    /// True only if every job is done and no batch was abandoned
    pub fn is_success(&self) -> bool {
        self.jobs.iter().all(JobReport::is_success)
    }

    /// Process exit status for the run
    pub fn exit_code(&self) -> i32 {
        match self.is_success() {
            true => 0,
            false => 1,
        }
    }
}

impl FromIterator<JobReport> for RunReport {
    fn from_iter<I: IntoIterator<Item = JobReport>>(iter: I) -> Self {
        let mut report = Self::new();
        for job in iter {
            report.push(job);
        }
        report
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for job in &self.jobs {
            match job.is_success() {
                true => writeln!(f, "{} {}", "✓".green(), job)?,
                false => writeln!(f, "{} {}", "✗".red(), job)?,
            }
        }
        write!(f, "Total: {}", self.totals)
    }
}
