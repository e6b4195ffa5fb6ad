//! Export jobs and their orchestration
//!
//! An [`ExportManifest`] lists the jobs; the [`ExportOrchestrator`] runs them
//! and returns a [`RunReport`].

mod builder;
mod manifest;
mod orchestrator;
mod report;

pub use builder::EventBuilder;
pub use manifest::{ExportJob, ExportManifest};
pub use orchestrator::{ExportOrchestrator, ExportSettings, RunMode};
pub use report::{JobReport, RunReport};
