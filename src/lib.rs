//! Nautobot HEC Exporter
//!
//! An ETL tool that pages inventory records out of Nautobot, normalizes them
//! into flat events and ships them in batches to a Splunk HTTP Event Collector

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod etl;
pub mod event;
pub mod export;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use client::{Auth, AuthType, HecClient, NautobotClient, RateLimiter};
pub use config::ExporterConfig;
pub use error::{CacheBuildError, ConfigError, DeliveryError, FetchError};
pub use etl::{Loader, PageSource, Pipeline, Transformer};
pub use event::NormalizedEvent;
pub use export::{ExportManifest, ExportOrchestrator, RunReport};
pub use storage::JsonArrayWriter;
