//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module provides the seams an export job is built from: a
//! [`PageSource`] to read pages of records, a [`Transformer`] to turn them
//! into events and a [`Loader`] to deliver batches, plus the machinery that
//! strings them together (pagination, batching, retries, cancellation).

mod batch;
mod control;
mod delivery;
mod extract;
mod load;
mod paginate;
mod pipeline;
mod transform;

pub use batch::{BatchBuffer, Flush};
pub use control::RunControl;
pub use delivery::{DeliveryClient, RetryPolicy};
pub use extract::{Page, PageSource, QueryDefinition};
pub use load::Loader;
pub use paginate::PaginatedFetcher;
pub use pipeline::{JobPhase, Pipeline, PipelineOutcome, RunTotals};
pub use transform::Transformer;
