//! Per-job export pipeline
//!
//! Drives one object type from the query API to the ingestion endpoint:
//! pages are fetched, each record is turned into an event, events are
//! buffered and every full buffer is delivered before the next record is
//! looked at.

use super::{BatchBuffer, DeliveryClient, Flush, Loader, PageSource, PaginatedFetcher};
use super::{QueryDefinition, RunControl, Transformer};
use crate::error::FetchError;
use crate::event::NormalizedEvent;
use crate::storage::JsonArrayWriter;
use serde_json::Value;
use std::fmt;
use std::ops::AddAssign;

/// Where a job currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Pending,
    CachesBuilt,
    Fetching,
    Normalizing,
    Buffering,
    Flushing,
    Draining,
    Done,
    Failed,
    Cancelled,
}

impl JobPhase {
    /// Terminal phases
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::CachesBuilt => "caches built",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Buffering => "buffering",
            Self::Flushing => "flushing",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Record counters for a job or a whole run.
///
/// For a finished job `fetched == omitted + sent + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub fetched: usize,
    /// Records that normalized to an empty body and were not emitted
    pub omitted: usize,
    pub sent: usize,
    pub failed: usize,
}

impl RunTotals {
    pub fn merge(&mut self, other: &RunTotals) {
        self.fetched += other.fetched;
        self.omitted += other.omitted;
        self.sent += other.sent;
        self.failed += other.failed;
    }

    /// Whether every fetched record is accounted for
    pub fn is_balanced(&self) -> bool {
        self.fetched == self.omitted + self.sent + self.failed
    }
}

impl AddAssign for RunTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}

impl fmt::Display for RunTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} omitted={} sent={} failed={}",
            self.fetched, self.omitted, self.sent, self.failed
        )
    }
}

/// What a pipeline run produced
#[derive(Debug)]
pub struct PipelineOutcome {
    pub phase: JobPhase,
    pub totals: RunTotals,
    pub batches_sent: usize,
    pub batches_failed: usize,
    /// The fetch error that ended the job, if any
    pub error: Option<FetchError>,
}

/// Fetch → transform → buffer → deliver for a single query
///
/// # Type Parameters
/// - `S`: where pages come from
/// - `T`: turns a raw record into an event, or `None` when nothing is left
///   to emit
/// - `L`: the destination behind the shared [`DeliveryClient`]
///
/// # Example
/// ```no_run
/// use nautobot_hec_exporter::etl::{DeliveryClient, Loader, PageSource, Pipeline, QueryDefinition, Transformer};
/// use nautobot_hec_exporter::event::NormalizedEvent;
/// use serde_json::Value;
///
/// # async fn example<S, T, L>(source: S, builder: T, delivery: DeliveryClient<L>)
/// # where
/// #     S: PageSource,
/// #     T: Transformer<Input = Value, Output = Option<NormalizedEvent>>,
/// #     L: Loader<Item = NormalizedEvent>,
/// # {
/// let query = QueryDefinition::rest("dcim/devices");
/// let outcome = Pipeline::new("devices", source, &query, builder, &delivery)
///     .with_page_size(200)
///     .with_batch_size(300)
///     .run()
///     .await;
/// println!("{} -> {}", outcome.phase, outcome.totals);
/// # }
/// ```
pub struct Pipeline<'a, S, T, L> {
    name: &'a str,
    source: S,
    query: &'a QueryDefinition,
    transformer: T,
    delivery: &'a DeliveryClient<L>,
    page_size: usize,
    batch_size: usize,
    control: RunControl,
    output: Option<JsonArrayWriter>,
}

impl<'a, S, T, L> Pipeline<'a, S, T, L>
where
    S: PageSource,
    T: Transformer<Input = Value, Output = Option<NormalizedEvent>>,
    L: Loader<Item = NormalizedEvent>,
{
    pub fn new(
        name: &'a str,
        source: S,
        query: &'a QueryDefinition,
        transformer: T,
        delivery: &'a DeliveryClient<L>,
    ) -> Self {
        Self {
            name,
            source,
            query,
            transformer,
            delivery,
            page_size: 200,
            batch_size: 300,
            control: RunControl::default(),
            output: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    /// Also append every event body to a JSON array file
    pub fn with_output(mut self, writer: JsonArrayWriter) -> Self {
        self.output = Some(writer);
        self
    }

    /// Run until the collection is exhausted, a fetch fails or the run is
    /// cancelled.
    ///
    /// Never returns an error: failures end up in the outcome's phase and
    /// totals.
    pub async fn run(self) -> PipelineOutcome {
        let Pipeline {
            name,
            source,
            query,
            transformer,
            delivery,
            page_size,
            batch_size,
            control,
            output,
        } = self;

        let mut state = JobState::new(name, output);
        let mut fetcher = PaginatedFetcher::new(source, query, page_size);
        let mut buffer = BatchBuffer::new(batch_size);
        let mut error = None;
        let mut cancelled = false;

        state.set_phase(JobPhase::Fetching);
        'pages: loop {
            if control.is_cancelled() {
                cancelled = true;
                break;
            }

            let records = match fetcher.next_page().await {
                Ok(Some(records)) => records,
                Ok(None) => break,
                Err(e) => {
                    log::error!("[{}] Fetch failed at offset {}: {}", name, fetcher.offset(), e);
                    error = Some(e);
                    break;
                }
            };

            let page_len = records.len();
            state.totals.fetched += page_len;
            log::info!(
                "[{}] Page {}: {} record(s), {} fetched so far",
                name,
                fetcher.pages(),
                page_len,
                state.totals.fetched
            );

            for (position, record) in records.into_iter().enumerate() {
                state.set_phase(JobPhase::Normalizing);
                let event = match transformer.transform(record) {
                    Ok(Some(event)) => event,
                    Ok(None) => {
                        state.totals.omitted += 1;
                        continue;
                    }
                    Err(e) => {
                        log::warn!("[{}] Skipping record that could not be normalized: {}", name, e);
                        state.totals.failed += 1;
                        continue;
                    }
                };

                state.write_output(&event);
                state.set_phase(JobPhase::Buffering);
                if state.buffer_event(&mut buffer, event) {
                    if control.is_cancelled() {
                        // Rest of this page never makes it into a batch
                        state.totals.failed += page_len - position - 1;
                        cancelled = true;
                        break 'pages;
                    }
                    state.set_phase(JobPhase::Flushing);
                    let flush = buffer.flush(delivery).await;
                    state.record_flush(flush);
                    state.set_phase(JobPhase::Fetching);
                }
            }
            state.set_phase(JobPhase::Fetching);
        }

        if cancelled {
            let abandoned = buffer.take().len();
            if abandoned > 0 {
                log::warn!("[{}] Dropping {} unflushed event(s)", name, abandoned);
            }
            state.totals.failed += abandoned;
        } else {
            state.set_phase(JobPhase::Draining);
            let flush = buffer.flush(delivery).await;
            state.record_flush(flush);
        }

        state.finish_output();

        let phase = if cancelled {
            JobPhase::Cancelled
        } else if error.is_some() {
            JobPhase::Failed
        } else {
            JobPhase::Done
        };
        state.set_phase(phase);
        log::info!("[{}] Finished ({}): {}", name, phase, state.totals);

        PipelineOutcome {
            phase,
            totals: state.totals,
            batches_sent: state.batches_sent,
            batches_failed: state.batches_failed,
            error,
        }
    }
}

/// Mutable bookkeeping of a running job
struct JobState<'a> {
    name: &'a str,
    phase: JobPhase,
    totals: RunTotals,
    batches_sent: usize,
    batches_failed: usize,
    output: Option<JsonArrayWriter>,
}

impl<'a> JobState<'a> {
    fn new(name: &'a str, output: Option<JsonArrayWriter>) -> Self {
        Self {
            name,
            phase: JobPhase::CachesBuilt,
            totals: RunTotals::default(),
            batches_sent: 0,
            batches_failed: 0,
            output,
        }
    }

    /// Add an event to the buffer, returning whether a flush is due.
    ///
    /// A refused event is counted as failed.
    fn buffer_event<T>(&mut self, buffer: &mut BatchBuffer<T>, event: T) -> bool {
        match buffer.add(event) {
            Ok(full) => full,
            Err(_refused) => {
                // Unreachable while every fill is followed by a flush
                log::error!("[{}] Batch buffer already full, event dropped", self.name);
                self.totals.failed += 1;
                true
            }
        }
    }

    fn set_phase(&mut self, phase: JobPhase) {
        if self.phase != phase {
            log::trace!("[{}] {} -> {}", self.name, self.phase, phase);
            self.phase = phase;
        }
    }

    fn record_flush(&mut self, flush: Flush) {
        if flush.events == 0 {
            return;
        }
        if flush.delivered {
            self.totals.sent += flush.events;
            self.batches_sent += 1;
            log::debug!("[{}] Sent batch of {} event(s)", self.name, flush.events);
        } else {
            self.totals.failed += flush.events;
            self.batches_failed += 1;
        }
    }

    fn write_output(&mut self, event: &NormalizedEvent) {
        let Some(writer) = self.output.as_mut() else {
            return;
        };
        if let Err(e) = writer.append(&Value::Object(event.event.clone())) {
            log::error!("[{}] Disabling file output: {:#}", self.name, e);
            self.output = None;
        }
    }

    fn finish_output(&mut self) {
        let Some(writer) = self.output.take() else {
            return;
        };
        let path = writer.path().to_path_buf();
        match writer.finish() {
            Ok(count) => log::info!("[{}] Wrote {} item(s) to {}", self.name, count, path.display()),
            Err(e) => log::error!("[{}] Failed to finish {}: {:#}", self.name, path.display(), e),
        }
    }
}
