//! Offset/limit pagination over a [`PageSource`]

use super::{Page, PageSource, QueryDefinition};
use crate::error::FetchError;
use serde_json::Value;

/// Lazily walks every page of a collection.
///
/// Pages are requested one at a time with `(limit, offset)`. The walk ends
/// at the first of:
/// - an empty page
/// - a page whose transport says there is nothing more (REST `next: null`)
/// - a page shorter than `limit`, when the transport gives no such signal
///
/// A short page that still carries a `next` link means the server capped
/// the page size; the walk continues from the records actually received.
///
/// Once ended, [`next_page`](Self::next_page) returns `Ok(None)` without
/// issuing any further request. Errors are returned as-is; nothing is retried.
///
/// # Example
/// ```no_run
/// use nautobot_hec_exporter::etl::{PaginatedFetcher, PageSource, QueryDefinition};
///
/// # async fn example(source: impl PageSource) -> eyre::Result<()> {
/// let query = QueryDefinition::rest("dcim/devices");
/// let mut fetcher = PaginatedFetcher::new(&source, &query, 200);
/// while let Some(records) = fetcher.next_page().await? {
///     println!("got {} records", records.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct PaginatedFetcher<'a, S> {
    source: S,
    query: &'a QueryDefinition,
    limit: usize,
    offset: usize,
    pages: usize,
    exhausted: bool,
}

impl<'a, S: PageSource> PaginatedFetcher<'a, S> {
    /// Create a fetcher; a `page_size` of zero is treated as one
    pub fn new(source: S, query: &'a QueryDefinition, page_size: usize) -> Self {
        Self {
            source,
            query,
            limit: page_size.max(1),
            offset: 0,
            pages: 0,
            exhausted: false,
        }
    }

    /// Offset the next request will use
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of non-empty pages returned so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetch the next page of records, or `None` once the collection is done
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>, FetchError> {
        if self.exhausted {
            return Ok(None);
        }

        log::trace!(
            "Fetching {} limit={} offset={}",
            self.query,
            self.limit,
            self.offset
        );
        let page = match self
            .source
            .fetch_page(self.query, self.limit, self.offset)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };

        if page.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        if self.is_last(&page) {
            self.exhausted = true;
        }
        self.offset += page.len();
        self.pages += 1;
        Ok(Some(page.records))
    }

    /// Drain every remaining page into one vector
    pub async fn fetch_all(&mut self) -> Result<Vec<Value>, FetchError> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page);
        }
        Ok(records)
    }

    fn is_last(&mut self, page: &Page) -> bool {
        let short = page.len() < self.limit;
        match page.has_more {
            Some(true) if short => {
                if self.pages == 0 {
                    log::warn!(
                        "{} returned {} record(s) for limit={}, server page size is capped",
                        self.query,
                        page.len(),
                        self.limit
                    );
                }
                false
            }
            Some(more) => !more,
            None => short,
        }
    }
}
