//! Extraction seam: a paged source of raw records

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a collection is queried from the source of truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "api")]
pub enum QueryDefinition {
    /// REST list endpoint relative to `/api/`, e.g. `dcim/devices`
    Rest { endpoint: String },
    /// GraphQL query taking `$limit` and `$offset` variables; records are read
    /// from `data.<root_field>`
    Graphql { root_field: String, query: String },
}

impl QueryDefinition {
    pub fn rest(endpoint: impl Into<String>) -> Self {
        Self::Rest {
            endpoint: endpoint.into(),
        }
    }

    pub fn graphql(root_field: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Graphql {
            root_field: root_field.into(),
            query: query.into(),
        }
    }
}

impl std::fmt::Display for QueryDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rest { endpoint } => write!(f, "rest:{}", endpoint),
            Self::Graphql { root_field, .. } => write!(f, "graphql:{}", root_field),
        }
    }
}

/// One page of raw records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records in the order the source returned them
    pub records: Vec<Value>,
    /// Explicit "more pages" signal, when the transport provides one
    /// (the REST `next` link). `None` means the transport gives no hint.
    pub has_more: Option<bool>,
}

impl Page {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            has_more: None,
        }
    }

    pub fn with_has_more(mut self, has_more: bool) -> Self {
        self.has_more = Some(has_more);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A source that can serve one page of a collection at a time.
///
/// Implementors are responsible for their own request throttling; the
/// Nautobot client waits on its shared rate limiter before every request.
///
/// # Example
/// ```no_run
/// use nautobot_hec_exporter::etl::{Page, PageSource, QueryDefinition};
/// use nautobot_hec_exporter::error::FetchError;
/// use serde_json::json;
///
/// struct Fixed;
///
/// impl PageSource for Fixed {
///     async fn fetch_page(
///         &self,
///         _query: &QueryDefinition,
///         _limit: usize,
///         offset: usize,
///     ) -> Result<Page, FetchError> {
///         if offset == 0 {
///             Ok(Page::new(vec![json!({"id": "1"})]))
///         } else {
///             Ok(Page::default())
///         }
///     }
/// }
/// ```
pub trait PageSource: Send + Sync {
    /// Fetch `limit` records starting at `offset`
    ///
    /// # Errors
    /// Returns a [`FetchError`] on transport failure, non-success status,
    /// undecodable body or embedded query errors.
    fn fetch_page(
        &self,
        query: &QueryDefinition,
        limit: usize,
        offset: usize,
    ) -> impl std::future::Future<Output = Result<Page, FetchError>> + Send;
}

impl<T: PageSource> PageSource for &T {
    fn fetch_page(
        &self,
        query: &QueryDefinition,
        limit: usize,
        offset: usize,
    ) -> impl std::future::Future<Output = Result<Page, FetchError>> + Send {
        (**self).fetch_page(query, limit, offset)
    }
}
