//! Loader trait for loading data to destinations

use eyre::Result;

/// Loader trait for loading a batch of items to a destination
///
/// A single call is one delivery attempt: implementors send the whole batch
/// at once and either succeed or fail as a unit. Retrying is left to the
/// caller, which is why the batch is borrowed rather than consumed.
///
/// # Example
/// ```no_run
/// use nautobot_hec_exporter::etl::Loader;
/// use eyre::Result;
///
/// struct CountingLoader;
///
/// impl Loader for CountingLoader {
///     type Item = String;
///
///     async fn load(&self, items: &[Self::Item]) -> Result<usize> {
///         Ok(items.len())
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// The type of items to load
    type Item: Send + Sync;

    /// Load items to the destination
    ///
    /// Returns the number of items accepted
    ///
    /// # Errors
    /// Returns an error if the destination rejected the batch or could not
    /// be reached
    fn load(
        &self,
        items: &[Self::Item],
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}
