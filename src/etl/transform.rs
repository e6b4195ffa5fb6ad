//! Transformer trait for data transformation

use eyre::Result;

/// Transformer trait for transforming data items
///
/// Implementors define how to transform items:
/// - Flattening and normalizing raw records
/// - Data cleaning (removing fields)
/// - Data enrichment (resolving references)
///
/// # Example
/// ```
/// use nautobot_hec_exporter::etl::Transformer;
/// use eyre::Result;
///
/// struct Upper;
///
/// impl Transformer for Upper {
///     type Input = String;
///     type Output = String;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output> {
///         Ok(input.to_uppercase())
///     }
/// }
///
/// assert_eq!(Upper.transform("eth0".to_string()).unwrap(), "ETH0");
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    ///
    /// # Errors
    /// Returns an error if transformation fails (validation, conversion, etc.)
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;

    /// Transform multiple items, preserving their order
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        inputs.into_iter().map(|i| self.transform(i)).collect()
    }
}
