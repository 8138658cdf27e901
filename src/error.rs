use thiserror::Error;

/// Errors raised when a precondition of the engine or of one of its
/// computations is violated. Degenerate inputs fail fast with one of
/// these variants instead of propagating not-a-number values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoveltyError {
    /// A clustering strategy or a centroid computation received zero
    /// instances.
    #[error("cannot cluster an empty batch of instances")]
    EmptyBatch,
    /// A metric was requested from a confusion matrix that has no rows.
    #[error("the confusion matrix has no rows")]
    EmptyMatrix,
    /// The combined error rate is undefined when no sample was ever
    /// explained.
    #[error("the confusion matrix has no explained samples")]
    NoExplainedSamples,
}
