use thiserror::Error;

/// An error when checking K-means hyperparameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KMeansParamsError {
    #[error("n_clusters must lie in 2..=10, got {0}")]
    NClusters(usize),
    #[error("tolerance must be a positive finite number")]
    Tolerance,
    #[error("max_n_iterations cannot be 0")]
    MaxIterations,
    #[error("n_runs cannot be 0")]
    NRuns,
}

/// An error when fitting a K-means model.
///
/// `InvalidParams` covers rejected hyperparameters; the remaining variants
/// cover rejected observations. `fit` is all-or-nothing, so none of these
/// leave partial results behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KMeansError {
    /// When any of the hyperparameters is set to an invalid value
    #[error("invalid hyperparameter: {0}")]
    InvalidParams(#[from] KMeansParamsError),
    /// When there are fewer observations than requested clusters
    #[error("{n_points} observations cannot be split into {n_clusters} clusters")]
    TooFewPoints { n_points: usize, n_clusters: usize },
    /// When an observation holds a NaN or infinite coordinate
    #[error("non-finite coordinate at row {row}, column {col}")]
    NonFiniteValue { row: usize, col: usize },
    /// When the observation matrix has no feature columns
    #[error("observations must have at least one feature")]
    NoFeatures,
}
