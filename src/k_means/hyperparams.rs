use crate::k_means::errors::KMeansParamsError;
use crate::k_means::init::KMeansInit;
use crate::param_guard::ParamGuard;
use ndarray_rand::rand::Rng;

/// Smallest cluster count accepted by [`KMeans`](crate::KMeans).
///
/// A single cluster degenerates into computing the mean of the point set,
/// so it is rejected rather than silently tolerated.
pub const MIN_CLUSTERS: usize = 2;
/// Largest cluster count accepted by [`KMeans`](crate::KMeans).
pub const MAX_CLUSTERS: usize = 10;

#[derive(Clone, Debug, PartialEq)]
/// The set of hyperparameters that can be specified for the execution of
/// the [K-means algorithm](crate::KMeans).
pub struct KMeansValidParams<R: Rng> {
    /// Number of times the algorithm is run with different centroid seeds.
    n_runs: usize,
    /// The training is considered complete if the squared euclidean distance
    /// between the old set of centroids and the new set of centroids
    /// after a training iteration is lower than `tolerance`.
    tolerance: f64,
    /// We exit the training loop when the number of training iterations
    /// reaches `max_n_iterations` even if the `tolerance` convergence
    /// condition has not been met.
    max_n_iterations: u64,
    /// The number of clusters we will be looking for in the training dataset.
    n_clusters: usize,
    /// The initialization strategy used to pick the starting centroids.
    init: KMeansInit,
    /// The random number generator
    rng: R,
}

#[derive(Clone, Debug, PartialEq)]
/// A helper struct used to construct a set of
/// [valid hyperparameters](KMeansValidParams) for the
/// [K-means algorithm](crate::KMeans) (using the builder pattern).
pub struct KMeansParams<R: Rng>(KMeansValidParams<R>);

impl<R: Rng> KMeansParams<R> {
    /// `new` lets us configure our training algorithm parameters:
    /// * we will be looking for `n_clusters` in the training dataset;
    /// * the training is considered complete if the squared euclidean
    ///   distance between the old and the new set of centroids after a
    ///   training iteration is lower than `tolerance`;
    /// * we exit the training loop when the number of training iterations
    ///   reaches `max_n_iterations` even if the `tolerance` convergence
    ///   condition has not been met; that counts as normal termination,
    ///   not as a failure;
    /// * as convergence depends on centroid initialization, the algorithm
    ///   is run `n_runs` times and the output with the lowest inertia (the
    ///   sum of squared distances to the closest centroid over all
    ///   observations) is kept.
    ///
    /// Defaults are provided if optional parameters are not specified:
    /// * `tolerance = 1e-4`
    /// * `max_n_iterations = 300`
    /// * `n_runs = 10`
    /// * `init = KMeansPlusPlus`
    pub fn new(n_clusters: usize, rng: R) -> Self {
        Self(KMeansValidParams {
            n_runs: 10,
            tolerance: 1e-4,
            max_n_iterations: 300,
            n_clusters,
            init: KMeansInit::KMeansPlusPlus,
            rng,
        })
    }

    /// Change the value of `n_runs`
    pub fn n_runs(mut self, n_runs: usize) -> Self {
        self.0.n_runs = n_runs;
        self
    }

    /// Change the value of `tolerance`
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.0.tolerance = tolerance;
        self
    }

    /// Change the value of `max_n_iterations`
    pub fn max_n_iterations(mut self, max_n_iterations: u64) -> Self {
        self.0.max_n_iterations = max_n_iterations;
        self
    }

    /// Change the value of `init`
    pub fn init_method(mut self, init: KMeansInit) -> Self {
        self.0.init = init;
        self
    }
}

impl<R: Rng> ParamGuard for KMeansParams<R> {
    type Checked = KMeansValidParams<R>;
    type Error = KMeansParamsError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        if !(MIN_CLUSTERS..=MAX_CLUSTERS).contains(&self.0.n_clusters) {
            Err(KMeansParamsError::NClusters(self.0.n_clusters))
        } else if !self.0.tolerance.is_finite() || self.0.tolerance <= 0.0 {
            Err(KMeansParamsError::Tolerance)
        } else if self.0.max_n_iterations == 0 {
            Err(KMeansParamsError::MaxIterations)
        } else if self.0.n_runs == 0 {
            Err(KMeansParamsError::NRuns)
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}

impl<R: Rng> KMeansValidParams<R> {
    /// The final result is the best output of `n_runs` consecutive runs in
    /// terms of inertia.
    pub fn n_runs(&self) -> usize {
        self.n_runs
    }

    /// The training is considered complete if the squared euclidean distance
    /// between the old set of centroids and the new set of centroids
    /// after a training iteration is lower than `tolerance`.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// We exit the training loop when the number of training iterations
    /// reaches `max_n_iterations` even if the `tolerance` convergence
    /// condition has not been met.
    pub fn max_n_iterations(&self) -> u64 {
        self.max_n_iterations
    }

    /// The number of clusters we will be looking for in the training dataset.
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Cluster initialization strategy
    pub fn init_method(&self) -> KMeansInit {
        self.init
    }

    /// Returns the random generator
    pub fn rng(&self) -> &R {
        &self.rng
    }
}

#[cfg(test)]
mod tests {
    use crate::{KMeans, KMeansParams, KMeansParamsError, KMeansValidParams, ParamGuard};
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<KMeansParams<Xoshiro256Plus>>();
        has_autotraits::<KMeansValidParams<Xoshiro256Plus>>();
        has_autotraits::<KMeansParamsError>();
    }

    #[test]
    fn n_clusters_must_stay_in_bounds() {
        for k in &[0, 1, 11, 100] {
            let res = KMeans::params(*k).check();
            assert!(matches!(res, Err(KMeansParamsError::NClusters(n)) if n == *k));
        }
        for k in &[2, 5, 10] {
            assert!(KMeans::params(*k).check().is_ok());
        }
    }

    #[test]
    fn tolerance_has_to_be_positive() {
        let res = KMeans::params(2).tolerance(-1.).check();
        assert!(matches!(res, Err(KMeansParamsError::Tolerance)));
        let res = KMeans::params(2).tolerance(0.).check();
        assert!(matches!(res, Err(KMeansParamsError::Tolerance)));
        let res = KMeans::params(2).tolerance(f64::NAN).check();
        assert!(matches!(res, Err(KMeansParamsError::Tolerance)));
    }

    #[test]
    fn max_n_iterations_cannot_be_zero() {
        let res = KMeans::params(2).max_n_iterations(0).check();
        assert!(matches!(res, Err(KMeansParamsError::MaxIterations)));
    }

    #[test]
    fn n_runs_cannot_be_zero() {
        let res = KMeans::params(2).n_runs(0).check();
        assert!(matches!(res, Err(KMeansParamsError::NRuns)));
    }
}
