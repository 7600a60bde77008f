use crate::k_means::errors::KMeansError;
use crate::k_means::hyperparams::{KMeansParams, KMeansValidParams};
use crate::param_guard::ParamGuard;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, DataMut, Ix1, Ix2, Zip};
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_stats::DeviationExt;
use rand_xoshiro::Xoshiro256Plus;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
/// K-means clustering partitions a set of unlabeled observations into
/// clusters, where each observation belongs to the cluster with the nearest
/// mean.
///
/// The mean of the points within a cluster is called *centroid*. Given the
/// set of centroids, you can assign any observation to a cluster by choosing
/// the nearest centroid.
///
/// We provide an implementation of the _standard algorithm_, also known as
/// Lloyd's algorithm or naive K-means: an initialization step picks the
/// starting centroids, then an assignment step (each observation goes to the
/// nearest centroid) and an update step (each centroid becomes the mean of
/// its members) repeat in a loop. Training stops when the centroids move
/// less than `tolerance` between iterations or when `max_n_iterations` is
/// reached; the iteration cap is a normal way out of the loop, not a
/// failure. A cluster left without members keeps its previous centroid, so
/// degenerate inputs reduce cluster quality instead of crashing.
///
/// The sum of squared distances from each observation to its assigned
/// centroid (the *inertia*) never increases between iterations, but the
/// algorithm only finds a local minimum; the outcome depends on the starting
/// centroids, which is why `fit` runs it `n_runs` times and keeps the best
/// run. With the default seeded generator the whole procedure is
/// deterministic: identical input yields identical labels and centroids.
///
/// ## Parallelisation
///
/// The assignment step requires no coordination between observations, so it
/// runs in parallel through the `rayon` feature of `ndarray`. The update
/// step is cheap and stays on a single thread.
///
/// ## Example
///
/// ```
/// use clustergrid::{KMeans, KMeansInit, ParamGuard};
/// use ndarray::array;
///
/// let points = array![[1.0, 1.0], [1.0, 2.0], [9.0, 9.0], [9.0, 10.0]];
///
/// let model = KMeans::params(2)
///     .init_method(KMeansInit::KMeansPlusPlus)
///     .tolerance(1e-6)
///     .check()
///     .unwrap()
///     .fit(&points)
///     .unwrap();
///
/// // The two tight pairs end up in separate clusters.
/// let labels = model.predict(&points);
/// assert_eq!(labels[0], labels[1]);
/// assert_eq!(labels[2], labels[3]);
/// assert_ne!(labels[0], labels[2]);
///
/// // New points are assigned to the nearest centroid.
/// let far_away = array![250.0, 250.0];
/// assert_eq!(model.classify(&far_away), labels[2]);
/// ```
pub struct KMeans {
    centroids: Array2<f64>,
    cluster_count: Array1<usize>,
    inertia: f64,
    n_iterations: u64,
    converged: bool,
}

impl KMeans {
    /// Configure training with the default deterministic generator: results
    /// are reproducible across runs on identical input.
    pub fn params(n_clusters: usize) -> KMeansParams<Xoshiro256Plus> {
        KMeansParams::new(n_clusters, Xoshiro256Plus::seed_from_u64(42))
    }

    /// Configure training with a caller-supplied random number generator.
    pub fn params_with_rng<R: Rng + Clone>(n_clusters: usize, rng: R) -> KMeansParams<R> {
        KMeansParams::new(n_clusters, rng)
    }

    /// Return the set of centroids as a 2-dimensional matrix with shape
    /// `(n_centroids, n_features)`.
    ///
    /// Exactly `n_clusters` rows are always present; rows may coincide when
    /// clusters collapse onto each other.
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Return the number of training points assigned to each cluster.
    pub fn cluster_count(&self) -> &Array1<usize> {
        &self.cluster_count
    }

    /// Return the sum of squared distances between each training point and
    /// its closest centroid.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Number of Lloyd iterations performed by the winning run.
    pub fn n_iterations(&self) -> u64 {
        self.n_iterations
    }

    /// Whether the winning run met the `tolerance` condition before hitting
    /// the iteration cap.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Given an input matrix `observations` with shape
    /// `(n_observations, n_features)`, `predict` returns, for each
    /// observation, the index of the closest cluster/centroid, preserving
    /// row order.
    ///
    /// You can retrieve the centroid associated to an index using the
    /// [`centroids`](KMeans::centroids) method.
    pub fn predict(
        &self,
        observations: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    ) -> Array1<usize> {
        assert_eq!(
            observations.ncols(),
            self.centroids.ncols(),
            "observation dimensionality must match the fitted centroids"
        );
        let mut memberships = Array1::zeros(observations.nrows());
        update_cluster_memberships(&self.centroids, &observations.view(), &mut memberships);
        memberships
    }

    /// Return the index of the centroid nearest to `observation`, with ties
    /// broken towards the lowest index.
    ///
    /// This is a pure function of the fitted centroids: the query point need
    /// not lie anywhere near the training data.
    pub fn classify(&self, observation: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> usize {
        assert_eq!(
            observation.len(),
            self.centroids.ncols(),
            "observation dimensionality must match the fitted centroids"
        );
        closest_centroid(&self.centroids, observation).0
    }
}

impl<R: Rng + Clone> KMeansParams<R> {
    /// Validates the hyperparameters and then fits them; a shorthand for
    /// `check()?` followed by [`KMeansValidParams::fit`].
    pub fn fit(
        &self,
        observations: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    ) -> Result<KMeans, KMeansError> {
        Ok(self.check_ref()?.fit(observations)?)
    }
}

impl<R: Rng + Clone> KMeansValidParams<R> {
    /// Given an input matrix `observations` with shape
    /// `(n_observations, n_features)`, `fit` identifies `n_clusters`
    /// centroids based on the training data distribution and returns a
    /// [`KMeans`] model.
    ///
    /// The observations are validated up front: they must carry at least one
    /// feature, every coordinate must be finite and there must be at least
    /// as many observations as requested clusters. Any violation fails the
    /// whole fit, nothing is clamped or dropped.
    pub fn fit(
        &self,
        observations: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    ) -> Result<KMeans, KMeansError> {
        let observations = observations.view();
        let (n_points, n_features) = observations.dim();

        if n_features == 0 {
            return Err(KMeansError::NoFeatures);
        }
        if let Some((row, col)) = first_non_finite(&observations) {
            return Err(KMeansError::NonFiniteValue { row, col });
        }
        if n_points < self.n_clusters() {
            return Err(KMeansError::TooFewPoints {
                n_points,
                n_clusters: self.n_clusters(),
            });
        }

        let mut rng = self.rng().clone();
        let mut memberships = Array1::zeros(n_points);
        let mut dists = Array1::zeros(n_points);

        let mut min_inertia = f64::INFINITY;
        let mut best_centroids = None;
        let mut best_iter = 0;
        let mut best_converged = false;

        for _ in 0..self.n_runs() {
            let mut centroids =
                self.init_method()
                    .run(self.n_clusters(), &observations, &mut rng);
            let mut converged = false;
            let mut n_iterations = 0;

            for _ in 0..self.max_n_iterations() {
                update_memberships_and_dists(
                    &centroids,
                    &observations,
                    &mut memberships,
                    &mut dists,
                );
                let new_centroids = compute_centroids(&centroids, &observations, &memberships);
                let shift = centroids
                    .sq_l2_dist(&new_centroids)
                    .expect("Failed to compute distance");
                centroids = new_centroids;
                n_iterations += 1;
                if shift < self.tolerance() {
                    converged = true;
                    break;
                }
            }

            // The loop leaves `dists` one update step behind the final
            // centroids, so re-assign before scoring the run.
            update_min_dists(&centroids, &observations, &mut dists);
            let inertia = dists.sum();
            if inertia < min_inertia {
                min_inertia = inertia;
                best_centroids = Some(centroids);
                best_iter = n_iterations;
                best_converged = converged;
            }
        }

        // n_runs >= 1 is enforced by the parameter check
        let centroids = best_centroids.expect("at least one run was performed");

        update_cluster_memberships(&centroids, &observations, &mut memberships);
        let mut cluster_count = Array1::zeros(self.n_clusters());
        for &membership in memberships.iter() {
            cluster_count[membership] += 1;
        }

        Ok(KMeans {
            centroids,
            cluster_count,
            inertia: min_inertia,
            n_iterations: best_iter,
            converged: best_converged,
        })
    }
}

/// `compute_centroids` returns a 2-dimensional array where the i-th row
/// corresponds to the mean of the observations assigned to the i-th cluster.
/// A cluster without members keeps its previous centroid.
fn compute_centroids(
    old_centroids: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    // (n_observations, n_features)
    observations: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    // (n_observations,)
    cluster_memberships: &ArrayBase<impl Data<Elem = usize>, Ix1>,
) -> Array2<f64> {
    let n_clusters = old_centroids.nrows();
    let mut counts: Array1<usize> = Array1::zeros(n_clusters);
    let mut centroids = Array2::zeros((n_clusters, observations.ncols()));

    Zip::from(observations.rows())
        .and(cluster_memberships)
        .for_each(|observation, &cluster_membership| {
            let mut centroid = centroids.row_mut(cluster_membership);
            centroid += &observation;
            counts[cluster_membership] += 1;
        });

    Zip::from(centroids.rows_mut())
        .and(old_centroids.rows())
        .and(&counts)
        .for_each(|mut centroid, old_centroid, &count| {
            if count == 0 {
                centroid.assign(&old_centroid);
            } else {
                centroid /= count as f64;
            }
        });
    centroids
}

// Update `cluster_memberships` with the index of the cluster each
// observation belongs to.
pub(crate) fn update_cluster_memberships(
    centroids: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    observations: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    cluster_memberships: &mut ArrayBase<impl DataMut<Elem = usize>, Ix1>,
) {
    Zip::from(observations.axis_iter(Axis(0)))
        .and(cluster_memberships)
        .par_for_each(|observation, cluster_membership| {
            *cluster_membership = closest_centroid(centroids, &observation).0
        });
}

// Update `dists` with the squared distance of each observation from its
// closest centroid.
pub(crate) fn update_min_dists(
    centroids: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    observations: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    dists: &mut ArrayBase<impl DataMut<Elem = f64>, Ix1>,
) {
    Zip::from(observations.axis_iter(Axis(0)))
        .and(dists)
        .par_for_each(|observation, dist| {
            *dist = closest_centroid(centroids, &observation).1
        });
}

// Efficient combination of `update_cluster_memberships` and
// `update_min_dists`.
pub(crate) fn update_memberships_and_dists(
    centroids: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    observations: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    cluster_memberships: &mut ArrayBase<impl DataMut<Elem = usize>, Ix1>,
    dists: &mut ArrayBase<impl DataMut<Elem = f64>, Ix1>,
) {
    Zip::from(observations.axis_iter(Axis(0)))
        .and(cluster_memberships)
        .and(dists)
        .par_for_each(|observation, cluster_membership, dist| {
            let (membership, distance) = closest_centroid(centroids, &observation);
            *cluster_membership = membership;
            *dist = distance;
        });
}

/// Given a matrix of centroids with shape `(n_centroids, n_features)` and an
/// observation, return the index of the closest centroid (the index of the
/// corresponding row in `centroids`) together with the squared distance.
/// Ties go to the lowest index.
pub(crate) fn closest_centroid(
    // (n_centroids, n_features)
    centroids: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    // (n_features,)
    observation: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> (usize, f64) {
    let first_centroid = centroids.row(0);
    let (mut closest_index, mut minimum_distance) =
        (0, sq_dist(&first_centroid, &observation.view()));

    for (centroid_index, centroid) in centroids.rows().into_iter().enumerate() {
        let distance = sq_dist(&centroid, &observation.view());
        if distance < minimum_distance {
            closest_index = centroid_index;
            minimum_distance = distance;
        }
    }
    (closest_index, minimum_distance)
}

fn sq_dist(lhs: &ArrayView1<f64>, rhs: &ArrayView1<f64>) -> f64 {
    debug_assert_eq!(lhs.len(), rhs.len());
    lhs.iter()
        .zip(rhs.iter())
        .map(|(l, r)| (l - r) * (l - r))
        .sum()
}

fn first_non_finite(observations: &ArrayView2<f64>) -> Option<(usize, usize)> {
    observations
        .indexed_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KMeansError, KMeansInit, KMeansParamsError};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, concatenate, Array, Array2, Axis};
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    #[test]
    fn compute_centroids_works() {
        let cluster_size = 100;
        let n_features = 2;

        // Two clusters of random observations with known means
        let cluster_1: Array2<f64> =
            Array::random((cluster_size, n_features), Uniform::new(-100., 100.));
        let memberships_1 = Array1::zeros(cluster_size);
        let expected_centroid_1 = cluster_1.mean_axis(Axis(0)).unwrap();

        let cluster_2: Array2<f64> =
            Array::random((cluster_size, n_features), Uniform::new(-100., 100.));
        let memberships_2 = Array1::ones(cluster_size);
        let expected_centroid_2 = cluster_2.mean_axis(Axis(0)).unwrap();

        let observations = concatenate(Axis(0), &[cluster_1.view(), cluster_2.view()]).unwrap();
        let memberships =
            concatenate(Axis(0), &[memberships_1.view(), memberships_2.view()]).unwrap();

        let old_centroids = Array2::zeros((2, n_features));
        let centroids = compute_centroids(&old_centroids, &observations, &memberships);
        assert_abs_diff_eq!(
            centroids.index_axis(Axis(0), 0),
            expected_centroid_1,
            epsilon = 1e-5
        );
        assert_abs_diff_eq!(
            centroids.index_axis(Axis(0), 1),
            expected_centroid_2,
            epsilon = 1e-5
        );
        assert_eq!(centroids.len_of(Axis(0)), 2);
    }

    #[test]
    fn empty_cluster_keeps_previous_centroid() {
        let observations = array![[1.0, 2.0]];
        let memberships = array![0];
        let old_centroids = array![[7.0, 7.0], [3.0, 4.0]];
        let centroids = compute_centroids(&old_centroids, &observations, &memberships);
        assert_abs_diff_eq!(centroids, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    // An observation is closest to itself.
    fn nothing_is_closer_than_self() {
        let n_centroids = 10;
        let centroids: Array2<f64> =
            Array::random((n_centroids, 2), Uniform::new(-100., 100.));

        let mut memberships = Array1::zeros(n_centroids);
        update_cluster_memberships(&centroids, &centroids, &mut memberships);
        let expected = (0..n_centroids).collect::<Array1<_>>();
        assert_eq!(memberships, expected);
    }

    #[test]
    fn oracle_test_for_closest_centroid() {
        let centroids = array![[0., 0.], [1., 2.], [20., 0.], [0., 20.]];
        let observations = array![[1., 0.5], [20., 2.], [20., 0.], [7., 20.]];
        let expected = array![0, 2, 2, 3];

        let mut memberships = Array1::zeros(observations.nrows());
        update_cluster_memberships(&centroids, &observations, &mut memberships);
        assert_eq!(memberships, expected);
    }

    #[test]
    fn ties_break_towards_the_lowest_index() {
        let centroids = array![[-1.0, 0.0], [1.0, 0.0]];
        // Equidistant from both centroids
        assert_eq!(closest_centroid(&centroids, &array![0.0, 5.0]).0, 0);
    }

    #[test]
    fn separates_two_obvious_groups() {
        let points = array![[1.0, 1.0], [1.0, 2.0], [9.0, 9.0], [9.0, 10.0]];
        let model = KMeans::params(2).fit(&points).unwrap();
        let labels = model.predict(&points);

        assert_eq!(labels.len(), 4);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);

        let low = labels[0];
        let high = labels[2];
        let low_centroid = array![1.0, 1.5];
        let high_centroid = array![9.0, 9.5];
        assert_abs_diff_eq!(
            model.centroids().row(low),
            low_centroid.view(),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            model.centroids().row(high),
            high_centroid.view(),
            epsilon = 1e-9
        );
        assert_eq!(model.cluster_count().sum(), 4);
        assert!(model.converged());
        assert!(model.n_iterations() >= 1);
    }

    #[test]
    fn fit_is_deterministic_for_identical_input() {
        let points = array![
            [1.0, 1.0],
            [1.2, 0.8],
            [4.0, 4.5],
            [4.2, 4.4],
            [9.0, 9.0],
            [9.1, 9.3],
        ];
        let first = KMeans::params(3).fit(&points).unwrap();
        let second = KMeans::params(3).fit(&points).unwrap();

        assert_abs_diff_eq!(first.centroids(), second.centroids(), epsilon = 1e-9);
        assert_eq!(first.predict(&points), second.predict(&points));
        assert_abs_diff_eq!(first.inertia(), second.inertia(), epsilon = 1e-9);
    }

    #[test]
    fn inertia_is_non_increasing_in_the_iteration_cap() {
        let points: Array2<f64> = Array::random((60, 2), Uniform::new(-50., 50.));

        let mut previous = f64::INFINITY;
        for cap in 1..=8 {
            // A single run with a fixed seed replays the same trajectory,
            // truncated at a growing cap.
            let model = KMeans::params(4)
                .init_method(KMeansInit::Random)
                .n_runs(1)
                .tolerance(1e-12)
                .max_n_iterations(cap)
                .fit(&points)
                .unwrap();
            assert!(model.inertia() <= previous + 1e-9);
            previous = model.inertia();
        }
    }

    #[test]
    fn as_many_clusters_as_points_isolates_each_point() {
        let points = array![[0.0, 0.0], [5.0, 0.0], [0.0, 5.0], [5.0, 5.0]];
        let model = KMeans::params(4).fit(&points).unwrap();
        let labels = model.predict(&points);

        assert!(model.cluster_count().iter().all(|&count| count == 1));
        let mut sorted: Vec<usize> = labels.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn coincident_points_never_crash() {
        let points = Array2::from_elem((5, 2), 2.0);
        let model = KMeans::params(3).fit(&points).unwrap();
        let labels = model.predict(&points);

        // Every centroid collapses onto the single location; ties all break
        // towards cluster 0.
        assert!(labels.iter().all(|&label| label == 0));
        let location = array![2.0, 2.0];
        for centroid in model.centroids().rows() {
            assert_abs_diff_eq!(centroid, location.view(), epsilon = 1e-9);
        }
        assert_abs_diff_eq!(model.inertia(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn classify_far_outside_the_cloud_stays_in_range() {
        let points = array![[1.0, 1.0], [1.0, 2.0], [9.0, 9.0], [9.0, 10.0]];
        let model = KMeans::params(2).fit(&points).unwrap();

        let label = model.classify(&array![-1e6, -1e6]);
        assert!(label < 2);
        assert_eq!(label, model.predict(&points)[0]);
    }

    #[test]
    fn rejects_out_of_range_cluster_counts() {
        let points = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let res = KMeans::params(1).fit(&points);
        assert!(matches!(
            res,
            Err(KMeansError::InvalidParams(KMeansParamsError::NClusters(1)))
        ));
    }

    #[test]
    fn rejects_fewer_points_than_clusters() {
        let points = array![[1.0, 1.0]];
        let res = KMeans::params(2).fit(&points);
        assert!(matches!(
            res,
            Err(KMeansError::TooFewPoints {
                n_points: 1,
                n_clusters: 2
            })
        ));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let points = array![[1.0, 1.0], [2.0, f64::NAN], [3.0, 3.0]];
        let res = KMeans::params(2).fit(&points);
        assert!(matches!(
            res,
            Err(KMeansError::NonFiniteValue { row: 1, col: 1 })
        ));

        let points = array![[1.0, 1.0], [2.0, 2.0], [f64::INFINITY, 3.0]];
        let res = KMeans::params(2).fit(&points);
        assert!(matches!(
            res,
            Err(KMeansError::NonFiniteValue { row: 2, col: 0 })
        ));
    }

    #[test]
    fn rejects_observations_without_features() {
        let points = Array2::<f64>::zeros((4, 0));
        let res = KMeans::params(2).fit(&points);
        assert!(matches!(res, Err(KMeansError::NoFeatures)));
    }
}
