use super::algorithm::update_min_dists;
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use ndarray_rand::rand;
use ndarray_rand::rand::distributions::{Distribution, WeightedIndex};
use ndarray_rand::rand::Rng;

/// The initialization strategy used to pick the starting centroids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KMeansInit {
    /// The starting centroids are `n_clusters` distinct observations,
    /// sampled uniformly without replacement.
    Random,
    /// The k-means++ scheme: each subsequent centroid is an observation
    /// sampled with probability proportional to its squared distance from
    /// the centroids chosen so far.
    KMeansPlusPlus,
}

impl KMeansInit {
    pub(crate) fn run(
        self,
        n_clusters: usize,
        observations: &ArrayView2<f64>,
        rng: &mut impl Rng,
    ) -> Array2<f64> {
        match self {
            Self::Random => random_init(n_clusters, observations, rng),
            Self::KMeansPlusPlus => k_means_pp(n_clusters, observations, rng),
        }
    }
}

fn random_init(
    n_clusters: usize,
    observations: &ArrayView2<f64>,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let (n_samples, _) = observations.dim();
    let indices = rand::seq::index::sample(rng, n_samples, n_clusters).into_vec();
    observations.select(Axis(0), &indices)
}

fn k_means_pp(
    n_clusters: usize,
    observations: &ArrayView2<f64>,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let (n_samples, n_features) = observations.dim();
    let mut centroids = Array2::zeros((n_clusters, n_features));
    let first = rng.gen_range(0..n_samples);
    centroids.row_mut(0).assign(&observations.row(first));

    let mut dists = Array1::zeros(n_samples);
    for c_cnt in 1..n_clusters {
        update_min_dists(
            &centroids.slice(s![0..c_cnt, ..]),
            observations,
            &mut dists,
        );
        // When every observation coincides with an already chosen centroid
        // the weights degenerate to all-zero; fall back to a uniform draw
        // so coincident point sets still initialize.
        let centroid_idx = match WeightedIndex::new(dists.iter()) {
            Ok(weights) => weights.sample(rng),
            Err(_) => rng.gen_range(0..n_samples),
        };
        centroids
            .row_mut(c_cnt)
            .assign(&observations.row(centroid_idx));
    }
    centroids
}
