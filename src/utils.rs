use ndarray::{s, Array, Array2, ArrayBase, Data, Ix1, Ix2};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;

/// Given an input matrix `blob_centroids`, with shape
/// `(n_blobs, n_features)`, generate `blob_size` points (a "blob") around
/// each of the blob centroids, sampled from a normal distribution with unit
/// variance.
///
/// `generate_blobs` can be used to quickly assemble a synthetic dataset to
/// test or benchmark clustering on a best-case scenario input.
pub fn generate_blobs(
    blob_size: usize,
    blob_centroids: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let (n_centroids, n_features) = blob_centroids.dim();
    let mut blobs: Array2<f64> = Array2::zeros((n_centroids * blob_size, n_features));

    for (blob_index, blob_centroid) in blob_centroids.rows().into_iter().enumerate() {
        let blob = generate_blob(blob_size, &blob_centroid, rng);
        blobs
            .slice_mut(s![blob_index * blob_size..(blob_index + 1) * blob_size, ..])
            .assign(&blob);
    }
    blobs
}

/// Generate `blob_size` points (a "blob") around `blob_centroid`, sampled
/// from a normal distribution with unit variance.
pub fn generate_blob(
    blob_size: usize,
    blob_centroid: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let shape = (blob_size, blob_centroid.len());
    let origin_blob: Array2<f64> = Array::random_using(shape, StandardNormal, rng);
    origin_blob + blob_centroid
}
