//! `clustergrid` implements the clustering core of a 2-D segmentation tool
//! in pure Rust.
//!
//! ## The big picture
//!
//! Given a set of 2-dimensional points and a cluster count `k`, the crate
//! partitions the points with K-means (Lloyd's algorithm), hands back
//! per-point labels and the `k` centroids, and classifies arbitrary query
//! points against the fitted centroids. On top of that it builds a dense
//! decision-region grid over the point cloud's bounding box, the kind used
//! to paint cluster backgrounds behind a scatter plot.
//!
//! Around the core sit two small data-shape contracts: projecting a
//! named-column table onto two numeric feature columns, and writing the
//! table back out as CSV with an appended `Cluster` column.
//!
//! ## What it does not do
//!
//! No persistence, no streaming ingestion, no incremental clustering, no
//! alternative clustering algorithms and no rendering: the crate stops at
//! labels, centroids and grids, and leaves presentation to its callers.
//!
//! ## Example
//!
//! ```
//! use clustergrid::{KMeans, ParamGuard};
//! use ndarray::array;
//!
//! let points = array![[1.0, 1.0], [1.0, 2.0], [9.0, 9.0], [9.0, 10.0]];
//!
//! // `n_clusters` is the only mandatory parameter; the default RNG is
//! // seeded, so repeated runs on the same input agree exactly.
//! let model = KMeans::params(2)
//!     .check()
//!     .unwrap()
//!     .fit(&points)
//!     .unwrap();
//!
//! let labels = model.predict(&points);
//! assert_eq!(labels.len(), 4);
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[1], labels[2]);
//! ```

mod grid;
mod k_means;
mod param_guard;
mod table;
mod utils;

pub use grid::*;
pub use k_means::*;
pub use param_guard::ParamGuard;
pub use table::*;
pub use utils::*;
