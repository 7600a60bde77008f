//! Decision-region grids: a regular lattice over the point cloud's bounding
//! box, with every node labeled by its nearest centroid. Renderers paint the
//! lattice as the background of a scatter plot to show where each cluster's
//! region begins and ends; nothing here is persisted.

use crate::k_means::KMeans;
use crate::param_guard::ParamGuard;
use ndarray::{array, Array, Array1, Array2, ArrayBase, Data, Ix2, Zip};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// An error when checking a grid configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridConfigError {
    #[error("margin must be a non-negative finite number")]
    Margin,
    #[error("step must be a positive finite number")]
    Step,
}

/// An error when computing a decision grid or a bounding box.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("invalid grid configuration: {0}")]
    InvalidConfig(#[from] GridConfigError),
    #[error("decision grids require 2-dimensional data, got {n_features} features")]
    NotPlanar { n_features: usize },
    #[error("cannot bound an empty point set")]
    EmptyPointSet,
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq)]
/// The axis-aligned rectangle `[x_min, x_max] × [y_min, y_max]` spanned by a
/// set of 2-D points.
pub struct BoundingBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Compute the tight bounding box of `points`, a matrix with shape
    /// `(n, 2)`.
    pub fn of_points(
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Self, GridError> {
        if points.ncols() != 2 {
            return Err(GridError::NotPlanar {
                n_features: points.ncols(),
            });
        }
        if points.nrows() == 0 {
            return Err(GridError::EmptyPointSet);
        }

        let mut bounds = BoundingBox {
            x_min: f64::INFINITY,
            x_max: f64::NEG_INFINITY,
            y_min: f64::INFINITY,
            y_max: f64::NEG_INFINITY,
        };
        for point in points.rows() {
            bounds.x_min = bounds.x_min.min(point[0]);
            bounds.x_max = bounds.x_max.max(point[0]);
            bounds.y_min = bounds.y_min.min(point[1]);
            bounds.y_max = bounds.y_max.max(point[1]);
        }
        Ok(bounds)
    }

    /// Grow the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        BoundingBox {
            x_min: self.x_min - margin,
            x_max: self.x_max + margin,
            y_min: self.y_min - margin,
            y_max: self.y_max + margin,
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// A checked grid configuration: the margin added around the point cloud's
/// bounding box and the lattice step size.
pub struct GridValidConfig {
    margin: f64,
    step: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// A helper struct for building a [valid grid configuration](GridValidConfig)
/// (using the builder pattern).
///
/// Defaults: `margin = 1.0`, `step = 0.2`. The lattice holds
/// `width / step × height / step` nodes, so small steps on wide-ranging data
/// get expensive quadratically; both knobs are configurable for exactly that
/// reason.
pub struct GridConfig(GridValidConfig);

impl GridConfig {
    pub fn new() -> Self {
        GridConfig(GridValidConfig {
            margin: 1.0,
            step: 0.2,
        })
    }

    /// Change the margin added on every side of the bounding box
    pub fn margin(mut self, margin: f64) -> Self {
        self.0.margin = margin;
        self
    }

    /// Change the lattice step size
    pub fn step(mut self, step: f64) -> Self {
        self.0.step = step;
        self
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamGuard for GridConfig {
    type Checked = GridValidConfig;
    type Error = GridConfigError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        if !self.0.margin.is_finite() || self.0.margin < 0.0 {
            Err(GridConfigError::Margin)
        } else if !self.0.step.is_finite() || self.0.step <= 0.0 {
            Err(GridConfigError::Step)
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}

impl GridValidConfig {
    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
/// A regular lattice over an expanded bounding box, with every node labeled
/// by the cluster id of its nearest centroid.
///
/// The lattice coordinates run `min, min + step, min + 2·step, …` and stop
/// strictly below `max` (half-open, like `numpy.arange`). `labels` has shape
/// `(y.len(), x.len())`: row `i` holds the nodes at height `y[i]`, column
/// `j` the nodes at abscissa `x[j]`. The same bounding box and the same
/// centroids always produce bit-for-bit identical labels.
pub struct DecisionGrid {
    x: Array1<f64>,
    y: Array1<f64>,
    labels: Array2<usize>,
    bounds: BoundingBox,
}

impl DecisionGrid {
    /// Classify every node of the lattice spanned by `bounds` (expanded by
    /// the configured margin) against the fitted centroids of `model`.
    ///
    /// Fails if the model was not fitted on 2-dimensional points.
    pub fn compute(
        model: &KMeans,
        bounds: BoundingBox,
        config: &GridValidConfig,
    ) -> Result<Self, GridError> {
        if model.centroids().ncols() != 2 {
            return Err(GridError::NotPlanar {
                n_features: model.centroids().ncols(),
            });
        }

        let bounds = bounds.expand(config.margin());
        let x = Array::range(bounds.x_min, bounds.x_max, config.step());
        let y = Array::range(bounds.y_min, bounds.y_max, config.step());

        let mut labels = Array2::zeros((y.len(), x.len()));
        Zip::indexed(&mut labels).par_for_each(|(i, j), label| {
            *label = model.classify(&array![x[j], y[i]]);
        });

        Ok(DecisionGrid {
            x,
            y,
            labels,
            bounds,
        })
    }

    /// Convenience wrapper: bound `points`, then compute the grid over them.
    pub fn over_points(
        model: &KMeans,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        config: &GridValidConfig,
    ) -> Result<Self, GridError> {
        let bounds = BoundingBox::of_points(points)?;
        Self::compute(model, bounds, config)
    }

    /// Lattice abscissas, in increasing order.
    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    /// Lattice ordinates, in increasing order.
    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    /// Cluster ids with shape `(y.len(), x.len())`.
    pub fn labels(&self) -> &Array2<usize> {
        &self.labels
    }

    /// The expanded bounding box the lattice actually covers.
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KMeans;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn fitted_pair() -> (KMeans, Array2<f64>) {
        let points = array![[1.0, 1.0], [1.0, 2.0], [9.0, 9.0], [9.0, 10.0]];
        let model = KMeans::params(2).fit(&points).unwrap();
        (model, points)
    }

    #[test]
    fn bounding_box_is_tight() {
        let points = array![[1.0, -2.0], [3.0, 7.0], [-4.0, 0.5]];
        let bounds = BoundingBox::of_points(&points).unwrap();
        assert_abs_diff_eq!(bounds.x_min, -4.0);
        assert_abs_diff_eq!(bounds.x_max, 3.0);
        assert_abs_diff_eq!(bounds.y_min, -2.0);
        assert_abs_diff_eq!(bounds.y_max, 7.0);
        assert_abs_diff_eq!(bounds.width(), 7.0);
        assert_abs_diff_eq!(bounds.height(), 9.0);

        let expanded = bounds.expand(1.0);
        assert_abs_diff_eq!(expanded.x_min, -5.0);
        assert_abs_diff_eq!(expanded.y_max, 8.0);
    }

    #[test]
    fn bounding_box_rejects_degenerate_input() {
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(
            BoundingBox::of_points(&empty),
            Err(GridError::EmptyPointSet)
        ));

        let three_d = Array2::<f64>::zeros((4, 3));
        assert!(matches!(
            BoundingBox::of_points(&three_d),
            Err(GridError::NotPlanar { n_features: 3 })
        ));
    }

    #[test]
    fn config_is_validated() {
        assert!(GridConfig::new().check().is_ok());
        assert!(matches!(
            GridConfig::new().step(0.0).check(),
            Err(GridConfigError::Step)
        ));
        assert!(matches!(
            GridConfig::new().step(f64::NAN).check(),
            Err(GridConfigError::Step)
        ));
        assert!(matches!(
            GridConfig::new().margin(-1.0).check(),
            Err(GridConfigError::Margin)
        ));
    }

    #[test]
    fn lattice_bounds_are_half_open() {
        let (model, _) = fitted_pair();
        let bounds = BoundingBox {
            x_min: 0.0,
            x_max: 1.0,
            y_min: 0.0,
            y_max: 0.5,
        };
        let config = GridConfig::new().margin(0.0).step(0.25).check().unwrap();
        let grid = DecisionGrid::compute(&model, bounds, &config).unwrap();

        // 0, 0.25, 0.5, 0.75: the upper bound itself is excluded.
        assert_abs_diff_eq!(grid.x(), &array![0.0, 0.25, 0.5, 0.75], epsilon = 1e-12);
        assert_abs_diff_eq!(grid.y(), &array![0.0, 0.25], epsilon = 1e-12);
        assert_eq!(grid.labels().dim(), (2, 4));
    }

    #[test]
    fn nodes_carry_the_label_of_their_nearest_centroid() {
        let (model, points) = fitted_pair();
        let config = GridConfig::new().check().unwrap();
        let grid = DecisionGrid::over_points(&model, &points, &config).unwrap();

        let low_label = model.classify(&array![1.0, 1.5]);
        let high_label = model.classify(&array![9.0, 9.5]);

        // Corner nodes sit deep inside each cluster's region.
        let (n_rows, n_cols) = grid.labels().dim();
        assert_eq!(grid.labels()[[0, 0]], low_label);
        assert_eq!(grid.labels()[[n_rows - 1, n_cols - 1]], high_label);
        assert!(grid.labels().iter().all(|&label| label < 2));

        // The lattice covers the expanded bounding box.
        assert_abs_diff_eq!(grid.bounds().x_min, 0.0);
        assert_abs_diff_eq!(grid.bounds().y_max, 11.0);
    }

    #[test]
    fn identical_inputs_give_identical_grids() {
        let (model, points) = fitted_pair();
        let config = GridConfig::new().check().unwrap();
        let first = DecisionGrid::over_points(&model, &points, &config).unwrap();
        let second = DecisionGrid::over_points(&model, &points, &config).unwrap();
        assert_eq!(first.labels(), second.labels());
        assert_eq!(first.x(), second.x());
        assert_eq!(first.y(), second.y());
    }
}
