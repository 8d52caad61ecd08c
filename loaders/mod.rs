//! # Dataset Loading
//!
//! Everything here is glue that feeds the estimation engine: reading tabular
//! files, fetching remote ones, selecting columns, adding an intercept row and
//! splitting into training and test halves. All matrices leave this module in
//! the engine's orientation, predictors (or responses) as rows and
//! observations as columns.

pub mod tabular;
pub mod registry;
pub mod remote;

use ndarray::{Array1, Array2, Axis, concatenate};
use polars::prelude::PolarsError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

/// A comprehensive error type for all data loading and preparation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Loaded columns could not be arranged into a matrix: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to numbers. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        found_type: String,
    },
    #[error("Missing or null values were found in the required column '{0}'.")]
    MissingValuesFound(String),
    #[error("Non-finite values (NaN or Infinity) were found in the required column '{0}'.")]
    NonFiniteValuesFound(String),
    #[error("No dataset named '{0}' is registered.")]
    UnknownDataset(String),
    #[error("Download of '{0}' did not produce a file.")]
    DownloadFailed(String),
    #[error("Could not build the download progress style: {0}")]
    ProgressTemplate(#[from] indicatif::style::TemplateError),
    #[error(
        "A test fraction of {test_size} leaves one side of the split empty for {observations} observations."
    )]
    EmptySplit { test_size: f64, observations: usize },
}

/// Design and response matrices plus the column names they came from.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Shape `[p, N]`.
    pub x: Array2<f64>,
    /// Shape `[q, N]`.
    pub y: Array2<f64>,
    pub x_names: Vec<String>,
    pub y_names: Vec<String>,
}

/// The four matrices produced by [`Dataset::test_train_split`].
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array2<f64>,
    pub y_test: Array2<f64>,
}

impl Dataset {
    pub fn n_observations(&self) -> usize {
        self.x.ncols()
    }

    /// Returns a copy of the dataset with a row of ones prepended to `x`.
    ///
    /// The original is untouched. Calling this on an already augmented dataset
    /// prepends a second constant row.
    pub fn with_constant(&self) -> Dataset {
        let ones = Array1::<f64>::ones(self.x.ncols()).insert_axis(Axis(0));
        let mut x_names = Vec::with_capacity(self.x_names.len() + 1);
        x_names.push("const".to_string());
        x_names.extend(self.x_names.iter().cloned());
        Dataset {
            // Both operands have the same number of columns, so this cannot fail.
            x: concatenate![Axis(0), ones, self.x],
            y: self.y.clone(),
            x_names,
            y_names: self.y_names.clone(),
        }
    }

    /// Splits observations into training and test parts.
    ///
    /// When `test_size` is not strictly between 0 and 1 the whole dataset is
    /// returned as both the training and the test part. Otherwise
    /// `ceil(test_size * N)` shuffled observations (seeded by `seed`) form the
    /// test part and the rest the training part.
    pub fn test_train_split(&self, test_size: f64, seed: u64) -> Result<TrainTestSplit, DataError> {
        if !(test_size > 0.0 && test_size < 1.0) {
            log::info!("Test fraction {test_size} is outside (0, 1); using all data for both parts");
            return Ok(TrainTestSplit {
                x_train: self.x.clone(),
                x_test: self.x.clone(),
                y_train: self.y.clone(),
                y_test: self.y.clone(),
            });
        }

        let n = self.n_observations();
        let n_test = (test_size * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(DataError::EmptySplit {
                test_size,
                observations: n,
            });
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);
        let (test_idx, train_idx) = order.split_at(n_test);

        Ok(TrainTestSplit {
            x_train: self.x.select(Axis(1), train_idx),
            x_test: self.x.select(Axis(1), test_idx),
            y_train: self.y.select(Axis(1), train_idx),
            y_test: self.y.select(Axis(1), test_idx),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_dataset() -> Dataset {
        Dataset {
            x: array![
                [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
                [0.5, 0.5, 0.5, 0.5, 0.5, 1.5, 1.5, 1.5, 1.5, 1.5]
            ],
            y: array![[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]],
            x_names: vec!["a".to_string(), "b".to_string()],
            y_names: vec!["y".to_string()],
        }
    }

    #[test]
    fn with_constant_prepends_ones_without_touching_the_original() {
        let data = small_dataset();
        let augmented = data.with_constant();
        assert_eq!(augmented.x.nrows(), 3);
        assert!(augmented.x.row(0).iter().all(|&v| v == 1.0));
        assert_eq!(augmented.x.row(1), data.x.row(0));
        assert_eq!(augmented.x_names[0], "const");
        assert_eq!(data.x.nrows(), 2);

        let twice = augmented.with_constant();
        assert_eq!(twice.x.nrows(), 4);
    }

    #[test]
    fn split_sizes_follow_the_fraction() {
        let data = small_dataset();
        let split = data.test_train_split(0.25, 0).unwrap();
        assert_eq!(split.x_test.ncols(), 3);
        assert_eq!(split.x_train.ncols(), 7);
        assert_eq!(split.y_test.ncols(), 3);
        assert_eq!(split.y_train.ncols(), 7);
        assert_eq!(split.x_train.nrows(), 2);
    }

    #[test]
    fn split_keeps_observations_paired() {
        // In this dataset y equals the first predictor row.
        let data = small_dataset();
        let split = data.test_train_split(0.4, 17).unwrap();
        assert_eq!(split.x_train.row(0), split.y_train.row(0));
        assert_eq!(split.x_test.row(0), split.y_test.row(0));

        let mut seen: Vec<f64> = split
            .y_train
            .iter()
            .chain(split.y_test.iter())
            .copied()
            .collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, data.y.row(0).to_vec());
    }

    #[test]
    fn split_is_reproducible_for_a_seed() {
        let data = small_dataset();
        let first = data.test_train_split(0.3, 42).unwrap();
        let second = data.test_train_split(0.3, 42).unwrap();
        assert_eq!(first.x_test, second.x_test);
        assert_eq!(first.y_train, second.y_train);
    }

    #[test]
    fn improper_fractions_use_the_whole_dataset_twice() {
        let data = small_dataset();
        for fraction in [0.0, 1.0, -0.5, 2.0, f64::NAN] {
            let split = data.test_train_split(fraction, 0).unwrap();
            assert_eq!(split.x_train, data.x);
            assert_eq!(split.x_test, data.x);
            assert_eq!(split.y_train, data.y);
            assert_eq!(split.y_test, data.y);
        }
    }

    #[test]
    fn split_that_empties_a_side_is_rejected() {
        let data = small_dataset();
        assert!(matches!(
            data.test_train_split(0.99, 0),
            Err(DataError::EmptySplit { .. })
        ));
    }

    #[test]
    fn shape_errors_keep_their_own_variant() {
        let shape_error = Array2::<f64>::from_shape_vec((2, 2), vec![1.0]).unwrap_err();
        let err = DataError::from(shape_error);
        assert!(matches!(err, DataError::Shape(_)));
        assert!(err.to_string().starts_with("Loaded columns could not be arranged"));
    }
}
