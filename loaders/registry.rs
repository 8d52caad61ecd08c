//! Named dataset presets and the folder they are cached in.

use super::remote;
use super::tabular::load_table;
use super::{DataError, Dataset};
use std::path::PathBuf;

/// A registered dataset: the URL it is fetched from and the columns that form
/// `X` and `Y`.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSpec {
    pub name: &'static str,
    pub url: &'static str,
    pub x_names: &'static [&'static str],
    pub y_names: &'static [&'static str],
}

pub const DATASETS: [DatasetSpec; 3] = [
    DatasetSpec {
        name: "duncan",
        url: "https://vincentarelbundock.github.io/Rdatasets/csv/carData/Duncan.csv",
        x_names: &["education", "prestige"],
        y_names: &["income"],
    },
    DatasetSpec {
        name: "spector",
        url: "https://raw.githubusercontent.com/statsmodels/statsmodels/main/statsmodels/datasets/spector/spector.csv",
        x_names: &["GPA", "TUCE", "PSI"],
        y_names: &["GRADE"],
    },
    DatasetSpec {
        name: "warpbreaks",
        url: "https://raw.githubusercontent.com/BI-DS/GRA-4152/refs/heads/master/warpbreaks.csv",
        x_names: &["wool", "tension"],
        y_names: &["breaks"],
    },
];

/// Looks up a preset by name.
pub fn lookup(name: &str) -> Result<&'static DatasetSpec, DataError> {
    DATASETS
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| DataError::UnknownDataset(name.to_string()))
}

/// The folder presets are downloaded into and cached in.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub data_dir: PathBuf,
}

impl DataConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Loads `spec` keeping only the predictors at `predictor_indices`.
    pub fn load(
        &self,
        spec: &DatasetSpec,
        predictor_indices: &[usize],
    ) -> Result<Dataset, DataError> {
        let path = remote::fetch(spec.url, &self.data_dir)?;

        let x_names = predictor_indices
            .iter()
            .map(|&i| {
                spec.x_names
                    .get(i)
                    .map(|name| name.to_string())
                    .ok_or_else(|| DataError::ColumnNotFound(format!("x{}", i + 1)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let y_names: Vec<String> = spec.y_names.iter().map(|s| s.to_string()).collect();

        load_table(&path, &x_names, &y_names)
    }
}
