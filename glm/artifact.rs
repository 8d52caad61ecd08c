use crate::family::Family;
use crate::model::{GlmError, GlmModel, coefficient_listing, predict_mean};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// A fitted model detached from its training data.
///
/// This is the structure that gets saved to and loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub family: Family,
    pub has_intercept: bool,
    pub params: Vec<f64>,
}

#[derive(Error, Debug)]
pub enum ModelFileError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error(transparent)]
    Model(#[from] GlmError),
}

impl FittedModel {
    /// Captures the coefficients of a fitted engine.
    pub fn from_model(model: &GlmModel<'_>) -> Result<Self, GlmError> {
        let params = model.params().ok_or(GlmError::NotFitted)?;
        Ok(Self {
            family: model.family(),
            has_intercept: model.has_intercept(),
            params: params.to_vec(),
        })
    }

    pub fn predict(&self, x_new: ArrayView2<f64>) -> Result<Array1<f64>, GlmError> {
        let params = Array1::from_vec(self.params.clone());
        predict_mean(self.family, params.view(), x_new)
    }

    pub fn summary(&self) -> String {
        let params = Array1::from_vec(self.params.clone());
        format!(
            "{}\n{}\n{}",
            self.family.banner(),
            "=".repeat(16),
            coefficient_listing(params.view(), self.has_intercept)
        )
    }

    /// Saves the model in a human-readable TOML format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelFileError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelFileError> {
        let toml_string = fs::read_to_string(path)?;
        let model = toml::from_str(&toml_string)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::NamedTempFile;

    #[test]
    fn saved_model_loads_back_identically() {
        let model = FittedModel {
            family: Family::Poisson,
            has_intercept: true,
            params: vec![0.25, -1.5],
        };
        let file = NamedTempFile::new().unwrap();
        model.save(file.path()).unwrap();

        let text = fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("family = \"poisson\""));

        let loaded = FittedModel::load(file.path()).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn loaded_model_predicts_like_the_engine() {
        let x = array![[1.0, 1.0, 1.0], [0.0, 1.0, 2.0]];
        let y = array![[1.0, 2.0, 4.0]];
        let mut engine = GlmModel::new(Family::Poisson, x.view(), y.view(), true).unwrap();
        engine.fit_default().unwrap();

        let artifact = FittedModel::from_model(&engine).unwrap();
        let direct = engine.predict(x.view()).unwrap();
        let detached = artifact.predict(x.view()).unwrap();
        assert_eq!(direct, detached);
        assert!(artifact.summary().starts_with("Poisson GLM has been fit"));
    }

    #[test]
    fn unfit_engine_cannot_be_exported() {
        let x = array![[1.0, 2.0]];
        let y = array![[1.0, 2.0]];
        let engine = GlmModel::new(Family::Gaussian, x.view(), y.view(), false).unwrap();
        assert!(matches!(
            FittedModel::from_model(&engine),
            Err(GlmError::NotFitted)
        ));
    }
}
