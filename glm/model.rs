//! # The GLM Estimation Engine
//!
//! [`GlmModel`] ties the pieces together. It borrows the caller's design matrix
//! `X` (`[p, N]`) and response matrix `Y` (`[q, N]`), builds the negative
//! log-likelihood objective for its [`Family`], hands that objective to a
//! [`Minimizer`], and keeps the resulting coefficients for prediction.
//!
//! The engine reports exactly what the minimizer reports. It does not restart
//! from other seeds and does not judge the quality of the fit; a run that ends
//! away from a stationary point is logged and otherwise accepted.

use crate::family::Family;
use crate::linear::{canonical_gradient, linear_predictor};
use crate::optimizer::{BfgsMinimizer, Minimizer, Objective, OptimizerError};
use ndarray::{Array1, ArrayView1, ArrayView2};
use std::fmt::Write as FmtWrite;
use thiserror::Error;

/// The starting value used for every coefficient when none is given.
pub const DEFAULT_INITIAL_VALUE: f64 = 0.1;

#[derive(Error, Debug)]
pub enum GlmError {
    #[error("Invalid model arguments: {0}")]
    Argument(String),

    #[error("Model has not been fit yet. Please call fit() first.")]
    NotFitted,

    #[error("No GLM specialization is available for the '{0}' family.")]
    NotImplemented(String),

    #[error("Optimizer failure: {0}")]
    Optimizer(#[from] OptimizerError),
}

/// The negative log-likelihood of a family as a function of the coefficients.
///
/// `X` and `Y` are carried along unchanged to every evaluation.
pub struct NegLogLikelihood<'a> {
    family: Family,
    x: ArrayView2<'a, f64>,
    y: ArrayView2<'a, f64>,
}

impl<'a> NegLogLikelihood<'a> {
    pub fn new(family: Family, x: ArrayView2<'a, f64>, y: ArrayView2<'a, f64>) -> Self {
        Self { family, x, y }
    }

    fn mean(&self, params: ArrayView1<f64>) -> Array1<f64> {
        self.family.mean(linear_predictor(params, self.x).view())
    }
}

impl Objective for NegLogLikelihood<'_> {
    fn value(&self, params: ArrayView1<f64>) -> f64 {
        let mu = self.mean(params);
        -self.family.log_likelihood(self.y, mu.view())
    }

    fn gradient(&self, params: ArrayView1<f64>) -> Array1<f64> {
        let mu = self.mean(params);
        canonical_gradient(self.x, self.y, mu.view())
    }

    fn value_and_gradient(&self, params: ArrayView1<f64>) -> (f64, Array1<f64>) {
        let mu = self.mean(params);
        (
            -self.family.log_likelihood(self.y, mu.view()),
            canonical_gradient(self.x, self.y, mu.view()),
        )
    }
}

/// A generalized linear model over borrowed data.
///
/// Construction validates shapes but does not fit. Coefficients exist only
/// after a successful call to [`GlmModel::fit`].
pub struct GlmModel<'a> {
    family: Family,
    x: ArrayView2<'a, f64>,
    y: ArrayView2<'a, f64>,
    has_intercept: bool,
    params: Option<Array1<f64>>,
    minimizer: Box<dyn Minimizer>,
}

impl<'a> GlmModel<'a> {
    pub fn new(
        family: Family,
        x: ArrayView2<'a, f64>,
        y: ArrayView2<'a, f64>,
        has_intercept: bool,
    ) -> Result<Self, GlmError> {
        if x.ncols() != y.ncols() {
            return Err(GlmError::Argument(format!(
                "Matrices have different numbers of observations: X has {}, Y has {}",
                x.ncols(),
                y.ncols()
            )));
        }
        if x.nrows() == 0 {
            return Err(GlmError::Argument(
                "The design matrix has no predictor rows".to_string(),
            ));
        }
        if y.nrows() == 0 {
            return Err(GlmError::Argument(
                "The response matrix has no rows".to_string(),
            ));
        }
        if x.ncols() == 0 {
            return Err(GlmError::Argument("There are no observations".to_string()));
        }

        Ok(Self {
            family,
            x,
            y,
            has_intercept,
            params: None,
            minimizer: Box::new(BfgsMinimizer::default()),
        })
    }

    /// Substitutes the optimization backend used by [`GlmModel::fit`].
    pub fn with_minimizer(mut self, minimizer: impl Minimizer + 'static) -> Self {
        self.minimizer = Box::new(minimizer);
        self
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn has_intercept(&self) -> bool {
        self.has_intercept
    }

    pub fn is_fit(&self) -> bool {
        self.params.is_some()
    }

    /// The fitted coefficients, or `None` before a successful fit.
    pub fn params(&self) -> Option<&Array1<f64>> {
        self.params.as_ref()
    }

    /// The objective this model minimizes, bound to its training data.
    pub fn objective(&self) -> NegLogLikelihood<'a> {
        NegLogLikelihood::new(self.family, self.x, self.y)
    }

    /// Maximizes the likelihood starting with every coefficient at `initial_value`.
    ///
    /// On success the coefficients are stored and returned. Errors from the
    /// minimizer leave the model in whatever state it was in before the call.
    pub fn fit(&mut self, initial_value: f64) -> Result<Array1<f64>, GlmError> {
        let p = self.x.nrows();
        log::info!(
            "Fitting {} GLM with {} parameters on {} observations",
            self.family,
            p,
            self.x.ncols()
        );

        let initial = Array1::from_elem(p, initial_value);
        let objective = self.objective();
        let minimum = self.minimizer.minimize(&objective, initial)?;

        if !minimum.converged {
            log::warn!(
                "Optimizer stopped after {} iterations with gradient norm {:.3e}; the estimate may not be a maximum of the likelihood",
                minimum.iterations,
                minimum.gradient_norm
            );
        }
        log::info!(
            "Fit finished: negative log-likelihood {:.6} after {} iterations",
            minimum.value,
            minimum.iterations
        );

        self.params = Some(minimum.params.clone());
        Ok(minimum.params)
    }

    /// [`GlmModel::fit`] with [`DEFAULT_INITIAL_VALUE`].
    pub fn fit_default(&mut self) -> Result<Array1<f64>, GlmError> {
        self.fit(DEFAULT_INITIAL_VALUE)
    }

    /// Predicts the mean response for each observation (column) of `x_new`.
    pub fn predict(&self, x_new: ArrayView2<f64>) -> Result<Array1<f64>, GlmError> {
        let params = self.params.as_ref().ok_or(GlmError::NotFitted)?;
        predict_mean(self.family, params.view(), x_new)
    }

    /// The coefficient listing headed by the family banner.
    pub fn summary(&self) -> Result<String, GlmError> {
        let params = self.params.as_ref().ok_or(GlmError::NotFitted)?;
        let mut out = String::new();
        let banner = self.family.banner();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{banner}");
        let _ = writeln!(out, "{}", "=".repeat(16));
        out.push_str(&coefficient_listing(params.view(), self.has_intercept));
        Ok(out)
    }
}

/// `link(X_new^T beta)` for a family and a coefficient vector.
pub fn predict_mean(
    family: Family,
    params: ArrayView1<f64>,
    x_new: ArrayView2<f64>,
) -> Result<Array1<f64>, GlmError> {
    if x_new.nrows() != params.len() {
        return Err(GlmError::Argument(format!(
            "Prediction data has {} predictor rows, but the model has {} coefficients",
            x_new.nrows(),
            params.len()
        )));
    }
    Ok(family.mean(linear_predictor(params, x_new).view()))
}

/// Label of coefficient `index`. With an intercept the first coefficient is `x0`.
pub fn coefficient_label(index: usize, has_intercept: bool) -> String {
    format!("x{}", index + usize::from(!has_intercept))
}

/// One `label: value` line per coefficient.
pub fn coefficient_listing(params: ArrayView1<f64>, has_intercept: bool) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, value)| format!("{}: {value:>12.6}\n", coefficient_label(i, has_intercept)))
        .collect()
}
