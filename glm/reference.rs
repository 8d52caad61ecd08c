//! # Reference Fit by Iteratively Reweighted Least Squares
//!
//! An independent estimator used to check the likelihood-maximization engine.
//! For a canonical link the Fisher scoring update is a weighted least-squares
//! solve, so each iteration forms `X W X^T beta = X W z` with the working
//! weights `W = Var(mu)` and the working response `z = eta + (y - mu) / W`.
//!
//! The loop starts from the data rather than from a fixed coefficient vector,
//! the way standard GLM software does, so it does not share a starting point
//! (or a failure mode) with the engine it is compared against.

use crate::family::Family;
use crate::linear::linear_predictor;
use ndarray::{Array1, ArrayView2, Axis, Zip};
use ndarray_linalg::Solve;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Invalid reference fit arguments: {0}")]
    Argument(String),

    #[error("A linear system solve failed. X W X^T may be singular. Error: {0}")]
    LinearSystemSolveFailed(#[from] ndarray_linalg::error::LinalgError),

    #[error(
        "IRLS did not converge within {max_iterations} iterations. Last deviance change was {last_change:.6e}."
    )]
    DidNotConverge {
        max_iterations: usize,
        last_change: f64,
    },
}

/// Settings for the reference IRLS loop.
#[derive(Debug, Clone, Copy)]
pub struct IrlsOptions {
    pub max_iterations: usize,
    /// Relative change in deviance below which the loop stops.
    pub tolerance: f64,
}

impl Default for IrlsOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-12,
        }
    }
}

/// The coefficients and bookkeeping of a converged IRLS run.
#[derive(Debug, Clone)]
pub struct ReferenceFit {
    pub params: Array1<f64>,
    pub deviance: f64,
    pub iterations: usize,
}

/// Fits `family` to `X` (`[p, N]`) and `Y` (`[q, N]`) by IRLS.
///
/// With several response rows the model has a single shared mean, so the rows
/// are averaged into one working response.
pub fn fit_irls(
    family: Family,
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    options: &IrlsOptions,
) -> Result<ReferenceFit, ReferenceError> {
    if x.ncols() != y.ncols() {
        return Err(ReferenceError::Argument(format!(
            "X has {} observations but Y has {}",
            x.ncols(),
            y.ncols()
        )));
    }
    let y_bar = y
        .mean_axis(Axis(0))
        .ok_or_else(|| ReferenceError::Argument("Y has no response rows".to_string()))?;

    let mut mu = initial_mean(family, &y_bar);
    let mut eta = mu.mapv(|m| forward_link(family, m));
    let mut deviance = unit_deviance(family, &y_bar, &mu);

    for iteration in 1..=options.max_iterations {
        let weights = mu.mapv(|m| variance(family, m));
        let z = &eta + &((&y_bar - &mu) / &weights);

        let xw = &x * &weights;
        let xtwx = xw.dot(&x.t());
        let xtwz = xw.dot(&z);
        let params = xtwx.solve(&xtwz)?;

        eta = linear_predictor(params.view(), x);
        mu = family.mean(eta.view());
        let next_deviance = unit_deviance(family, &y_bar, &mu);
        let change = (next_deviance - deviance).abs();
        log::debug!("IRLS iteration {iteration}: deviance {next_deviance:.10}, change {change:.3e}");
        deviance = next_deviance;

        if change <= options.tolerance * (deviance.abs() + 0.1) {
            return Ok(ReferenceFit {
                params,
                deviance,
                iterations: iteration,
            });
        }
        if iteration == options.max_iterations {
            return Err(ReferenceError::DidNotConverge {
                max_iterations: options.max_iterations,
                last_change: change,
            });
        }
    }

    // Only reachable with max_iterations == 0.
    Err(ReferenceError::DidNotConverge {
        max_iterations: options.max_iterations,
        last_change: f64::INFINITY,
    })
}

fn initial_mean(family: Family, y: &Array1<f64>) -> Array1<f64> {
    match family {
        Family::Gaussian => y.clone(),
        Family::Bernoulli => y.mapv(|v| (v + 0.5) / 2.0),
        Family::Poisson => {
            let mean = y.mean().unwrap_or(1.0);
            y.mapv(|v| (v + mean) / 2.0)
        }
    }
}

fn forward_link(family: Family, mu: f64) -> f64 {
    match family {
        Family::Gaussian => mu,
        Family::Bernoulli => (mu / (1.0 - mu)).ln(),
        Family::Poisson => mu.ln(),
    }
}

fn variance(family: Family, mu: f64) -> f64 {
    match family {
        Family::Gaussian => 1.0,
        Family::Bernoulli => mu * (1.0 - mu),
        Family::Poisson => mu,
    }
}

/// Sum of unit deviances, `2 (l(y; y) - l(mu; y))`.
fn unit_deviance(family: Family, y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
    // y ln(y / mu) with the 0 ln 0 = 0 convention.
    fn y_log_ratio(y: f64, mu: f64) -> f64 {
        if y > 0.0 { y * (y / mu).ln() } else { 0.0 }
    }

    Zip::from(y).and(mu).fold(0.0, |acc, &yi, &mui| {
        let term = match family {
            Family::Gaussian => (yi - mui).powi(2),
            Family::Bernoulli => {
                2.0 * (y_log_ratio(yi, mui) + y_log_ratio(1.0 - yi, 1.0 - mui))
            }
            Family::Poisson => 2.0 * (y_log_ratio(yi, mui) - (yi - mui)),
        };
        acc + term
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn gaussian_reference_is_ordinary_least_squares() {
        let x = array![[1.0, 1.0, 1.0, 1.0], [0.0, 1.0, 2.0, 3.0]];
        let y = array![[1.0, 3.0, 5.0, 7.0]];
        let fit = fit_irls(Family::Gaussian, x.view(), y.view(), &IrlsOptions::default()).unwrap();
        assert_abs_diff_eq!(fit.params[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.params[1], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.deviance, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn poisson_intercept_only_matches_log_mean() {
        let x = array![[1.0, 1.0, 1.0, 1.0, 1.0]];
        let y = array![[0.0, 2.0, 3.0, 1.0, 4.0]];
        let fit = fit_irls(Family::Poisson, x.view(), y.view(), &IrlsOptions::default()).unwrap();
        assert_abs_diff_eq!(fit.params[0], 2.0f64.ln(), epsilon = 1e-8);
    }

    #[test]
    fn bernoulli_intercept_only_matches_log_odds() {
        let x = array![[1.0, 1.0, 1.0, 1.0]];
        let y = array![[1.0, 0.0, 0.0, 0.0]];
        let fit = fit_irls(Family::Bernoulli, x.view(), y.view(), &IrlsOptions::default()).unwrap();
        assert_abs_diff_eq!(fit.params[0], (0.25f64 / 0.75).ln(), epsilon = 1e-8);
    }

    #[test]
    fn zero_iterations_is_reported_as_non_convergence() {
        let x = array![[1.0, 1.0]];
        let y = array![[1.0, 2.0]];
        let options = IrlsOptions {
            max_iterations: 0,
            tolerance: 1e-12,
        };
        assert!(matches!(
            fit_irls(Family::Gaussian, x.view(), y.view(), &options),
            Err(ReferenceError::DidNotConverge { .. })
        ));
    }
}
