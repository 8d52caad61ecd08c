//! # Response Families
//!
//! Each supported distribution is a variant of [`Family`]. A variant carries the
//! two pure functions the estimation engine needs: the inverse link that maps
//! the linear predictor `eta` to the mean `mu`, and the point log-likelihood of
//! a single response given that mean. All three links are canonical for their
//! family, which is what lets the engine supply an exact gradient to the
//! optimizer.
//!
//! Nothing in this module clamps. Responses outside a family's support and
//! means outside the valid range produce `-inf` or `NaN`, and those values are
//! expected to reach the optimizer untouched.

use crate::model::GlmError;
use ndarray::{Array1, ArrayView1, ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// The response distribution of a generalized linear model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Normal responses with unit variance and the identity link.
    /// The variance is fixed, not estimated.
    Gaussian,
    /// Binary responses with the logit link.
    Bernoulli,
    /// Count responses with the log link.
    Poisson,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Gaussian, Family::Bernoulli, Family::Poisson];

    /// Inverse link for a single linear predictor value.
    pub fn link(self, eta: f64) -> f64 {
        match self {
            Family::Gaussian => eta,
            Family::Bernoulli => {
                // Two algebraically equal branches of e^eta / (1 + e^eta); neither overflows.
                if eta >= 0.0 {
                    1.0 / (1.0 + (-eta).exp())
                } else {
                    let e = eta.exp();
                    e / (1.0 + e)
                }
            }
            Family::Poisson => eta.exp(),
        }
    }

    /// Applies the inverse link element-wise.
    pub fn mean(self, eta: ArrayView1<f64>) -> Array1<f64> {
        eta.mapv(|e| self.link(e))
    }

    /// Log-probability (or log-density) of one response `y` at mean `mu`.
    pub fn log_likelihood_term(self, y: f64, mu: f64) -> f64 {
        match self {
            Family::Gaussian => {
                let residual = y - mu;
                -0.5 * (2.0 * PI).ln() - 0.5 * residual * residual
            }
            Family::Bernoulli => {
                if !(0.0..=1.0).contains(&mu) {
                    f64::NAN
                } else if y == 1.0 {
                    mu.ln()
                } else if y == 0.0 {
                    (1.0 - mu).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
            Family::Poisson => {
                if mu.is_nan() || mu < 0.0 {
                    f64::NAN
                } else if y < 0.0 || y.fract() != 0.0 {
                    f64::NEG_INFINITY
                } else if y == 0.0 {
                    -mu
                } else {
                    y * mu.ln() - mu - ln_gamma(y + 1.0)
                }
            }
        }
    }

    /// Total log-likelihood of every response row of `y` against the shared mean.
    ///
    /// `y` has shape `[q, N]` and `mu` has length `N`.
    pub fn log_likelihood(self, y: ArrayView2<f64>, mu: ArrayView1<f64>) -> f64 {
        y.rows()
            .into_iter()
            .map(|row| {
                Zip::from(&row)
                    .and(&mu)
                    .fold(0.0, |acc, &yi, &mui| acc + self.log_likelihood_term(yi, mui))
            })
            .sum()
    }

    /// The banner printed above a fitted model's coefficient listing.
    pub fn banner(self) -> &'static str {
        match self {
            Family::Gaussian => "Normal GLM has been fit",
            Family::Bernoulli => "Bernoulli GLM has been fit",
            Family::Poisson => "Poisson GLM has been fit",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Family::Gaussian => "gaussian",
            Family::Bernoulli => "bernoulli",
            Family::Poisson => "poisson",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Family {
    type Err = GlmError;

    /// Accepts the family names plus the aliases `normal` and `binomial`. Any
    /// other name has no specialization.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" | "normal" => Ok(Family::Gaussian),
            "bernoulli" | "binomial" => Ok(Family::Bernoulli),
            "poisson" => Ok(Family::Poisson),
            other => Err(GlmError::NotImplemented(other.to_string())),
        }
    }
}
