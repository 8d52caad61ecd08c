//! # Optimizer Adapter
//!
//! The estimation engine never iterates on its own. It hands an [`Objective`]
//! and a starting point to a [`Minimizer`] and stores whatever comes back. The
//! default backend wraps the BFGS implementation from `wolfe_bfgs`; any other
//! unconstrained minimizer can be substituted by implementing the trait.
//!
//! Failures reported by the backend are passed through as [`OptimizerError`]
//! without retries or reinterpretation.

use ndarray::{Array1, ArrayView1};
use thiserror::Error;
use wolfe_bfgs::{Bfgs, BfgsSolution};

/// A scalar function of the parameter vector together with its gradient.
///
/// Any auxiliary data the function needs (design and response matrices) is
/// owned or borrowed by the implementor and must not be mutated by evaluation.
pub trait Objective {
    fn value(&self, params: ArrayView1<f64>) -> f64;
    fn gradient(&self, params: ArrayView1<f64>) -> Array1<f64>;

    /// Both at once. Implementors whose value and gradient share intermediate
    /// results should override this; the minimizer calls it on every step.
    fn value_and_gradient(&self, params: ArrayView1<f64>) -> (f64, Array1<f64>) {
        (self.value(params), self.gradient(params))
    }
}

/// The outcome of a successful minimizer run.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub params: Array1<f64>,
    pub value: f64,
    /// Whether the gradient norm at `params` is within the backend's tolerance.
    pub converged: bool,
    pub iterations: usize,
    pub gradient_norm: f64,
}

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("The objective is not finite at the starting point (value: {0}).")]
    NonFiniteStart(f64),

    #[error("BFGS optimization failed: {0}")]
    BfgsFailed(String),
}

/// An unconstrained minimizer over continuous parameters.
pub trait Minimizer {
    fn minimize(
        &self,
        objective: &dyn Objective,
        initial: Array1<f64>,
    ) -> Result<Minimum, OptimizerError>;
}

/// Quasi-Newton BFGS with a Wolfe line search, from the `wolfe_bfgs` crate.
#[derive(Debug, Clone, Copy)]
pub struct BfgsMinimizer {
    /// Gradient-norm tolerance at which the backend declares convergence.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for BfgsMinimizer {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 500,
        }
    }
}

impl BfgsMinimizer {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

impl Minimizer for BfgsMinimizer {
    fn minimize(
        &self,
        objective: &dyn Objective,
        initial: Array1<f64>,
    ) -> Result<Minimum, OptimizerError> {
        let initial_cost = objective.value(initial.view());
        if !initial_cost.is_finite() {
            return Err(OptimizerError::NonFiniteStart(initial_cost));
        }
        log::debug!(
            "Starting BFGS with {} parameters, initial cost {:.6}",
            initial.len(),
            initial_cost
        );

        // Non-finite costs are handed to the line search as-is so it can back
        // away from infeasible regions.
        let cost_and_grad = |params: &Array1<f64>| -> (f64, Array1<f64>) {
            objective.value_and_gradient(params.view())
        };

        let BfgsSolution {
            final_point,
            final_value,
            iterations,
            ..
        } = Bfgs::new(initial, cost_and_grad)
            .with_tolerance(self.tolerance)
            .with_max_iterations(self.max_iterations)
            .run()
            .map_err(|e| OptimizerError::BfgsFailed(format!("{e:?}")))?;

        let gradient = objective.gradient(final_point.view());
        let gradient_norm = gradient.dot(&gradient).sqrt();
        log::debug!(
            "BFGS finished after {iterations} iterations: cost {final_value:.6}, gradient norm {gradient_norm:.3e}"
        );

        Ok(Minimum {
            params: final_point,
            value: final_value,
            converged: gradient_norm <= self.tolerance,
            iterations,
            gradient_norm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::cell::Cell;

    /// f(x) = (x0 - 3)^2 + 2 (x1 + 1)^2
    struct Bowl;

    impl Objective for Bowl {
        fn value(&self, params: ArrayView1<f64>) -> f64 {
            (params[0] - 3.0).powi(2) + 2.0 * (params[1] + 1.0).powi(2)
        }

        fn gradient(&self, params: ArrayView1<f64>) -> Array1<f64> {
            array![2.0 * (params[0] - 3.0), 4.0 * (params[1] + 1.0)]
        }
    }

    struct Infeasible;

    impl Objective for Infeasible {
        fn value(&self, params: ArrayView1<f64>) -> f64 {
            if params[0] > 0.0 { f64::NAN } else { 0.0 }
        }

        fn gradient(&self, params: ArrayView1<f64>) -> Array1<f64> {
            Array1::zeros(params.len())
        }
    }

    /// The bowl again, counting how it is evaluated.
    #[derive(Default)]
    struct CountingBowl {
        separate: Cell<usize>,
        combined: Cell<usize>,
    }

    impl Objective for CountingBowl {
        fn value(&self, params: ArrayView1<f64>) -> f64 {
            self.separate.set(self.separate.get() + 1);
            Bowl.value(params)
        }

        fn gradient(&self, params: ArrayView1<f64>) -> Array1<f64> {
            self.separate.set(self.separate.get() + 1);
            Bowl.gradient(params)
        }

        fn value_and_gradient(&self, params: ArrayView1<f64>) -> (f64, Array1<f64>) {
            self.combined.set(self.combined.get() + 1);
            (Bowl.value(params), Bowl.gradient(params))
        }
    }

    #[test]
    fn bfgs_steps_use_the_combined_evaluation() {
        let objective = CountingBowl::default();
        let minimum = BfgsMinimizer::default()
            .minimize(&objective, array![0.1, 0.1])
            .unwrap();
        assert!(minimum.converged);
        assert!(objective.combined.get() >= minimum.iterations.max(1));
        // Only the starting cost check and the final gradient norm.
        assert_eq!(objective.separate.get(), 2);
    }

    #[test]
    fn bfgs_finds_the_bottom_of_a_quadratic_bowl() {
        let minimum = BfgsMinimizer::default()
            .minimize(&Bowl, array![0.1, 0.1])
            .unwrap();
        assert_abs_diff_eq!(minimum.params[0], 3.0, epsilon = 1e-5);
        assert_abs_diff_eq!(minimum.params[1], -1.0, epsilon = 1e-5);
        assert!(minimum.value < 1e-9);
        assert!(minimum.converged);
    }

    #[test]
    fn runs_are_deterministic() {
        let first = BfgsMinimizer::default()
            .minimize(&Bowl, array![0.1, 0.1])
            .unwrap();
        let second = BfgsMinimizer::default()
            .minimize(&Bowl, array![0.1, 0.1])
            .unwrap();
        assert_eq!(first.params, second.params);
    }

    #[test]
    fn non_finite_start_is_reported() {
        let err = BfgsMinimizer::default()
            .minimize(&Infeasible, array![1.0])
            .unwrap_err();
        assert!(matches!(err, OptimizerError::NonFiniteStart(v) if v.is_nan()));
    }
}
