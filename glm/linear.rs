use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Computes the linear predictor `eta = X^T beta`.
///
/// `x` is laid out with predictors as rows and observations as columns
/// (`[p, N]`), so the result has one entry per observation.
pub fn linear_predictor(params: ArrayView1<f64>, x: ArrayView2<f64>) -> Array1<f64> {
    x.t().dot(&params)
}

/// Gradient of the negative log-likelihood for a canonical link.
///
/// For every canonical-link family the score with respect to `beta` reduces to
/// `X (y - mu)`; with `q` response rows sharing one mean the negated score is
/// `X (q mu - sum_r y_r)`.
pub fn canonical_gradient(
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    mu: ArrayView1<f64>,
) -> Array1<f64> {
    let q = y.nrows() as f64;
    let residual = &mu * q - &y.sum_axis(Axis(0));
    x.dot(&residual)
}
