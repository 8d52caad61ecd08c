//! Side-by-side comparison tables for the engine and the reference fit.

use glmfit::model::coefficient_label;
use ndarray::ArrayView1;

/// Margin of error used when deciding whether two fits agree.
pub const MARGIN_OF_ERROR: f64 = 1e-5;

/// Relative tolerance applied on top of the absolute margin.
const RELATIVE_TOLERANCE: f64 = 1e-5;

/// Element-wise `|a - b| <= atol + rtol * |b|` over equally long vectors.
pub fn all_close(a: ArrayView1<f64>, b: ArrayView1<f64>, atol: f64) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(&x, &y)| (x - y).abs() <= atol + RELATIVE_TOLERANCE * y.abs())
}

fn table(model: &str, dataset: &str, rows: &str, what: &str, agree: bool) -> String {
    let rule = "-".repeat(31);
    format!(
        "\n{:>16} | Dset: {dataset:<11}\n{rule}\n       glmfit    |  reference  \n{rule}\n{rows}{rule}\nAre {what} identical with MoE of {MARGIN_OF_ERROR}: {agree}\n",
        format!("Model: {model}"),
    )
}

/// The coefficient comparison table.
pub fn params_table(
    model: &str,
    dataset: &str,
    ours: ArrayView1<f64>,
    reference: ArrayView1<f64>,
    has_intercept: bool,
) -> String {
    let rows: String = ours
        .iter()
        .zip(reference.iter())
        .enumerate()
        .map(|(i, (a, b))| {
            format!(
                "{}: {a:>12.6} | {b:>12.6}\n",
                coefficient_label(i, has_intercept)
            )
        })
        .collect();
    table(model, dataset, &rows, "betas", all_close(ours, reference, MARGIN_OF_ERROR))
}

/// The prediction comparison table, one numbered row per test observation.
pub fn predictions_table(
    model: &str,
    dataset: &str,
    ours: ArrayView1<f64>,
    reference: ArrayView1<f64>,
) -> String {
    let rows: String = ours
        .iter()
        .zip(reference.iter())
        .enumerate()
        .map(|(i, (a, b))| format!("{:>2}: {a:>12.6} | {b:>12.6}\n", i + 1))
        .collect();
    table(
        model,
        dataset,
        &rows,
        "predictions",
        all_close(ours, reference, MARGIN_OF_ERROR),
    )
}
