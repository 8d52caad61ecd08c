#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use glmfit::Family;
use glmfit::artifact::FittedModel;
use glmfit::loaders::registry::{self, DataConfig};
use glmfit::loaders::tabular::load_table;
use glmfit::model::{DEFAULT_INITIAL_VALUE, GlmModel};
use glmfit::optimizer::BfgsMinimizer;
use glmfit::reference::{IrlsOptions, fit_irls};
use std::path::PathBuf;
use std::process;
use thiserror::Error;

mod report;

/// The largest accepted `--random-state`.
const MAX_RANDOM_STATE: u64 = 1000;

#[derive(Clone, Copy, ValueEnum)]
pub enum ModelCli {
    Normal,
    Bernoulli,
    Poisson,
}

impl From<ModelCli> for Family {
    fn from(model: ModelCli) -> Self {
        match model {
            ModelCli::Normal => Family::Gaussian,
            ModelCli::Bernoulli => Family::Bernoulli,
            ModelCli::Poisson => Family::Poisson,
        }
    }
}

impl ModelCli {
    fn name(self) -> &'static str {
        match self {
            ModelCli::Normal => "normal",
            ModelCli::Bernoulli => "bernoulli",
            ModelCli::Poisson => "poisson",
        }
    }
}

#[derive(Error, Debug)]
enum ArgsError {
    #[error("--test-size should be between 0 and 1. Got: {0}")]
    TestSize(f64),
    #[error("--random-state should be between 0 and 1000. Got: {0}")]
    RandomState(u64),
    #[error("Invalid predictors are given. Max number of predictors: {0}")]
    Predictors(usize),
}

#[derive(Args)]
pub struct CompareArgs {
    /// Registered dataset to fit: duncan, spector or warpbreaks
    #[arg(short = 'd', long = "dset", default_value = "duncan")]
    pub dataset: String,

    /// The GLM family to fit
    #[arg(short = 'm', long, value_enum, default_value_t = ModelCli::Normal)]
    pub model: ModelCli,

    /// Between 1 and 3 predictor variables, e.g. `-p x1 x3`
    #[arg(short = 'p', long, num_args = 1.., default_values_t = vec!["x1".to_string()])]
    pub predictors: Vec<String>,

    /// Fraction of the dataset between 0 and 1 held out for testing
    #[arg(long = "test-size", default_value = "0.3")]
    pub test_size: f64,

    /// Random state between 0 and 1000 for the train-test split
    #[arg(long = "random-state", default_value = "0")]
    pub random_state: u64,

    /// Prepend a constant row so the model estimates an intercept
    #[arg(long = "add-intercept")]
    pub add_intercept: bool,

    /// Print the summaries of both fits
    #[arg(long = "print-summary")]
    pub print_summary: bool,

    /// Folder the registered datasets are downloaded into and cached in
    #[arg(long = "data-dir", default_value = "datasets")]
    pub data_dir: PathBuf,

    /// Starting value for every coefficient
    #[arg(long, default_value_t = DEFAULT_INITIAL_VALUE)]
    pub initial_value: f64,

    /// Gradient-norm tolerance of the BFGS optimizer
    #[arg(long, default_value = "1e-6")]
    pub tolerance: f64,

    /// Maximum number of BFGS iterations
    #[arg(long, default_value = "500")]
    pub max_iterations: usize,

    /// Write the fitted model to this TOML file
    #[arg(long)]
    pub save_model: Option<PathBuf>,
}

#[derive(Args)]
pub struct PredictArgs {
    /// Path to a CSV or TSV file holding the predictor columns
    pub data: PathBuf,

    /// Path to a fitted model file (.toml)
    #[arg(long)]
    pub model: PathBuf,

    /// Predictor column names, in the order the model was fit on
    #[arg(long, num_args = 1.., required = true)]
    pub columns: Vec<String>,
}

#[derive(Parser)]
#[command(
    name = "glmfit",
    about = "Fit generalized linear models by maximum likelihood",
    long_about = "Fits Gaussian, Bernoulli and Poisson GLMs by direct numerical maximization \
                  of the likelihood and compares the estimates with a reference IRLS fit."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a model on a registered dataset and compare it with the reference fit
    Compare(CompareArgs),
    /// Predict mean responses with a saved model
    Predict(PredictArgs),
}

/// Turns `x1 x3` style names into zero-based column indices.
///
/// Names that are not an `x` followed by a single digit are ignored; what remains
/// must be non-empty and within `available` columns.
fn parse_predictors(names: &[String], available: usize) -> Result<Vec<usize>, ArgsError> {
    let mut indices = Vec::with_capacity(names.len());
    for name in names {
        let mut chars = name.chars();
        let digit = match (chars.next(), chars.next(), chars.next()) {
            (Some(_), Some(d), None) => d.to_digit(10),
            _ => None,
        };
        if let Some(d) = digit {
            match (d as usize).checked_sub(1) {
                Some(index) if index < available => indices.push(index),
                _ => return Err(ArgsError::Predictors(available)),
            }
        }
    }
    if indices.is_empty() {
        return Err(ArgsError::Predictors(available));
    }
    Ok(indices)
}

fn compare(args: CompareArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&args.test_size) {
        return Err(ArgsError::TestSize(args.test_size).into());
    }
    if args.random_state > MAX_RANDOM_STATE {
        return Err(ArgsError::RandomState(args.random_state).into());
    }

    let spec = registry::lookup(&args.dataset)?;
    let predictors = parse_predictors(&args.predictors, spec.x_names.len())?;

    let config = DataConfig::new(&args.data_dir);
    let mut dataset = config.load(spec, &predictors)?;
    if args.add_intercept {
        dataset = dataset.with_constant();
    }
    println!("Predictors: {}", dataset.x_names.join(", "));

    let split = dataset.test_train_split(args.test_size, args.random_state)?;
    let family = Family::from(args.model);

    let mut glm = GlmModel::new(
        family,
        split.x_train.view(),
        split.y_train.view(),
        args.add_intercept,
    )?
    .with_minimizer(BfgsMinimizer::new(args.tolerance, args.max_iterations));
    let params = glm.fit(args.initial_value)?;
    if args.print_summary {
        println!("{}", glm.summary()?);
    }

    let reference = fit_irls(
        family,
        split.x_train.view(),
        split.y_train.view(),
        &IrlsOptions::default(),
    )?;
    if args.print_summary {
        println!(
            "Reference IRLS fit converged in {} iterations, deviance {:.6}",
            reference.iterations, reference.deviance
        );
    }

    let glm_pred = glm.predict(split.x_test.view())?;
    let reference_pred = FittedModel {
        family,
        has_intercept: args.add_intercept,
        params: reference.params.to_vec(),
    }
    .predict(split.x_test.view())?;

    let model_name = args.model.name();
    println!(
        "{}",
        report::params_table(
            model_name,
            &args.dataset,
            params.view(),
            reference.params.view(),
            args.add_intercept,
        )
    );
    println!(
        "{}",
        report::predictions_table(
            model_name,
            &args.dataset,
            glm_pred.view(),
            reference_pred.view(),
        )
    );

    if let Some(path) = &args.save_model {
        FittedModel::from_model(&glm)?.save(path)?;
        println!("Model saved to: {}", path.display());
    }
    Ok(())
}

fn predict(args: PredictArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading model from: {}", args.model.display());
    let model = FittedModel::load(&args.model)?;

    let mut data = load_table(&args.data, &args.columns, &[])?;
    if model.has_intercept {
        data = data.with_constant();
    }

    let predictions = model.predict(data.x.view())?;
    println!("{}", model.summary());
    for (i, mu) in predictions.iter().enumerate() {
        println!("{:>4}: {mu:>12.6}", i + 1);
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Compare(args)) => compare(args),
        Some(Commands::Predict(args)) => predict(args),
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn predictor_names_map_to_indices() {
        assert_eq!(parse_predictors(&names(&["x1", "x3"]), 3).unwrap(), vec![0, 2]);
    }

    #[test]
    fn malformed_predictor_names_are_ignored() {
        assert_eq!(
            parse_predictors(&names(&["x2", "x10", "foo"]), 2).unwrap(),
            vec![1]
        );
    }

    #[test]
    fn empty_or_out_of_range_selection_is_an_error() {
        assert!(parse_predictors(&names(&["x4"]), 3).is_err());
        assert!(parse_predictors(&names(&["x0"]), 3).is_err());
        assert!(parse_predictors(&names(&["abc"]), 3).is_err());
    }
}
