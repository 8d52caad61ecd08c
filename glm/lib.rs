#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Generalized linear models fit by direct maximization of the likelihood.
//!
//! The design matrix is laid out with predictors as rows and observations as
//! columns (`[p, N]`); the response matrix follows the same orientation
//! (`[q, N]`).

pub mod artifact;
pub mod family;
pub mod linear;
pub mod model;
pub mod optimizer;
pub mod reference;

#[path = "../loaders/mod.rs"]
pub mod loaders;

pub use family::Family;
pub use model::{GlmError, GlmModel};
