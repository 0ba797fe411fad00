#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]
//! LeNet-style classifier regularized with binomial direct dropout.
//!
//! At training time the dropout layers apply inverted Bernoulli dropout. At
//! evaluation time every activation is scaled by `1 - P(X = n * p)` where
//! `X ~ Binomial(n, p)` and `n` is the number of neurons in the layer.
extern crate ndarray;
extern crate ndarray_rand;
extern crate ndarray_stats;
extern crate rand;
extern crate statrs;

pub mod binomial;
pub mod dnn;
pub mod graph;
pub mod losses;
pub mod model;
pub mod summary;
pub mod tensorshape;
pub mod util;

#[cfg(test)]
mod test_util;

pub type NetFloat = f64;

pub use model::{get_model, inference, ModeFeed, ModeHandle, Model, ModelConfig};
