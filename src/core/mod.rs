//! Core evaluation algorithms.

mod evaluator;

pub use evaluator::Evaluator;
