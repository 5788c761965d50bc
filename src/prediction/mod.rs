pub mod evaluator;
pub mod market;
pub mod models;
