//! Shared helpers for control-value validation

pub mod validation;

pub use validation::ControlValidator;
