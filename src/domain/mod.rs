//! Domain layer types and invariants.

pub mod elements;
pub mod error;
pub mod pages;
