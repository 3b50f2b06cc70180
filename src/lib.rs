//! Fuzzy entity matching and interactive song linking - shared modules for all binaries.

pub mod date;
pub mod linker;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod prompt;
pub mod scoring;
pub mod store;
