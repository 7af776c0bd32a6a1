//! Library services exposed to the API layer.

pub mod processing;
