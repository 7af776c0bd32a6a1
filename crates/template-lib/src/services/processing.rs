//! Example data transformations.

use serde::Serialize;
use tracing::debug;

/// Outcome of [`summarize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingSummary {
    /// Always true once the input went through the pipeline.
    pub processed: bool,
    /// Number of whitespace-separated items in the input.
    pub items: usize,
    /// Transformed data.
    pub result: String,
}

/// Transform the input the way a real processing step would.
///
/// Pure: the same input always yields the same output.
pub fn fake_processing_task(data: &str) -> String {
    debug!(len = data.len(), "Starting fake processing task");
    let result = data.to_uppercase();
    debug!("Fake processing task completed");
    result
}

/// Process the input and report how many items it held.
pub fn summarize(data: &str) -> ProcessingSummary {
    ProcessingSummary {
        processed: true,
        items: data.split_whitespace().count(),
        result: fake_processing_task(data),
    }
}
