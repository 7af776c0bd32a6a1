//! Data-processing services shared by the template API.
//!
//! Everything here is plain synchronous code with no knowledge of HTTP, so it
//! can be reused from workers, CLIs or tests without pulling in the web stack.
//!
//! # Modules
//!
//! - [`services`]: data transformation functions

pub mod services;

pub use services::processing::{fake_processing_task, summarize, ProcessingSummary};
