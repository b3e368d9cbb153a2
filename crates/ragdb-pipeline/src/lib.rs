//! The retrieval pipeline over a persisted `VectorIndexStore`, and the reset
//! operation that erases a store (or any directory) from disk.

mod pipeline;
mod reset;

pub use pipeline::{IngestReport, PipelineOptions, RetrievalPipeline};
pub use reset::{reset, ResetOutcome};
