//! Service layer
//!
//! Execution machinery shared by every job:
//! - Pipeline executor walking the step-tree
//! - Process supervisor running one command under a deadline
//! - Log streamer batching process output
//! - Per-invocation git credentials

pub mod credentials;
pub mod log_streamer;
pub mod pipeline;
pub mod supervisor;

pub use pipeline::PipelineExecutor;
