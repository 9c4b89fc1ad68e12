//! Core domain types
//!
//! These types describe the work a coordinator hands to a worker. They are
//! shared between the coordinator client (which moves them over the wire) and
//! the runner (which executes them).

pub mod pipeline;
pub mod progress;
pub mod status;
pub mod task;
