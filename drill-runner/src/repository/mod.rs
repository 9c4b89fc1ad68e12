//! Repository layer
//!
//! Repositories abstract the worker's two stores: the durable local inbox
//! of pending tasks and the coordinator that receives status events. They
//! carry no pipeline logic.

mod inbox;
mod reporter;

pub use inbox::Inbox;
pub use reporter::{HttpReporter, Reporter, RetryPolicy};
