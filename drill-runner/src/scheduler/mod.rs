//! Scheduler layer
//!
//! Moves tasks from the coordinator to the workers:
//! - Intake polls the coordinator and fills the inbox
//! - The dispatcher drains the inbox into the hand-off channel
//! - The worker pool takes tasks off the channel and runs them

pub mod dispatcher;
pub mod intake;
pub mod pool;

pub use dispatcher::Dispatcher;
pub use intake::TaskIntake;
