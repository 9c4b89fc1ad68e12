//! Data Transfer Objects for worker/coordinator communication
//!
//! DTOs are the exact JSON shapes posted to and read from the coordinator.

pub mod event;
pub mod response;
