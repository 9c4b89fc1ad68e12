//! Drill Core
//!
//! Core types shared by the Drill worker and its coordinator client.
//!
//! This crate contains:
//! - Domain types: tasks, pipeline step-trees, statuses and progress markers
//! - DTOs: the event envelope and response shapes exchanged with the coordinator

pub mod domain;
pub mod dto;
