//! Core data models for the event-to-job pipeline.
//!
//! `event` holds the inbound storage notification and its typed decode,
//! `job` holds everything that flows between the relay, the Job Runner and
//! the compression worker.

pub mod event;
pub mod job;
