//! Storage-event relay and gzip compression worker.
//!
//! ```text
//! object store ──event──▶ relay (POST /) ──trigger──▶ Job Runner
//!                                                        │
//!        destination bucket ◀──upload── CompressionWorker ◀┘
//! ```
//!
//! The relay and the worker never talk to each other directly; the Job
//! Runner sits between them.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
