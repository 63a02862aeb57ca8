//! Business logic behind the relay and the worker.

pub mod compression_service;
pub mod local_store;
pub mod object_store;
pub mod s3_store;
pub mod trigger_service;
