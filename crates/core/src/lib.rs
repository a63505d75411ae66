//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Versioned cache buckets with SQLite backend
//! - Request classification and synthesized fallback content
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod fallback;
pub mod request;

pub use cache::{BucketNames, CacheDb, OutboxEntry};
pub use classify::{Category, Classifier};
pub use config::AppConfig;
pub use error::Error;
pub use request::{Destination, RequestRecord, ResponseRecord};
