//! SQLite-backed bucket store for response snapshots.
//!
//! This module provides named, versioned buckets of
//! `(request key -> response snapshot)` pairs using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Lazy bucket creation on first write
//! - Atomic batch writes for install-time pre-caching
//! - Whole-bucket deletion for version purges
//! - A FIFO outbox for submissions awaiting background sync
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod buckets;
pub mod connection;
pub mod entries;
pub mod key;
pub mod migrations;
pub mod outbox;

pub use crate::Error;

pub use buckets::BucketNames;
pub use connection::CacheDb;
pub use outbox::OutboxEntry;
