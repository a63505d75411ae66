//! Request routing for offcache.
//!
//! This crate provides the network fetcher, the per-category caching
//! strategies, the router pipeline, install/activate lifecycle, the control
//! channel for administrative cache operations, and background sync of
//! queued submissions.

pub mod control;
pub mod fetch;
pub mod lifecycle;
pub mod router;
pub mod strategy;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use control::{CacheStatus, ControlHandle, ControlMessage, ReplyPort, spawn_control_loop};
pub use fetch::{FetchClient, FetchConfig, FetchError, Fetcher};
pub use lifecycle::{ActivateReport, InstallReport, Lifecycle, WorkerState};
pub use router::{Routed, Router};
pub use strategy::{FallbackKind, StrategyOutcome};
pub use sync::{CONTACT_FORM_SYNC, SubmitOutcome, SyncReport};
