// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::checkpoint::{CheckpointStore, Watermark};
pub use crate::engine::{CycleReport, Poller, RetryPolicy};
pub use crate::error::{FetchError, PollError};
pub use crate::ingest::types::{Item, SearchGateway};
pub use crate::notify::Forwarder;
