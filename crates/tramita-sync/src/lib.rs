//! Incremental synchronization engine for tracked court processes.
//!
//! One pass: select the due set, group it by court, query the DataJud API
//! per court in bounded batches, persist new movements under content-derived
//! ids, and write the latest-movement projection back onto each tracked
//! process. Partial failures degrade at the smallest granularity that keeps
//! the run moving; only pre-run store connectivity aborts.

pub mod client;
pub mod config;
pub mod engine;
pub mod processor;
pub mod projection;

pub use client::{
    ApiError, CaseRecord, DatajudClient, HttpTransport, RawMovement, SearchResponse,
    SearchTransport,
};
pub use config::SyncConfig;
pub use engine::{RunReport, SyncEngine, SyncError};
pub use processor::{ProcessOutcome, process_movements};
pub use projection::{BackfillReport, ProjectionWriter, backfill_latest};
