//! The query/update interface the sync engine requires of a document store.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tramita_core::{LatestMovement, Movement, TrackedProcess};

use crate::StoreError;

/// One buffered write-back onto a tracked-process record.
///
/// `checked_at` advances the last-consultation instant when present; the
/// summary fields are rewritten only when `latest` is present. Projection
/// backfill sends `checked_at: None` so it never disturbs the staleness
/// clock.
#[derive(Debug, Clone)]
pub struct ProjectionUpdate {
    /// Store document id of the tracked process.
    pub process_id: String,
    pub checked_at: Option<DateTime<Utc>>,
    pub latest: Option<LatestMovement>,
}

/// Outcome of an unordered bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    /// Documents whose id already existed; tolerated, never an error.
    pub duplicates: usize,
}

/// Outcome of an unordered bulk update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub applied: usize,
    /// Updates addressing a document id that no longer exists.
    pub missing: usize,
}

/// Document-store operations consumed by the sync engine.
///
/// Every method maps to one store round-trip. Bulk writes are unordered:
/// per-document failures (duplicate ids, vanished documents) are reported
/// in the outcome counts and never abort the remainder of the batch.
#[allow(async_fn_in_trait)]
pub trait DocumentStore: Send + Sync {
    /// Cheap connectivity check, run once before a sync pass. An error here
    /// is fatal for the run.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Active processes whose `checked_at` is absent or older than
    /// `now - window`, ordered oldest-checked-first (absent first),
    /// truncated to `limit`. Read-only.
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<TrackedProcess>, StoreError>;

    /// Distinct ids of the movements already stored for one process,
    /// fetched without loading full documents.
    async fn movement_ids(&self, process_ref: &str) -> Result<HashSet<String>, StoreError>;

    /// Unordered bulk insert of new movements.
    async fn insert_movements(&self, movements: Vec<Movement>) -> Result<InsertOutcome, StoreError>;

    /// Unordered bulk write-back of projection updates.
    ///
    /// Implementations must keep `checked_at` monotonic: an update carrying
    /// an instant older than the stored one leaves the stored value alone.
    async fn apply_updates(
        &self,
        updates: Vec<ProjectionUpdate>,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Every monitored process, regardless of staleness. Used by projection
    /// backfill.
    async fn monitored_processes(&self) -> Result<Vec<TrackedProcess>, StoreError>;

    /// The stored movement with the greatest event timestamp for one
    /// process, ties broken by highest movement code. Used by projection
    /// backfill.
    async fn latest_stored_movement(
        &self,
        process_ref: &str,
    ) -> Result<Option<Movement>, StoreError>;
}
