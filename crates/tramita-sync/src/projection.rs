//! Buffered write-back of projection updates, and the offline backfill that
//! recomputes latest-movement summaries from movements already stored.

use tracing::{debug, warn};

use tramita_core::LatestMovement;
use tramita_store::{DocumentStore, ProjectionUpdate, StoreError};

/// Buffers projection updates and flushes them as unordered bulk writes.
///
/// A flush happens when the buffer reaches the configured batch size and
/// once more at end of run. A failed flush drops its batch: the affected
/// processes keep their old `checked_at`, stay due, and are retried next
/// window.
pub struct ProjectionWriter {
    buffer: Vec<ProjectionUpdate>,
    batch_size: usize,
    applied: usize,
    missing: usize,
}

impl ProjectionWriter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(batch_size.max(1)),
            batch_size: batch_size.max(1),
            applied: 0,
            missing: 0,
        }
    }

    /// Updates applied across all flushes so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Updates that addressed a vanished document.
    pub fn missing(&self) -> usize {
        self.missing
    }

    pub async fn push<S: DocumentStore>(
        &mut self,
        store: &S,
        update: ProjectionUpdate,
    ) -> Result<(), StoreError> {
        self.buffer.push(update);
        if self.buffer.len() >= self.batch_size {
            self.flush(store).await?;
        }
        Ok(())
    }

    pub async fn flush<S: DocumentStore>(&mut self, store: &S) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        let size = batch.len();
        let outcome = store.apply_updates(batch).await?;
        self.applied += outcome.applied;
        self.missing += outcome.missing;
        debug!(
            size,
            applied = outcome.applied,
            missing = outcome.missing,
            "projection batch flushed"
        );
        Ok(())
    }
}

/// Outcome of one projection backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Processes whose summary was recomputed.
    pub refreshed: usize,
    /// Processes with no stored movements.
    pub empty: usize,
    /// Processes whose stored movements could not be read.
    pub erred: usize,
}

/// Recompute every monitored process's latest-movement summary from the
/// movements already stored, without touching `checked_at`.
///
/// Maintenance entry point for projections that predate the summary fields
/// or were damaged by a partial run; no API traffic is involved.
pub async fn backfill_latest<S: DocumentStore>(
    store: &S,
    batch_size: usize,
) -> Result<BackfillReport, StoreError> {
    let processes = store.monitored_processes().await?;
    let mut writer = ProjectionWriter::new(batch_size);
    let mut report = BackfillReport::default();

    for process in processes {
        match store.latest_stored_movement(&process.reference).await {
            Ok(Some(movement)) => {
                let update = ProjectionUpdate {
                    process_id: process.id,
                    checked_at: None,
                    latest: Some(LatestMovement {
                        movement_id: movement.id,
                        code: movement.code,
                        name: movement.name,
                        occurred_at: movement.occurred_at,
                        supplements: movement.supplements,
                    }),
                };
                match writer.push(store, update).await {
                    Ok(()) => report.refreshed += 1,
                    Err(error) => {
                        warn!(reference = %process.reference, %error, "projection write failed");
                        report.erred += 1;
                    }
                }
            }
            Ok(None) => report.empty += 1,
            Err(error) => {
                warn!(reference = %process.reference, %error, "could not read stored movements");
                report.erred += 1;
            }
        }
    }

    if let Err(error) = writer.flush(store).await {
        warn!(%error, "final backfill flush failed");
    }
    Ok(report)
}
