//! Per-process movement ingestion.
//!
//! Given the raw movement list fetched for one process, derive each
//! movement's content id, insert the ones not yet stored in a single
//! unordered bulk write, and compute the latest-movement summary over the
//! whole fetched list (new and already-known alike).

use chrono::{DateTime, Utc};
use tracing::debug;

use tramita_core::{LatestMovement, Movement, Supplement, movement_id, normalize_timestamp, or_sentinel};
use tramita_store::{DocumentStore, StoreError};

use crate::client::RawMovement;

/// What one process's ingestion produced.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    /// Movements newly persisted this run.
    pub inserted: usize,
    /// Movements the bulk write skipped because their id already existed
    /// (e.g. a concurrent run won the race).
    pub duplicates: usize,
    /// The most recent movement in the fetched list, `None` when the list
    /// is empty.
    pub latest: Option<LatestMovement>,
}

struct Candidate {
    id: String,
    code: Option<i64>,
    name: Option<String>,
    occurred_at: Option<DateTime<Utc>>,
    supplements: Vec<Supplement>,
}

impl Candidate {
    fn key(&self) -> (DateTime<Utc>, Option<i64>) {
        (or_sentinel(self.occurred_at), self.code)
    }
}

/// Ingest one process's fetched movements and summarize the latest one.
///
/// The stored-id set is fetched once per process, not per movement. If that
/// lookup or the bulk insert fails, the error propagates and the caller
/// marks the process erred for this run; nothing partial is written beyond
/// what the unordered bulk already applied.
///
/// Latest-movement ordering: event timestamp descending, unparseable
/// timestamps last; ties broken by highest movement code, then earliest
/// batch position.
pub async fn process_movements<S: DocumentStore>(
    store: &S,
    process_ref: &str,
    raw_movements: &[RawMovement],
    ingested_at: DateTime<Utc>,
) -> Result<ProcessOutcome, StoreError> {
    if raw_movements.is_empty() {
        return Ok(ProcessOutcome::default());
    }

    let existing = store.movement_ids(process_ref).await?;

    let mut fresh = Vec::new();
    let mut best: Option<Candidate> = None;
    for (position, raw) in raw_movements.iter().enumerate() {
        let id = movement_id(
            process_ref,
            raw.code,
            raw.raw_timestamp.as_deref(),
            &raw.supplements,
            position,
        );
        let occurred_at = raw.raw_timestamp.as_deref().and_then(normalize_timestamp);

        let candidate = Candidate {
            id: id.clone(),
            code: raw.code,
            name: raw.name.clone(),
            occurred_at,
            supplements: raw.supplements.clone(),
        };
        // Strictly-greater keeps the earliest position on full ties.
        if best.as_ref().is_none_or(|current| candidate.key() > current.key()) {
            best = Some(candidate);
        }

        if !existing.contains(&id) {
            fresh.push(Movement {
                id,
                process_ref: process_ref.to_string(),
                code: raw.code,
                name: raw.name.clone(),
                occurred_at,
                supplements: raw.supplements.clone(),
                ingested_at,
            });
        }
    }

    let mut outcome = ProcessOutcome::default();
    if !fresh.is_empty() {
        let insert = store.insert_movements(fresh).await?;
        outcome.inserted = insert.inserted;
        outcome.duplicates = insert.duplicates;
        debug!(
            process_ref,
            inserted = insert.inserted,
            duplicates = insert.duplicates,
            "movement batch persisted"
        );
    }
    outcome.latest = best.map(|candidate| LatestMovement {
        movement_id: candidate.id,
        code: candidate.code,
        name: candidate.name,
        occurred_at: candidate.occurred_at,
        supplements: candidate.supplements,
    });
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tramita_store::MemoryStore;

    fn raw(code: i64, timestamp: &str) -> RawMovement {
        RawMovement {
            code: Some(code),
            name: Some(format!("movimento {code}")),
            raw_timestamp: Some(timestamp.to_string()),
            supplements: Vec::new(),
        }
    }

    fn ingested() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 25, 12, 0, 0).unwrap()
    }

    const REF: &str = "TRF5_G1_0002936-77.2025.4.05.8202";

    #[tokio::test]
    async fn inserts_new_movements_and_summarizes_latest() {
        let store = MemoryStore::new();
        let movements = vec![
            raw(11, "2025-07-24T09:00:00Z"),
            raw(26, "2025-07-25T10:00:00Z"),
        ];

        let outcome = process_movements(&store, REF, &movements, ingested())
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 2);
        let latest = outcome.latest.unwrap();
        assert_eq!(latest.code, Some(26));
        assert_eq!(
            latest.occurred_at,
            Some(Utc.with_ymd_and_hms(2025, 7, 25, 10, 0, 0).unwrap())
        );
        assert_eq!(store.movement_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn reprocessing_is_idempotent() {
        let store = MemoryStore::new();
        let movements = vec![
            raw(11, "2025-07-24T09:00:00Z"),
            raw(26, "2025-07-25T10:00:00Z"),
        ];

        let first = process_movements(&store, REF, &movements, ingested())
            .await
            .unwrap();
        let second = process_movements(&store, REF, &movements, ingested())
            .await
            .unwrap();

        assert_eq!(first.inserted, 2);
        assert_eq!(second.inserted, 0);
        assert_eq!(store.movement_count().unwrap(), 2);
        // The summary is recomputed either way.
        assert_eq!(second.latest.unwrap().code, Some(26));
    }

    #[tokio::test]
    async fn empty_list_yields_no_summary() {
        let store = MemoryStore::new();
        let outcome = process_movements(&store, REF, &[], ingested()).await.unwrap();
        assert_eq!(outcome.inserted, 0);
        assert!(outcome.latest.is_none());
        assert_eq!(store.movement_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn timestamp_tie_breaks_by_highest_code() {
        let store = MemoryStore::new();
        let movements = vec![
            raw(11, "2025-07-25T10:00:00Z"),
            raw(26, "2025-07-25T10:00:00Z"),
        ];
        let outcome = process_movements(&store, REF, &movements, ingested())
            .await
            .unwrap();
        assert_eq!(outcome.latest.unwrap().code, Some(26));
    }

    #[tokio::test]
    async fn full_tie_keeps_earliest_position() {
        let store = MemoryStore::new();
        let mut first = raw(26, "2025-07-25T10:00:00Z");
        first.name = Some("primeiro".to_string());
        let mut second = raw(26, "2025-07-25T10:00:00Z");
        second.name = Some("segundo".to_string());

        let outcome = process_movements(&store, REF, &[first, second], ingested())
            .await
            .unwrap();
        assert_eq!(outcome.latest.unwrap().name.as_deref(), Some("primeiro"));
    }

    #[tokio::test]
    async fn unparseable_timestamp_sorts_oldest() {
        let store = MemoryStore::new();
        let mut garbled = raw(99, "not-a-date");
        garbled.name = Some("ilegível".to_string());
        let movements = vec![garbled, raw(11, "2020-01-01T00:00:00Z")];

        let outcome = process_movements(&store, REF, &movements, ingested())
            .await
            .unwrap();

        // Both stored, the unparseable one with a null instant.
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.latest.unwrap().code, Some(11));
        let stored = store.movements_for(REF).unwrap();
        assert!(stored.iter().any(|m| m.occurred_at.is_none()));
    }

    #[tokio::test]
    async fn lookup_failure_skips_insertion() {
        let store = MemoryStore::new();
        store.set_fail_lookups(true);
        let movements = vec![raw(11, "2025-07-24T09:00:00Z")];

        let result = process_movements(&store, REF, &movements, ingested()).await;
        assert!(result.is_err());
        assert_eq!(store.movement_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn position_distinguishes_repeated_movements() {
        let store = MemoryStore::new();
        // Two genuinely identical docket entries at different positions.
        let movements = vec![
            raw(123, "2025-07-25T10:00:00Z"),
            raw(123, "2025-07-25T10:00:00Z"),
        ];
        let outcome = process_movements(&store, REF, &movements, ingested())
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 2);
    }
}
