//! Snapshot-backed in-memory document store.
//!
//! Backs the CLI (load a JSON snapshot, sync, write it back) and the test
//! suite. Collections mirror the production document database:
//! `processos_monitorados` keyed by document id, `movimentacoes` keyed by
//! the derived movement id. Fault-injection switches let tests drive the
//! engine's error paths.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use tramita_core::{Movement, MonitoringStatus, TrackedProcess, or_sentinel};

use crate::StoreError;
use crate::traits::{DocumentStore, InsertOutcome, ProjectionUpdate, UpdateOutcome};

/// Serialized form of the store's collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "processos_monitorados", default)]
    pub processes: Vec<TrackedProcess>,
    #[serde(rename = "movimentacoes", default)]
    pub movements: Vec<Movement>,
}

#[derive(Default)]
struct Inner {
    processes: BTreeMap<String, TrackedProcess>,
    movements: BTreeMap<String, Movement>,
    fail_ping: bool,
    fail_lookups: bool,
}

/// In-memory [`DocumentStore`] with JSON snapshot load/save.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut inner = Inner::default();
        for process in snapshot.processes {
            inner.processes.insert(process.id.clone(), process);
        }
        for movement in snapshot.movements {
            inner.movements.insert(movement.id.clone(), movement);
        }
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Read a snapshot file written by [`save_snapshot`](Self::save_snapshot).
    pub fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.snapshot()?;
        let raw = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let inner = self.lock()?;
        Ok(Snapshot {
            processes: inner.processes.values().cloned().collect(),
            movements: inner.movements.values().cloned().collect(),
        })
    }

    /// Seed one tracked process.
    pub fn insert_process(&self, process: TrackedProcess) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.processes.insert(process.id.clone(), process);
        Ok(())
    }

    /// Current state of one tracked process.
    pub fn process(&self, id: &str) -> Result<Option<TrackedProcess>, StoreError> {
        Ok(self.lock()?.processes.get(id).cloned())
    }

    /// All stored movements for one process, in id order.
    pub fn movements_for(&self, process_ref: &str) -> Result<Vec<Movement>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .movements
            .values()
            .filter(|movement| movement.process_ref == process_ref)
            .cloned()
            .collect())
    }

    pub fn movement_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.movements.len())
    }

    /// Make [`DocumentStore::ping`] fail. Exercises the fatal-connectivity
    /// path in tests.
    pub fn set_fail_ping(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_ping = fail;
        }
    }

    /// Make [`DocumentStore::movement_ids`] fail. Exercises the per-process
    /// erred path in tests.
    pub fn set_fail_lookups(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_lookups = fail;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let inner = self.lock()?;
        if inner.fail_ping {
            return Err(StoreError::Unavailable("injected ping failure".to_string()));
        }
        Ok(())
    }

    async fn find_due(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<TrackedProcess>, StoreError> {
        let cutoff = now - window;
        let inner = self.lock()?;
        let mut due: Vec<TrackedProcess> = inner
            .processes
            .values()
            .filter(|process| process.status == MonitoringStatus::Active)
            .filter(|process| process.checked_at.is_none_or(|checked| checked < cutoff))
            .cloned()
            .collect();
        // Oldest-checked-first, never-checked before everything.
        due.sort_by(|a, b| {
            or_sentinel(a.checked_at)
                .cmp(&or_sentinel(b.checked_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn movement_ids(&self, process_ref: &str) -> Result<HashSet<String>, StoreError> {
        let inner = self.lock()?;
        if inner.fail_lookups {
            return Err(StoreError::Unavailable(
                "injected lookup failure".to_string(),
            ));
        }
        Ok(inner
            .movements
            .values()
            .filter(|movement| movement.process_ref == process_ref)
            .map(|movement| movement.id.clone())
            .collect())
    }

    async fn insert_movements(&self, movements: Vec<Movement>) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.lock()?;
        let mut outcome = InsertOutcome::default();
        for movement in movements {
            if inner.movements.contains_key(&movement.id) {
                outcome.duplicates += 1;
            } else {
                inner.movements.insert(movement.id.clone(), movement);
                outcome.inserted += 1;
            }
        }
        Ok(outcome)
    }

    async fn apply_updates(
        &self,
        updates: Vec<ProjectionUpdate>,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut inner = self.lock()?;
        let mut outcome = UpdateOutcome::default();
        for update in updates {
            let Some(process) = inner.processes.get_mut(&update.process_id) else {
                warn!(process_id = %update.process_id, "projection update for unknown process");
                outcome.missing += 1;
                continue;
            };
            if let Some(checked_at) = update.checked_at {
                // checked_at never regresses.
                if process.checked_at.is_none_or(|current| current <= checked_at) {
                    process.checked_at = Some(checked_at);
                }
            }
            if update.latest.is_some() {
                process.latest = update.latest;
            }
            outcome.applied += 1;
        }
        Ok(outcome)
    }

    async fn monitored_processes(&self) -> Result<Vec<TrackedProcess>, StoreError> {
        Ok(self.lock()?.processes.values().cloned().collect())
    }

    async fn latest_stored_movement(
        &self,
        process_ref: &str,
    ) -> Result<Option<Movement>, StoreError> {
        let inner = self.lock()?;
        let mut best: Option<&Movement> = None;
        for movement in inner
            .movements
            .values()
            .filter(|movement| movement.process_ref == process_ref)
        {
            let replace = match best {
                None => true,
                Some(current) => {
                    let lhs = (or_sentinel(movement.occurred_at), movement.code);
                    let rhs = (or_sentinel(current.occurred_at), current.code);
                    lhs > rhs
                }
            };
            if replace {
                best = Some(movement);
            }
        }
        Ok(best.cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn process(id: &str, reference: &str, checked_at: Option<DateTime<Utc>>) -> TrackedProcess {
        TrackedProcess {
            id: id.to_string(),
            reference: reference.to_string(),
            status: MonitoringStatus::Active,
            checked_at,
            latest: None,
        }
    }

    fn movement(id: &str, process_ref: &str, occurred_at: Option<DateTime<Utc>>) -> Movement {
        Movement {
            id: id.to_string(),
            process_ref: process_ref.to_string(),
            code: Some(26),
            name: Some("Distribuição".to_string()),
            occurred_at,
            supplements: Vec::new(),
            ingested_at: Utc.with_ymd_and_hms(2025, 7, 25, 12, 0, 0).unwrap(),
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 25, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn find_due_orders_never_checked_first() {
        let store = MemoryStore::new();
        store
            .insert_process(process("p1", "TJPB_G1_1", Some(at(1))))
            .unwrap();
        store.insert_process(process("p2", "TJPB_G1_2", None)).unwrap();
        store
            .insert_process(process("p3", "TJPB_G1_3", Some(at(0))))
            .unwrap();

        let due = store
            .find_due(at(12), Duration::hours(1), 10)
            .await
            .unwrap();
        let ids: Vec<&str> = due.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3", "p1"]);
    }

    #[tokio::test]
    async fn find_due_respects_window_and_limit() {
        let store = MemoryStore::new();
        store
            .insert_process(process("fresh", "TJPB_G1_1", Some(at(11))))
            .unwrap();
        store
            .insert_process(process("stale-a", "TJPB_G1_2", Some(at(2))))
            .unwrap();
        store
            .insert_process(process("stale-b", "TJPB_G1_3", Some(at(3))))
            .unwrap();

        let due = store
            .find_due(at(12), Duration::hours(1), 1)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "stale-a");
    }

    #[tokio::test]
    async fn find_due_skips_paused() {
        let store = MemoryStore::new();
        let mut paused = process("paused", "TJPB_G1_1", None);
        paused.status = MonitoringStatus::Paused;
        store.insert_process(paused).unwrap();

        let due = store
            .find_due(at(12), Duration::hours(1), 10)
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn checked_at_never_regresses() {
        let store = MemoryStore::new();
        store
            .insert_process(process("p1", "TJPB_G1_1", Some(at(10))))
            .unwrap();

        let stale_write = ProjectionUpdate {
            process_id: "p1".to_string(),
            checked_at: Some(at(5)),
            latest: None,
        };
        store.apply_updates(vec![stale_write]).await.unwrap();
        assert_eq!(store.process("p1").unwrap().unwrap().checked_at, Some(at(10)));

        let fresh_write = ProjectionUpdate {
            process_id: "p1".to_string(),
            checked_at: Some(at(11)),
            latest: None,
        };
        store.apply_updates(vec![fresh_write]).await.unwrap();
        assert_eq!(store.process("p1").unwrap().unwrap().checked_at, Some(at(11)));
    }

    #[tokio::test]
    async fn duplicate_inserts_are_tolerated() {
        let store = MemoryStore::new();
        let first = store
            .insert_movements(vec![movement("m1", "TJPB_G1_1", Some(at(9)))])
            .await
            .unwrap();
        assert_eq!(first, InsertOutcome { inserted: 1, duplicates: 0 });

        let second = store
            .insert_movements(vec![
                movement("m1", "TJPB_G1_1", Some(at(9))),
                movement("m2", "TJPB_G1_1", Some(at(10))),
            ])
            .await
            .unwrap();
        assert_eq!(second, InsertOutcome { inserted: 1, duplicates: 1 });
        assert_eq!(store.movement_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn update_for_unknown_process_is_counted_not_fatal() {
        let store = MemoryStore::new();
        let outcome = store
            .apply_updates(vec![ProjectionUpdate {
                process_id: "ghost".to_string(),
                checked_at: Some(at(1)),
                latest: None,
            }])
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { applied: 0, missing: 1 });
    }

    #[tokio::test]
    async fn latest_stored_movement_prefers_timestamp_then_code() {
        let store = MemoryStore::new();
        let mut low_code = movement("m1", "TJPB_G1_1", Some(at(9)));
        low_code.code = Some(11);
        let mut high_code = movement("m2", "TJPB_G1_1", Some(at(9)));
        high_code.code = Some(26);
        let older = movement("m3", "TJPB_G1_1", Some(at(8)));
        let unparseable = movement("m4", "TJPB_G1_1", None);
        store
            .insert_movements(vec![low_code, high_code, older, unparseable])
            .await
            .unwrap();

        let latest = store.latest_stored_movement("TJPB_G1_1").await.unwrap().unwrap();
        assert_eq!(latest.id, "m2");
    }

    #[tokio::test]
    async fn snapshot_roundtrip() {
        let store = MemoryStore::new();
        store
            .insert_process(process("p1", "TJPB_G1_1", Some(at(7))))
            .unwrap();
        store
            .insert_movements(vec![movement("m1", "TJPB_G1_1", Some(at(6)))])
            .await
            .unwrap();

        let snapshot = store.snapshot().unwrap();
        let raw = serde_json::to_string(&snapshot).unwrap();
        let restored = MemoryStore::from_snapshot(serde_json::from_str(&raw).unwrap());
        assert_eq!(restored.movement_count().unwrap(), 1);
        assert_eq!(
            restored.process("p1").unwrap().unwrap().checked_at,
            Some(at(7))
        );
    }

    #[tokio::test]
    async fn injected_faults_surface_as_store_errors() {
        let store = MemoryStore::new();
        store.set_fail_ping(true);
        assert!(store.ping().await.is_err());
        store.set_fail_ping(false);
        assert!(store.ping().await.is_ok());

        store.set_fail_lookups(true);
        assert!(store.movement_ids("TJPB_G1_1").await.is_err());
    }
}
