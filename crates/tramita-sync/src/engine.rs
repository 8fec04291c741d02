//! Batch orchestration for one sync pass.
//!
//! `Selecting → {Grouping → PerCourtBatch}* → Reporting`: select the due
//! set, walk it in bounded chunks, group each chunk by court, drive the API
//! client per court group, hand found cases to the movement processor and
//! everything else to the advance-timestamp-only path, pace between chunks,
//! and report counters at the end of every exit path.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use tramita_core::{ProcessRef, TrackedProcess};
use tramita_store::{DocumentStore, ProjectionUpdate, StoreError};

use crate::client::{CaseRecord, DatajudClient, SearchTransport};
use crate::config::SyncConfig;
use crate::processor::process_movements;
use crate::projection::ProjectionWriter;

/// Fatal, run-aborting failures. Everything else degrades in place.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store connectivity: {0}")]
    Store(#[from] StoreError),
}

/// Counters for one sync pass. In-memory only; reported at run end.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Processes whose API result was consumed (found or not found).
    pub checked: usize,
    /// Processes that gained at least one movement.
    pub updated: usize,
    /// Movements newly persisted.
    pub new_movements: usize,
    /// Processes checked without change (includes not-found and degraded
    /// batches, which are indistinguishable from "no news" by design).
    pub unchanged: usize,
    /// Processes that failed (malformed reference or store error).
    pub erred: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            checked: 0,
            updated: 0,
            new_movements: 0,
            unchanged: 0,
            erred: 0,
            started_at,
            finished_at: None,
        }
    }

    fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.unwrap_or(self.started_at) - self.started_at
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sync pass finished in {}s", self.duration().num_seconds())?;
        writeln!(f, "  processes checked:   {}", self.checked)?;
        writeln!(f, "  processes updated:   {}", self.updated)?;
        writeln!(f, "  new movements:       {}", self.new_movements)?;
        writeln!(f, "  processes unchanged: {}", self.unchanged)?;
        write!(f, "  processes erred:     {}", self.erred)
    }
}

/// One-run synchronization driver over a store and an API transport.
pub struct SyncEngine<S, T> {
    store: S,
    client: DatajudClient<T>,
    config: SyncConfig,
}

impl<S: DocumentStore, T: SearchTransport> SyncEngine<S, T> {
    pub fn new(store: S, transport: T, config: SyncConfig) -> Self {
        let client = DatajudClient::new(transport, &config);
        Self {
            store,
            client,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one sync pass.
    ///
    /// Errors only when the store is unreachable before processing starts;
    /// every later failure degrades and is reflected in the report, which
    /// is logged on every exit path.
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        let mut report = RunReport::new(Utc::now());
        info!("starting movement sync pass");

        if let Err(ping) = self.store.ping().await {
            report.finish();
            error!(error = %ping, "store unreachable, aborting run");
            info!("{report}");
            return Err(SyncError::Store(ping));
        }

        let due = match self
            .store
            .find_due(
                report.started_at,
                self.config.staleness_window,
                self.config.max_per_run,
            )
            .await
        {
            Ok(due) => due,
            Err(select) => {
                report.finish();
                error!(error = %select, "due-set selection failed, aborting run");
                info!("{report}");
                return Err(SyncError::Store(select));
            }
        };

        if due.is_empty() {
            report.finish();
            info!("no process is due for refresh");
            info!("{report}");
            return Ok(report);
        }
        info!(count = due.len(), "due processes selected");

        let mut writer = ProjectionWriter::new(self.config.projection_batch);
        let batch_size = self.config.batch_size.max(1);
        let chunk_count = due.len().div_ceil(batch_size);
        for (index, chunk) in due.chunks(batch_size).enumerate() {
            info!(
                chunk = index + 1,
                of = chunk_count,
                size = chunk.len(),
                "processing batch"
            );
            self.process_chunk(chunk, &mut report, &mut writer).await;
            if index + 1 < chunk_count {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        if let Err(flush) = writer.flush(&self.store).await {
            warn!(error = %flush, "final projection flush failed; affected processes stay due");
        }

        report.finish();
        info!(
            checked = report.checked,
            updated = report.updated,
            new_movements = report.new_movements,
            unchanged = report.unchanged,
            erred = report.erred,
            "sync pass complete"
        );
        info!("{report}");
        Ok(report)
    }

    async fn process_chunk(
        &self,
        chunk: &[TrackedProcess],
        report: &mut RunReport,
        writer: &mut ProjectionWriter,
    ) {
        // Partition by court; every process lands in exactly one group.
        let mut groups: BTreeMap<String, Vec<(&TrackedProcess, ProcessRef)>> = BTreeMap::new();
        for process in chunk {
            match ProcessRef::parse(&process.reference) {
                Ok(parsed) => groups
                    .entry(parsed.court().to_string())
                    .or_default()
                    .push((process, parsed)),
                Err(parse) => {
                    warn!(process_id = %process.id, error = %parse, "malformed process reference");
                    report.erred += 1;
                }
            }
        }

        for (court, members) in groups {
            info!(court = %court, size = members.len(), "querying court group");
            self.process_court_group(&court, &members, report, writer)
                .await;
        }
    }

    async fn process_court_group(
        &self,
        court: &str,
        members: &[(&TrackedProcess, ProcessRef)],
        report: &mut RunReport,
        writer: &mut ProjectionWriter,
    ) {
        let numbers: Vec<String> = members
            .iter()
            .map(|(_, parsed)| parsed.number().to_string())
            .collect();

        let found = match self.client.lookup(court, &numbers).await {
            Ok(found) => found,
            Err(lookup) => {
                // Degrade the whole group: advance timestamps only, so these
                // processes come back next window instead of immediately.
                warn!(court, error = %lookup, "court batch degraded, advancing timestamps only");
                HashMap::new()
            }
        };

        for (process, parsed) in members {
            match found.get(parsed.number()) {
                Some(record) => {
                    self.ingest_found(process, record, report, writer).await;
                }
                None => {
                    // Not found this run. Still advance the clock to avoid
                    // re-querying it every pass.
                    report.checked += 1;
                    report.unchanged += 1;
                    self.push_update(process, None, report.started_at, writer)
                        .await;
                }
            }
        }
    }

    async fn ingest_found(
        &self,
        process: &TrackedProcess,
        record: &CaseRecord,
        report: &mut RunReport,
        writer: &mut ProjectionWriter,
    ) {
        match process_movements(
            &self.store,
            &process.reference,
            &record.movements,
            report.started_at,
        )
        .await
        {
            Ok(outcome) => {
                report.checked += 1;
                if outcome.inserted > 0 {
                    report.updated += 1;
                    report.new_movements += outcome.inserted;
                    info!(
                        reference = %process.reference,
                        new = outcome.inserted,
                        "new movements found"
                    );
                } else {
                    report.unchanged += 1;
                }
                self.push_update(process, outcome.latest, report.started_at, writer)
                    .await;
            }
            Err(ingest) => {
                // Erred processes keep their old checked_at and are retried
                // next window.
                report.erred += 1;
                error!(reference = %process.reference, error = %ingest, "failed to ingest movements");
            }
        }
    }

    async fn push_update(
        &self,
        process: &TrackedProcess,
        latest: Option<tramita_core::LatestMovement>,
        checked_at: DateTime<Utc>,
        writer: &mut ProjectionWriter,
    ) {
        let update = ProjectionUpdate {
            process_id: process.id.clone(),
            checked_at: Some(checked_at),
            latest,
        };
        if let Err(push) = writer.push(&self.store, update).await {
            warn!(
                reference = %process.reference,
                error = %push,
                "projection write failed; process stays due"
            );
        }
    }
}
