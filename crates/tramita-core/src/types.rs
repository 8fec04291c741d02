//! Document shapes shared between the store and the sync engine.
//!
//! Serialized field names follow the source system's document schema
//! (`processo_cnj_id`, `dataHora`, `complementosTabelados`, ...), so a
//! snapshot of the production collections deserializes directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monitoring state of a tracked process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitoringStatus {
    #[serde(rename = "ativo")]
    Active,
    #[serde(rename = "pausado")]
    Paused,
}

/// A process under monitoring.
///
/// Mutated only by the projection writer (sync fields) or by user-facing
/// registration CRUD, which lives outside this workspace. Never deleted by
/// the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedProcess {
    /// Store document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Composite reference in `COURT_DEGREE_NUMBER` form, e.g.
    /// `TJPB_G1_0002936-77.2025.4.05.8202`.
    #[serde(rename = "processo_cnj_id")]
    pub reference: String,
    #[serde(rename = "status_monitoramento")]
    pub status: MonitoringStatus,
    /// Instant of the last API consultation. Absent until first sync.
    /// Never regresses once set.
    #[serde(rename = "data_ultima_consulta_api")]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(rename = "ultima_movimentacao")]
    pub latest: Option<LatestMovement>,
}

/// Denormalized summary of a process's most recent movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestMovement {
    #[serde(rename = "movimentacao_id")]
    pub movement_id: String,
    #[serde(rename = "codigo")]
    pub code: Option<i64>,
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "dataHora")]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(rename = "complementos", default)]
    pub supplements: Vec<Supplement>,
}

/// A single docketed event belonging to one process.
///
/// Created once on first sight, keyed by a content-derived id
/// ([`crate::identity::movement_id`]); immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "processo_id")]
    pub process_ref: String,
    /// Movement code from the national movement taxonomy (TPU).
    #[serde(rename = "codigo")]
    pub code: Option<i64>,
    #[serde(rename = "nome")]
    pub name: Option<String>,
    /// Event instant, `None` when the raw timestamp was unparseable.
    #[serde(rename = "dataHora")]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(rename = "complementosTabelados", default)]
    pub supplements: Vec<Supplement>,
    #[serde(rename = "data_criacao_sistema")]
    pub ingested_at: DateTime<Utc>,
}

/// A tabulated supplement attached to a movement (`complementosTabelados`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Supplement {
    #[serde(rename = "codigo", skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(rename = "valor", skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(rename = "nome", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "descricao", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
