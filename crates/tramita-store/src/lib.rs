//! Store boundary: the [`DocumentStore`] trait consumed by the sync engine,
//! and the snapshot-backed in-memory implementation used by the CLI and by
//! tests. Production deployments implement the trait against their document
//! database out-of-tree.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::StoreError;
pub use memory::{MemoryStore, Snapshot};
pub use traits::{DocumentStore, InsertOutcome, ProjectionUpdate, UpdateOutcome};
