pub mod identity;
pub mod reference;
pub mod timestamp;
pub mod types;

pub use identity::movement_id;
pub use reference::{ProcessRef, ReferenceError};
pub use timestamp::{normalize_timestamp, or_sentinel};
pub use types::{LatestMovement, MonitoringStatus, Movement, Supplement, TrackedProcess};
