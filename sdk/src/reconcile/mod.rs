//! Snapshot and delta reconciliation.
//!
//! Every domain object has one authoritative [`Snapshot`]. Recency markers,
//! not arrival order, decide whether a baseline or delta replaces what is
//! held, so a consumer never sees state older than what it already saw.

pub mod marker;
pub mod reconciler;
pub mod snapshot;

pub use marker::RecencyMarker;
pub use reconciler::{
    DeltaOutcome, ReconcileError, ReconcilerConfig, SnapshotReconciler, SnapshotSource,
    DEFAULT_MAX_BUFFERED_DELTAS,
};
pub use snapshot::{merge_fields, Delta, Domain, Snapshot};
