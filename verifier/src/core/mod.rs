//! Pure, deterministic logic: data model, scoring, snapshots, deltas.
//!
//! No I/O in this tree; everything is testable in isolation.

pub mod compare;
pub mod judge;
pub mod snapshot;
pub mod types;
