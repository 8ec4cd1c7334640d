//! AWS-oriented adapters and handlers for roster import execution.
//!
//! This crate owns runtime integration details (Lambda handlers, worker
//! dispatch, and the MongoDB directory seam) on top of the contract and
//! batching primitives in `roster_import_core`.

pub mod adapters;
pub mod handlers;
