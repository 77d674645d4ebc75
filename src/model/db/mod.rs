//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs are stored under `_id`.
//! - Datetimes are serialised in MongoDB's own format.
//!
//! The in-memory store keeps exactly the same types.

pub mod session;
pub mod topic;
pub mod vote;
pub mod voter;
