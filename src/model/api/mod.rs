//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Field names are camelCase.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod cpf;
pub mod pagination;
pub mod session;
pub mod topic;
pub mod vote;
pub mod voter;
