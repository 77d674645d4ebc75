//! Types shared between the API, the database and the voting core.

mod vote_option;

pub use vote_option::{UnknownVoteOption, VoteOption};

/// Our topic IDs are integers.
pub type TopicId = u32;
/// Our session IDs are integers.
pub type SessionId = u32;
/// Our voter IDs are integers.
pub type VoterId = u32;
/// Our vote IDs are integers.
pub type VoteId = u32;
