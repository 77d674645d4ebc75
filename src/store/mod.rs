//! Persistence for topics, sessions, voters and votes.
//!
//! The voting core only ever talks to the [`Store`] trait. Every operation
//! that must be atomic (opening a session, registering a voter, recording a
//! vote) is a single trait method, so each backend can implement it with
//! whatever primitive it has: a write lock, a unique index, or a
//! compare-and-swap.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    api::pagination::{Page, Paginated},
    common::{SessionId, TopicId, VoteId, VoterId},
    db::{
        session::{NewSession, Session},
        topic::{NewTopic, Topic},
        vote::{NewVote, Vote},
        voter::{NewVoter, Voter},
    },
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Raw vote counts for one topic, read from a single consistent snapshot.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TallyCounts {
    /// Number of sessions ever opened on the topic.
    pub sessions: u64,
    pub yes: u64,
    pub no: u64,
}

#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Insert a new topic, allocating its ID.
    async fn insert_topic(&self, topic: NewTopic) -> Result<Topic>;

    async fn topic(&self, id: TopicId) -> Result<Option<Topic>>;

    /// Topics in ID order.
    async fn topics(&self, page: Page) -> Result<Paginated<Topic>>;

    /// Insert `session` unless its topic already has a session that is still
    /// open at `now`. The check and the insert are one atomic step.
    ///
    /// Fails with `TopicNotFound` or `SessionAlreadyOpen`.
    async fn open_session(&self, session: NewSession, now: DateTime<Utc>) -> Result<Session>;

    async fn session(&self, id: SessionId) -> Result<Option<Session>>;

    /// Sessions on the given topic, oldest first.
    async fn sessions_for_topic(&self, topic: TopicId, page: Page) -> Result<Paginated<Session>>;

    /// Insert a new voter. Fails with `DuplicateVoter` if the identifier is taken.
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter>;

    async fn voter(&self, id: VoterId) -> Result<Option<Voter>>;

    /// Has this voter already voted in this session?
    async fn has_voted(&self, session: SessionId, voter: VoterId) -> Result<bool>;

    /// Record a vote. Fails with `DuplicateVote` if the voter already voted in
    /// the session, however close together the two attempts were.
    async fn insert_vote(&self, vote: NewVote) -> Result<Vote>;

    async fn vote(&self, id: VoteId) -> Result<Option<Vote>>;

    /// Votes in the given session, in the order they were cast.
    async fn votes_for_session(&self, session: SessionId, page: Page) -> Result<Paginated<Vote>>;

    /// Count the committed votes on a topic.
    async fn tally(&self, topic: TopicId) -> Result<TallyCounts>;
}
