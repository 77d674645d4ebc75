use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::{
    api::pagination::{Page, Paginated},
    common::{SessionId, TopicId, VoteId, VoteOption, VoterId},
    db::{
        session::{NewSession, Session},
        topic::{NewTopic, Topic},
        vote::{NewVote, Vote},
        voter::{NewVoter, Voter},
    },
};

use super::{Store, TallyCounts};

/// A store that keeps everything in process memory.
///
/// All tables sit behind one lock: writers take it exclusively, so each
/// check-then-insert is atomic, and readers see a consistent snapshot.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct Tables {
    topics: BTreeMap<TopicId, Topic>,
    sessions: BTreeMap<SessionId, Session>,
    voters: BTreeMap<VoterId, Voter>,
    votes: BTreeMap<VoteId, Vote>,
    /// Secondary indexes.
    sessions_by_topic: HashMap<TopicId, Vec<SessionId>>,
    voters_by_key: HashMap<String, VoterId>,
    votes_by_session: HashMap<SessionId, Vec<VoteId>>,
    ballots: HashSet<(SessionId, VoterId)>,
    /// Last allocated IDs.
    last_topic: TopicId,
    last_session: SessionId,
    last_voter: VoterId,
    last_vote: VoteId,
}

/// Allocate the next ID from a counter, starting at 1.
fn next_id(last: &mut u32) -> Result<u32> {
    *last = last
        .checked_add(1)
        .ok_or_else(|| Error::Internal("ID space exhausted".to_string()))?;
    Ok(*last)
}

/// Page through `ids`, looking each one up in `table`.
fn paginate<T: Clone>(ids: &[u32], table: &BTreeMap<u32, T>, page: Page) -> Paginated<T> {
    let skip = usize::try_from(page.skip()).unwrap_or(usize::MAX);
    let items = ids
        .iter()
        .skip(skip)
        .take(page.page_size() as usize)
        .filter_map(|id| table.get(id).cloned())
        .collect();
    page.to_paginated(ids.len() as u64, items)
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_topic(&self, topic: NewTopic) -> Result<Topic> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.last_topic)?;
        let topic = Topic { id, topic };
        tables.topics.insert(id, topic.clone());
        Ok(topic)
    }

    async fn topic(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(self.tables.read().await.topics.get(&id).cloned())
    }

    async fn topics(&self, page: Page) -> Result<Paginated<Topic>> {
        let tables = self.tables.read().await;
        let ids: Vec<_> = tables.topics.keys().copied().collect();
        Ok(paginate(&ids, &tables.topics, page))
    }

    async fn open_session(&self, session: NewSession, now: DateTime<Utc>) -> Result<Session> {
        let mut tables = self.tables.write().await;
        let topic_id = session.topic_id;
        if !tables.topics.contains_key(&topic_id) {
            return Err(Error::TopicNotFound(topic_id));
        }
        let already_open = tables
            .sessions_by_topic
            .get(&topic_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.sessions.get(id))
            .any(|existing| existing.is_open_at(now));
        if already_open {
            return Err(Error::SessionAlreadyOpen(topic_id));
        }

        let id = next_id(&mut tables.last_session)?;
        let session = Session { id, session };
        tables.sessions.insert(id, session.clone());
        tables.sessions_by_topic.entry(topic_id).or_default().push(id);
        Ok(session)
    }

    async fn session(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn sessions_for_topic(&self, topic: TopicId, page: Page) -> Result<Paginated<Session>> {
        let tables = self.tables.read().await;
        let ids = tables
            .sessions_by_topic
            .get(&topic)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(paginate(ids, &tables.sessions, page))
    }

    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let mut tables = self.tables.write().await;
        if tables.voters_by_key.contains_key(&voter.identifier_hmac) {
            return Err(Error::DuplicateVoter);
        }
        let id = next_id(&mut tables.last_voter)?;
        tables
            .voters_by_key
            .insert(voter.identifier_hmac.clone(), id);
        let voter = Voter { id, voter };
        tables.voters.insert(id, voter.clone());
        Ok(voter)
    }

    async fn voter(&self, id: VoterId) -> Result<Option<Voter>> {
        Ok(self.tables.read().await.voters.get(&id).cloned())
    }

    async fn has_voted(&self, session: SessionId, voter: VoterId) -> Result<bool> {
        Ok(self.tables.read().await.ballots.contains(&(session, voter)))
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote> {
        let mut tables = self.tables.write().await;
        let key = (vote.session_id, vote.voter_id);
        if tables.ballots.contains(&key) {
            return Err(Error::DuplicateVote {
                session: vote.session_id,
                voter: vote.voter_id,
            });
        }
        let id = next_id(&mut tables.last_vote)?;
        tables.ballots.insert(key);
        tables
            .votes_by_session
            .entry(vote.session_id)
            .or_default()
            .push(id);
        let vote = Vote { id, vote };
        tables.votes.insert(id, vote.clone());
        Ok(vote)
    }

    async fn vote(&self, id: VoteId) -> Result<Option<Vote>> {
        Ok(self.tables.read().await.votes.get(&id).cloned())
    }

    async fn votes_for_session(&self, session: SessionId, page: Page) -> Result<Paginated<Vote>> {
        let tables = self.tables.read().await;
        let ids = tables
            .votes_by_session
            .get(&session)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(paginate(ids, &tables.votes, page))
    }

    async fn tally(&self, topic: TopicId) -> Result<TallyCounts> {
        let tables = self.tables.read().await;
        let sessions = tables
            .sessions_by_topic
            .get(&topic)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut counts = TallyCounts {
            sessions: sessions.len() as u64,
            ..Default::default()
        };
        let votes = sessions
            .iter()
            .filter_map(|session| tables.votes_by_session.get(session))
            .flatten()
            .filter_map(|id| tables.votes.get(id));
        for vote in votes {
            match vote.option {
                VoteOption::Yes => counts.yes += 1,
                VoteOption::No => counts.no += 1,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::model::db::{session::SessionCore, topic::TopicCore, vote::VoteCore, voter::VoterCore};

    fn voter(key: &str) -> NewVoter {
        VoterCore {
            identifier_hmac: key.to_string(),
            registered_at: Utc::now(),
        }
    }

    fn vote(session: &Session, voter: VoterId, option: VoteOption) -> NewVote {
        VoteCore {
            session_id: session.id,
            topic_id: session.topic_id,
            voter_id: voter,
            option,
            cast_at: Utc::now(),
        }
    }

    #[rocket::async_test]
    async fn ids_start_at_one_and_increase() {
        let store = MemoryStore::new();
        let first = store.insert_topic(TopicCore::example()).await.unwrap();
        let second = store.insert_topic(TopicCore::example()).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.topic(2).await.unwrap(), Some(second));
        assert_eq!(store.topic(3).await.unwrap(), None);
    }

    #[rocket::async_test]
    async fn open_session_requires_topic() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let result = store.open_session(SessionCore::new(9, now, 10), now).await;
        assert!(matches!(result, Err(Error::TopicNotFound(9))));
    }

    #[rocket::async_test]
    async fn open_session_after_previous_expires() {
        let store = MemoryStore::new();
        let topic = store.insert_topic(TopicCore::example()).await.unwrap();
        let now = Utc::now();

        store
            .open_session(SessionCore::new(topic.id, now, 10), now)
            .await
            .unwrap();
        let result = store
            .open_session(SessionCore::new(topic.id, now, 10), now + Duration::seconds(9))
            .await;
        assert!(matches!(result, Err(Error::SessionAlreadyOpen(_))));

        let later = now + Duration::seconds(10);
        let second = store
            .open_session(SessionCore::new(topic.id, later, 10), later)
            .await
            .unwrap();
        assert_eq!(second.id, 2);

        let sessions = store
            .sessions_for_topic(topic.id, Page::default())
            .await
            .unwrap();
        assert_eq!(sessions.pagination.total, 2);
    }

    #[rocket::async_test]
    async fn duplicate_voter_key_rejected() {
        let store = MemoryStore::new();
        store.insert_voter(voter("abc")).await.unwrap();
        let result = store.insert_voter(voter("abc")).await;
        assert!(matches!(result, Err(Error::DuplicateVoter)));
        assert_eq!(store.insert_voter(voter("def")).await.unwrap().id, 2);
    }

    #[rocket::async_test]
    async fn one_vote_per_session_and_voter() {
        let store = MemoryStore::new();
        let topic = store.insert_topic(TopicCore::example()).await.unwrap();
        let now = Utc::now();
        let session = store
            .open_session(SessionCore::new(topic.id, now, 60), now)
            .await
            .unwrap();

        assert!(!store.has_voted(session.id, 1).await.unwrap());
        store
            .insert_vote(vote(&session, 1, VoteOption::Yes))
            .await
            .unwrap();
        assert!(store.has_voted(session.id, 1).await.unwrap());

        let result = store.insert_vote(vote(&session, 1, VoteOption::No)).await;
        assert!(matches!(
            result,
            Err(Error::DuplicateVote { session: 1, voter: 1 })
        ));
    }

    #[rocket::async_test]
    async fn tally_spans_sessions() {
        let store = MemoryStore::new();
        let topic = store.insert_topic(TopicCore::example()).await.unwrap();
        let other = store.insert_topic(TopicCore::example()).await.unwrap();
        let now = Utc::now();
        let first = store
            .open_session(SessionCore::new(topic.id, now, 10), now)
            .await
            .unwrap();
        let later = now + Duration::seconds(20);
        let second = store
            .open_session(SessionCore::new(topic.id, later, 10), later)
            .await
            .unwrap();
        let unrelated = store
            .open_session(SessionCore::new(other.id, now, 10), now)
            .await
            .unwrap();

        store.insert_vote(vote(&first, 1, VoteOption::Yes)).await.unwrap();
        store.insert_vote(vote(&first, 2, VoteOption::No)).await.unwrap();
        store.insert_vote(vote(&second, 1, VoteOption::Yes)).await.unwrap();
        store.insert_vote(vote(&unrelated, 1, VoteOption::No)).await.unwrap();

        let counts = store.tally(topic.id).await.unwrap();
        assert_eq!(
            counts,
            TallyCounts {
                sessions: 2,
                yes: 2,
                no: 1
            }
        );
        assert_eq!(store.tally(99).await.unwrap(), TallyCounts::default());
    }

    #[rocket::async_test]
    async fn votes_paginate_in_cast_order() {
        let store = MemoryStore::new();
        let topic = store.insert_topic(TopicCore::example()).await.unwrap();
        let now = Utc::now();
        let session = store
            .open_session(SessionCore::new(topic.id, now, 60), now)
            .await
            .unwrap();
        for voter_id in 1..=5 {
            store
                .insert_vote(vote(&session, voter_id, VoteOption::Yes))
                .await
                .unwrap();
        }

        let page = store
            .votes_for_session(session.id, Page::new(2, 2))
            .await
            .unwrap();
        let voters: Vec<_> = page.items.iter().map(|v| v.voter_id).collect();
        assert_eq!(voters, vec![3, 4]);
        assert_eq!(page.pagination.total, 5);

        let past_the_end = store
            .votes_for_session(session.id, Page::new(4, 2))
            .await
            .unwrap();
        assert!(past_the_end.items.is_empty());
    }

    #[rocket::async_test]
    async fn concurrent_duplicate_votes_admit_one() {
        let store = Arc::new(MemoryStore::new());
        let topic = store.insert_topic(TopicCore::example()).await.unwrap();
        let now = Utc::now();
        let session = store
            .open_session(SessionCore::new(topic.id, now, 60), now)
            .await
            .unwrap();

        let attempts: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                let vote = vote(&session, 7, VoteOption::Yes);
                rocket::tokio::spawn(async move { store.insert_vote(vote).await })
            })
            .collect();
        let mut successes = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::DuplicateVote { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(successes, 1);
    }
}
