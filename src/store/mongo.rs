use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, from_document, DateTime as BsonDateTime, Document},
    error::Error as DbError,
    options::{FindOptions, SessionOptions},
    Client, Database,
};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

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
    mongodb::{ensure_indexes_exist, id_filter, is_duplicate_key_error, Coll, Counter},
};

use super::{Store, TallyCounts};

/// A store backed by MongoDB.
///
/// Atomicity comes from the server: unique indexes reject duplicate voters
/// and votes, and a topic's `open_until` field is claimed with a single
/// `find_one_and_update` before its session is inserted.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
    topics: Coll<Topic>,
    sessions: Coll<Session>,
    voters: Coll<Voter>,
    votes: Coll<Vote>,
    counters: Coll<Counter>,
}

impl MongoStore {
    /// Connect to the given database and make sure its indexes exist.
    pub async fn connect(db_uri: &str, db_name: &str) -> std::result::Result<Self, DbError> {
        let client = Client::with_uri_str(db_uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        Ok(Self::new(client, db))
    }

    pub fn new(client: Client, db: Database) -> Self {
        Self {
            topics: Coll::from_db(&db),
            sessions: Coll::from_db(&db),
            voters: Coll::from_db(&db),
            votes: Coll::from_db(&db),
            counters: Coll::from_db(&db),
            client,
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Give back a topic's claim on `open_until`, if it is still ours.
    async fn release_claim(&self, topic: TopicId, closes_at: DateTime<Utc>) {
        let filter = doc! {
            "_id": topic,
            "open_until": BsonDateTime::from_chrono(closes_at),
        };
        let update = doc! {
            "$unset": { "open_until": "" }
        };
        if let Err(e) = self.topics.update_one(filter, update, None).await {
            error!("Failed to release session claim on topic {topic}: {e}");
        }
    }
}

/// Fetch one page of documents matching `filter`, in `_id` order.
async fn find_page<T>(coll: &Coll<T>, filter: Document, page: Page) -> Result<Paginated<T>>
where
    T: for<'de> Deserialize<'de> + Unpin + Send + Sync,
{
    let options = FindOptions::builder()
        .sort(doc! { "_id": 1 })
        .skip(page.skip())
        .limit(i64::from(page.page_size()))
        .build();
    let items = coll
        .find(filter.clone(), options)
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    let total = coll.count_documents(filter, None).await?;
    Ok(page.to_paginated(total, items))
}

/// One row of the tally aggregation.
#[derive(Deserialize)]
struct OptionCount {
    #[serde(rename = "_id")]
    option: VoteOption,
    count: u64,
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_topic(&self, topic: NewTopic) -> Result<Topic> {
        let id = Counter::next::<Topic>(&self.counters).await?;
        let topic = Topic { id, topic };
        self.topics.insert_one(&topic, None).await?;
        Ok(topic)
    }

    async fn topic(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(self.topics.find_one(id_filter(id), None).await?)
    }

    async fn topics(&self, page: Page) -> Result<Paginated<Topic>> {
        find_page(&self.topics, doc! {}, page).await
    }

    async fn open_session(&self, session: NewSession, now: DateTime<Utc>) -> Result<Session> {
        let topic_id = session.topic_id;

        // Claim the topic: succeeds only if no session is open at `now`.
        let filter = doc! {
            "_id": topic_id,
            "$or": [
                { "open_until": { "$exists": false } },
                { "open_until": { "$lte": BsonDateTime::from_chrono(now) } },
            ],
        };
        let update = doc! {
            "$set": { "open_until": BsonDateTime::from_chrono(session.closes_at) }
        };
        let claimed = self.topics.find_one_and_update(filter, update, None).await?;
        if claimed.is_none() {
            return Err(match self.topic(topic_id).await? {
                Some(_) => Error::SessionAlreadyOpen(topic_id),
                None => Error::TopicNotFound(topic_id),
            });
        }

        let closes_at = session.closes_at;
        let inserted = async {
            let id = Counter::next::<Session>(&self.counters).await?;
            let session = Session { id, session };
            self.sessions.insert_one(&session, None).await?;
            Ok::<_, Error>(session)
        }
        .await;
        if inserted.is_err() {
            self.release_claim(topic_id, closes_at).await;
        }
        inserted
    }

    async fn session(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.find_one(id_filter(id), None).await?)
    }

    async fn sessions_for_topic(&self, topic: TopicId, page: Page) -> Result<Paginated<Session>> {
        find_page(&self.sessions, doc! { "topic_id": topic }, page).await
    }

    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let id = Counter::next::<Voter>(&self.counters).await?;
        let voter = Voter { id, voter };
        match self.voters.insert_one(&voter, None).await {
            Ok(_) => Ok(voter),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::DuplicateVoter),
            Err(e) => Err(e.into()),
        }
    }

    async fn voter(&self, id: VoterId) -> Result<Option<Voter>> {
        Ok(self.voters.find_one(id_filter(id), None).await?)
    }

    async fn has_voted(&self, session: SessionId, voter: VoterId) -> Result<bool> {
        let filter = doc! {
            "session_id": session,
            "voter_id": voter,
        };
        Ok(self.votes.count_documents(filter, None).await? > 0)
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote> {
        let id = Counter::next::<Vote>(&self.counters).await?;
        let vote = Vote { id, vote };
        match self.votes.insert_one(&vote, None).await {
            Ok(_) => Ok(vote),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::DuplicateVote {
                session: vote.session_id,
                voter: vote.voter_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn vote(&self, id: VoteId) -> Result<Option<Vote>> {
        Ok(self.votes.find_one(id_filter(id), None).await?)
    }

    async fn votes_for_session(&self, session: SessionId, page: Page) -> Result<Paginated<Vote>> {
        find_page(&self.votes, doc! { "session_id": session }, page).await
    }

    async fn tally(&self, topic: TopicId) -> Result<TallyCounts> {
        // Read the session count and the vote counts from one snapshot.
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut db_session = self.client.start_session(Some(session_options)).await?;

        let sessions = self
            .sessions
            .count_documents_with_session(doc! { "topic_id": topic }, None, &mut db_session)
            .await?;

        let pipeline = [
            doc! { "$match": { "topic_id": topic } },
            doc! { "$group": { "_id": "$option", "count": { "$sum": 1 } } },
        ];
        let mut rows = self
            .votes
            .aggregate_with_session(pipeline, None, &mut db_session)
            .await?;

        let mut counts = TallyCounts {
            sessions,
            ..Default::default()
        };
        while let Some(row) = rows.next(&mut db_session).await {
            let row: OptionCount = from_document(row?)
                .map_err(|e| Error::Internal(format!("Malformed tally row: {e}")))?;
            match row.option {
                VoteOption::Yes => counts.yes = row.count,
                VoteOption::No => counts.no = row.count,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::db::{session::SessionCore, topic::TopicCore, vote::VoteCore, voter::VoterCore};

    #[backend_test(mongodb)]
    async fn counters_allocate_from_one(store: MongoStore) {
        let first = store.insert_topic(TopicCore::example()).await.unwrap();
        let second = store.insert_topic(TopicCore::example()).await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let fetched = store.topic(first.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, first.title);
    }

    #[backend_test(mongodb)]
    async fn unique_indexes_reject_duplicates(store: MongoStore) {
        let voter = VoterCore {
            identifier_hmac: "abc".to_string(),
            registered_at: Utc::now(),
        };
        store.insert_voter(voter.clone()).await.unwrap();
        assert!(matches!(
            store.insert_voter(voter).await,
            Err(Error::DuplicateVoter)
        ));

        let topic = store.insert_topic(TopicCore::example()).await.unwrap();
        let now = Utc::now();
        let session = store
            .open_session(SessionCore::new(topic.id, now, 60), now)
            .await
            .unwrap();
        let vote = VoteCore {
            session_id: session.id,
            topic_id: topic.id,
            voter_id: 1,
            option: VoteOption::Yes,
            cast_at: now,
        };
        store.insert_vote(vote.clone()).await.unwrap();
        assert!(store.has_voted(session.id, 1).await.unwrap());
        assert!(matches!(
            store.insert_vote(vote).await,
            Err(Error::DuplicateVote { .. })
        ));
        assert_eq!(
            store.tally(topic.id).await.unwrap(),
            TallyCounts {
                sessions: 1,
                yes: 1,
                no: 0
            }
        );
    }

    #[backend_test(mongodb)]
    async fn open_session_claims_topic(store: MongoStore) {
        let topic_id = store.insert_topic(TopicCore::example()).await.unwrap().id;
        let now = Utc::now();

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                rocket::tokio::spawn(async move {
                    store
                        .open_session(SessionCore::new(topic_id, now, 10), now)
                        .await
                })
            })
            .collect();
        let mut opened = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => opened += 1,
                Err(Error::SessionAlreadyOpen(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(opened, 1);

        let later = now + Duration::seconds(10);
        store
            .open_session(SessionCore::new(topic_id, later, 10), later)
            .await
            .unwrap();
        assert!(matches!(
            store
                .open_session(SessionCore::new(404, later, 10), later)
                .await,
            Err(Error::TopicNotFound(404))
        ));
    }
}
