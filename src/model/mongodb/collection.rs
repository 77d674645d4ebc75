use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{session::Session, topic::Topic, vote::Vote, voter::Voter};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Topic {
    const NAME: &'static str = "topics";
}

impl MongoCollection for Session {
    const NAME: &'static str = "sessions";
}

impl MongoCollection for Voter {
    const NAME: &'static str = "voters";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique indexes are what make voter registration and vote casting
/// atomic: a racing duplicate insert is rejected by the server.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voter collection.
    let voter_index = IndexModel::builder()
        .keys(doc! {"identifier_hmac": 1})
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Session collection.
    let session_index = IndexModel::builder()
        .keys(doc! {"topic_id": 1, "opened_at": 1})
        .build();
    Coll::<Session>::from_db(db)
        .create_index(session_index, None)
        .await?;

    // Vote collection: one vote per voter per session, plus a tally index.
    let ballot_index = IndexModel::builder()
        .keys(doc! {"session_id": 1, "voter_id": 1})
        .options(unique)
        .build();
    let tally_index = IndexModel::builder()
        .keys(doc! {"topic_id": 1, "option": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_indexes([ballot_index, tally_index], None)
        .await?;

    Ok(())
}
