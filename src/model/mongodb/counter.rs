use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{Coll, MongoCollection};

/// A counter object used to implement auto-increment IDs.
/// There is one per collection, keyed by the collection name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    /// The most recently allocated value.
    pub last: u32,
}

impl Counter {
    /// Atomically allocate the next ID for collection `T`, starting from 1.
    /// The counter is created on first use.
    pub async fn next<T: MongoCollection>(counters: &Coll<Counter>) -> Result<u32> {
        let update = doc! {
            "$inc": { "last": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": T::NAME }, update, options)
            .await?
            .ok_or_else(|| Error::Internal(format!("Failed to allocate an ID for {}", T::NAME)))?;
        Ok(counter.last)
    }
}
