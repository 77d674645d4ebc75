use std::ops::Deref;

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::{SessionId, TopicId};

/// Core session data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCore {
    /// Foreign Key topic ID.
    pub topic_id: TopicId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub opened_at: DateTime<Utc>,
    pub duration_seconds: u32,
    /// Always `opened_at + duration_seconds`; stored so it can be queried.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub closes_at: DateTime<Utc>,
}

impl SessionCore {
    /// Create a session on `topic_id` opening at `opened_at`.
    pub fn new(topic_id: TopicId, opened_at: DateTime<Utc>, duration_seconds: u32) -> Self {
        Self {
            topic_id,
            opened_at,
            duration_seconds,
            closes_at: opened_at + Duration::seconds(duration_seconds.into()),
        }
    }

    /// Is the session accepting votes at time `now`?
    /// The window is half-open: a session is already closed at exactly `closes_at`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now < self.closes_at
    }
}

/// A session without an ID.
pub type NewSession = SessionCore;

/// A session from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id")]
    pub id: SessionId,
    #[serde(flatten)]
    pub session: SessionCore,
}

impl Deref for Session {
    type Target = SessionCore;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}
