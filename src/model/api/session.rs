use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{SessionId, TopicId},
    db::session::Session,
};

/// A request to open a session on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSpec {
    pub topic_id: TopicId,
    /// Length of the voting window in seconds. Uses the configured default if absent.
    /// Non-integers and values outside `i64` fail body parsing (422) before range checks.
    #[serde(default, alias = "durationSeconds")]
    pub duration: Option<i64>,
}

/// A session, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    pub id: SessionId,
    pub topic_id: TopicId,
    pub opened_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub closes_at: DateTime<Utc>,
    /// Whether votes were being accepted when this description was produced.
    pub open: bool,
}

impl SessionDescription {
    /// Describe the session as seen at time `now`.
    pub fn at(session: Session, now: DateTime<Utc>) -> Self {
        Self {
            id: session.id,
            open: session.is_open_at(now),
            topic_id: session.session.topic_id,
            opened_at: session.session.opened_at,
            duration_seconds: session.session.duration_seconds,
            closes_at: session.session.closes_at,
        }
    }
}
