use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::TopicId, db::topic::Topic};
use crate::voting::TopicTally;

/// A request to create a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A topic, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDescription {
    pub id: TopicId,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Topic> for TopicDescription {
    fn from(topic: Topic) -> Self {
        Self {
            id: topic.id,
            title: topic.topic.title,
            description: topic.topic.description,
            created_at: topic.topic.created_at,
        }
    }
}

/// Vote counts for a topic across all of its sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicResults {
    pub id: TopicId,
    pub title: String,
    pub description: Option<String>,
    pub sessions_count: u64,
    pub votes_yes_count: u64,
    pub votes_no_count: u64,
    /// Share of `Yes` votes, rounded half-up to a whole percent.
    pub yes_percentage: u32,
}

impl From<TopicTally> for TopicResults {
    fn from(tally: TopicTally) -> Self {
        let yes_percentage = tally.yes_percentage();
        Self {
            id: tally.topic.id,
            title: tally.topic.topic.title,
            description: tally.topic.topic.description,
            sessions_count: tally.sessions,
            votes_yes_count: tally.yes,
            votes_no_count: tally.no,
            yes_percentage,
        }
    }
}
