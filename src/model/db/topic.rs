use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::TopicId;

/// Core topic data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCore {
    /// What is being voted on.
    pub title: String,
    /// Optional longer explanation.
    pub description: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A topic without an ID.
pub type NewTopic = TopicCore;

/// A topic from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(rename = "_id")]
    pub id: TopicId,
    #[serde(flatten)]
    pub topic: TopicCore,
}

impl Deref for Topic {
    type Target = TopicCore;

    fn deref(&self) -> &Self::Target {
        &self.topic
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl TopicCore {
        pub fn example() -> Self {
            Self {
                title: "Budget approval".to_string(),
                description: Some("Approve the budget for next year".to_string()),
                created_at: Utc::now(),
            }
        }
    }
}
