use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{SessionId, TopicId, VoteId, VoteOption, VoterId},
    db::vote::Vote,
};

/// A vote a voter wishes to cast.
///
/// `vote_option` stays a string until admission, which validates it in order
/// with the other checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSpec {
    pub vote_option: String,
    #[serde(alias = "voterId")]
    pub user_id: VoterId,
    pub session_id: SessionId,
}

/// A recorded vote, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteDescription {
    pub id: VoteId,
    pub vote_option: VoteOption,
    pub user_id: VoterId,
    pub session_id: SessionId,
    pub topic_id: TopicId,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteDescription {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id,
            vote_option: vote.vote.option,
            user_id: vote.vote.voter_id,
            session_id: vote.vote.session_id,
            topic_id: vote.vote.topic_id,
            cast_at: vote.vote.cast_at,
        }
    }
}
