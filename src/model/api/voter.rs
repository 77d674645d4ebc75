use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::VoterId, db::voter::Voter};

/// A request to register a voter.
///
/// The identifier is kept as a raw string here so that a malformed one is
/// reported as such, rather than as an unreadable body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterSpec {
    pub cpf: String,
}

/// A voter, as returned to clients. The identifier is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterDescription {
    pub id: VoterId,
    pub registered_at: DateTime<Utc>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id,
            registered_at: voter.voter.registered_at,
        }
    }
}
