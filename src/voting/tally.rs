use crate::error::Result;
use crate::model::{common::TopicId, db::topic::Topic};

use super::Voting;

/// Vote counts for a topic, summed over all of its sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTally {
    pub topic: Topic,
    pub sessions: u64,
    pub yes: u64,
    pub no: u64,
}

impl TopicTally {
    pub fn total(&self) -> u64 {
        self.yes + self.no
    }

    /// Share of `Yes` votes as a whole percentage, rounded half-up.
    /// Zero when nobody has voted.
    pub fn yes_percentage(&self) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        // yes * 100 / total, rounded half-up, in integers.
        ((self.yes * 200 + total) / (total * 2)) as u32
    }
}

impl Voting {
    /// Count the votes on a topic. Safe to call at any time, including while
    /// votes are still being cast; every committed vote is counted exactly once.
    pub async fn tally(&self, topic_id: TopicId) -> Result<TopicTally> {
        let topic = self.topic(topic_id).await?;
        let counts = self.store.tally(topic_id).await?;
        Ok(TopicTally {
            topic,
            sessions: counts.sessions,
            yes: counts.yes,
            no: counts.no,
        })
    }
}
