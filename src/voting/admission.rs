use crate::error::{Error, Result};
use crate::model::{
    api::pagination::{Page, Paginated},
    common::{SessionId, VoteId, VoteOption, VoterId},
    db::vote::{NewVote, Vote},
};

use super::Voting;

impl Voting {
    /// Cast a vote in a session.
    ///
    /// Checks run in a fixed order, so a request with several problems always
    /// reports the same one: unknown session, closed session, unknown voter,
    /// repeat vote, unknown option. The final insert re-checks for a repeat
    /// vote atomically, so concurrent duplicates still admit only one.
    pub async fn cast_vote(
        &self,
        session_id: SessionId,
        voter_id: VoterId,
        option: &str,
    ) -> Result<Vote> {
        let session = self.session(session_id).await?;
        let now = self.now();
        if !session.is_open_at(now) {
            warn!("Rejected vote by voter {voter_id}: session {session_id} is closed");
            return Err(Error::SessionClosed(session_id));
        }
        self.voter(voter_id).await?;
        if self.store.has_voted(session_id, voter_id).await? {
            warn!("Rejected repeat vote by voter {voter_id} in session {session_id}");
            return Err(Error::DuplicateVote {
                session: session_id,
                voter: voter_id,
            });
        }
        let option: VoteOption = option
            .parse()
            .map_err(|_| Error::InvalidOption(option.to_string()))?;

        let vote = NewVote {
            session_id,
            topic_id: session.topic_id,
            voter_id,
            option,
            cast_at: now,
        };
        match self.store.insert_vote(vote).await {
            Ok(vote) => {
                debug!("Recorded vote {} in session {session_id}", vote.id);
                Ok(vote)
            }
            Err(e @ Error::DuplicateVote { .. }) => {
                warn!("Rejected concurrent repeat vote by voter {voter_id} in session {session_id}");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn vote(&self, id: VoteId) -> Result<Vote> {
        self.store.vote(id).await?.ok_or(Error::VoteNotFound(id))
    }

    /// Votes cast in a session, in the order they were recorded.
    pub async fn votes_for_session(&self, session_id: SessionId, page: Page) -> Result<Paginated<Vote>> {
        self.session(session_id).await?;
        self.store.votes_for_session(session_id, page).await
    }
}
