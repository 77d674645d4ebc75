use crate::error::{Error, Result};
use crate::model::{
    api::pagination::{Page, Paginated},
    common::{SessionId, TopicId},
    db::session::{NewSession, Session},
};

use super::Voting;

impl Voting {
    /// Open a voting session on a topic, lasting `duration` seconds or the
    /// configured default. A topic has at most one open session at a time.
    pub async fn open_session(&self, topic_id: TopicId, duration: Option<i64>) -> Result<Session> {
        let duration_seconds = match duration {
            None => self.config.default_session_duration().num_seconds(),
            Some(seconds) => seconds,
        };
        let duration_seconds = match u32::try_from(duration_seconds) {
            Ok(seconds) if seconds > 0 => seconds,
            _ => return Err(Error::InvalidDuration(duration_seconds)),
        };

        let now = self.now();
        let session = NewSession::new(topic_id, now, duration_seconds);
        match self.store.open_session(session, now).await {
            Ok(session) => {
                info!(
                    "Opened session {} on topic {topic_id} until {}",
                    session.id, session.closes_at
                );
                Ok(session)
            }
            Err(e @ Error::SessionAlreadyOpen(_)) => {
                warn!("Refused to open a second session on topic {topic_id}");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn session(&self, id: SessionId) -> Result<Session> {
        self.store.session(id).await?.ok_or(Error::SessionNotFound(id))
    }

    /// Is the session accepting votes right now?
    pub async fn is_open(&self, id: SessionId) -> Result<bool> {
        let session = self.session(id).await?;
        Ok(session.is_open_at(self.now()))
    }

    /// Every session ever opened on a topic, oldest first.
    pub async fn sessions_for_topic(&self, topic_id: TopicId, page: Page) -> Result<Paginated<Session>> {
        self.topic(topic_id).await?;
        self.store.sessions_for_topic(topic_id, page).await
    }
}
