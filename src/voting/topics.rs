use crate::error::{Error, Result};
use crate::model::{
    api::pagination::{Page, Paginated},
    common::TopicId,
    db::topic::{NewTopic, Topic},
};

use super::{Voting, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};

impl Voting {
    /// Create a new topic. The title must not be blank.
    pub async fn create_topic(&self, title: &str, description: Option<&str>) -> Result<Topic> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("Topic title must not be blank".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(Error::InvalidInput(format!(
                "Topic title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        if description.map_or(0, |d| d.chars().count()) > MAX_DESCRIPTION_LEN {
            return Err(Error::InvalidInput(format!(
                "Topic description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        let topic = NewTopic {
            title: title.to_string(),
            description: description.map(str::to_string),
            created_at: self.now(),
        };
        let topic = self.store.insert_topic(topic).await?;
        info!("Created topic {}: '{}'", topic.id, topic.title);
        Ok(topic)
    }

    pub async fn topic(&self, id: TopicId) -> Result<Topic> {
        self.store.topic(id).await?.ok_or(Error::TopicNotFound(id))
    }

    pub async fn topics(&self, page: Page) -> Result<Paginated<Topic>> {
        self.store.topics(page).await
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;

    use super::*;

    #[rocket::async_test]
    async fn create_and_fetch() {
        let voting = Voting::example(ManualClock::default());

        let topic = voting
            .create_topic("  Budget approval ", Some("For next year"))
            .await
            .unwrap();
        assert_eq!(topic.id, 1);
        assert_eq!(topic.title, "Budget approval");
        assert_eq!(topic.description.as_deref(), Some("For next year"));

        assert_eq!(voting.topic(1).await.unwrap(), topic);
        assert!(matches!(voting.topic(2).await, Err(Error::TopicNotFound(2))));
    }

    #[rocket::async_test]
    async fn titles_are_validated() {
        let voting = Voting::example(ManualClock::default());

        let long = "x".repeat(MAX_TITLE_LEN + 1);
        for title in ["", "   ", long.as_str()] {
            assert!(matches!(
                voting.create_topic(title, None).await,
                Err(Error::InvalidInput(_))
            ));
        }
        voting
            .create_topic(&"x".repeat(MAX_TITLE_LEN), None)
            .await
            .unwrap();

        let description = "d".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(matches!(
            voting.create_topic("Ok", Some(&description)).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[rocket::async_test]
    async fn list_in_creation_order() {
        let voting = Voting::example(ManualClock::default());
        for title in ["A", "B", "C"] {
            voting.create_topic(title, None).await.unwrap();
        }

        let page = voting.topics(Page::new(1, 2)).await.unwrap();
        let titles: Vec<_> = page.items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(page.pagination.total, 3);
    }
}
