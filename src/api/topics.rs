use rocket::{response::status::Created, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        pagination::{Paginated, PaginationRequest},
        topic::{TopicDescription, TopicResults, TopicSpec},
    },
    common::TopicId,
};
use crate::{Voting, API_BASE};

pub fn routes() -> Vec<Route> {
    routes![create_topic, topics, topic, topic_result]
}

#[post("/topics", data = "<spec>", format = "json")]
async fn create_topic(
    spec: Json<TopicSpec>,
    voting: &State<Voting>,
) -> Result<Created<Json<TopicDescription>>> {
    let spec = spec.into_inner();
    let topic = voting
        .create_topic(&spec.title, spec.description.as_deref())
        .await?;
    let location = format!("{API_BASE}/topics/{}", topic.id);
    Ok(Created::new(location).body(Json(topic.into())))
}

#[get("/topics?<pagination..>")]
async fn topics(
    pagination: PaginationRequest,
    voting: &State<Voting>,
) -> Result<Json<Paginated<TopicDescription>>> {
    let topics = voting.topics(pagination.page()?).await?;
    Ok(Json(topics.map(TopicDescription::from)))
}

#[get("/topics/<topic_id>")]
async fn topic(topic_id: TopicId, voting: &State<Voting>) -> Result<Json<TopicDescription>> {
    let topic = voting.topic(topic_id).await?;
    Ok(Json(topic.into()))
}

#[get("/topics/result/<topic_id>")]
async fn topic_result(topic_id: TopicId, voting: &State<Voting>) -> Result<Json<TopicResults>> {
    let tally = voting.tally(topic_id).await?;
    Ok(Json(tally.into()))
}
