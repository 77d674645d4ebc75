use rocket::{response::status::Created, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        pagination::{Paginated, PaginationRequest},
        session::{SessionDescription, SessionSpec},
    },
    common::{SessionId, TopicId},
};
use crate::{Voting, API_BASE};

pub fn routes() -> Vec<Route> {
    routes![open_session, session, topic_sessions]
}

#[post("/sessions", data = "<spec>", format = "json")]
async fn open_session(
    spec: Json<SessionSpec>,
    voting: &State<Voting>,
) -> Result<Created<Json<SessionDescription>>> {
    let session = voting.open_session(spec.topic_id, spec.duration).await?;
    let location = format!("{API_BASE}/sessions/{}", session.id);
    let description = SessionDescription::at(session, voting.now());
    Ok(Created::new(location).body(Json(description)))
}

#[get("/sessions/<session_id>")]
async fn session(session_id: SessionId, voting: &State<Voting>) -> Result<Json<SessionDescription>> {
    let session = voting.session(session_id).await?;
    Ok(Json(SessionDescription::at(session, voting.now())))
}

#[get("/sessions/topic/<topic_id>?<pagination..>")]
async fn topic_sessions(
    topic_id: TopicId,
    pagination: PaginationRequest,
    voting: &State<Voting>,
) -> Result<Json<Paginated<SessionDescription>>> {
    let sessions = voting
        .sessions_for_topic(topic_id, pagination.page()?)
        .await?;
    let now = voting.now();
    Ok(Json(sessions.map(|s| SessionDescription::at(s, now))))
}
