use rocket::{response::status::Created, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        pagination::{Paginated, PaginationRequest},
        vote::{VoteDescription, VoteSpec},
    },
    common::{SessionId, VoteId},
};
use crate::{Voting, API_BASE};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, vote, session_votes]
}

#[post("/votes", data = "<spec>", format = "json")]
async fn cast_vote(
    spec: Json<VoteSpec>,
    voting: &State<Voting>,
) -> Result<Created<Json<VoteDescription>>> {
    let vote = voting
        .cast_vote(spec.session_id, spec.user_id, &spec.vote_option)
        .await?;
    let location = format!("{API_BASE}/votes/{}", vote.id);
    Ok(Created::new(location).body(Json(vote.into())))
}

#[get("/votes/<vote_id>")]
async fn vote(vote_id: VoteId, voting: &State<Voting>) -> Result<Json<VoteDescription>> {
    let vote = voting.vote(vote_id).await?;
    Ok(Json(vote.into()))
}

#[get("/votes/session/<session_id>?<pagination..>")]
async fn session_votes(
    session_id: SessionId,
    pagination: PaginationRequest,
    voting: &State<Voting>,
) -> Result<Json<Paginated<VoteDescription>>> {
    let votes = voting
        .votes_for_session(session_id, pagination.page()?)
        .await?;
    Ok(Json(votes.map(VoteDescription::from)))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::json,
    };

    use crate::clock::ManualClock;
    use crate::error::ErrorMessage;
    use crate::model::{
        api::cpf::Cpf,
        common::{SessionId, VoteOption, VoterId},
    };

    use super::*;

    async fn cast<'c>(
        client: &'c Client,
        session: SessionId,
        voter: VoterId,
        option: &str,
    ) -> LocalResponse<'c> {
        client
            .post(format!("{API_BASE}/votes"))
            .header(ContentType::JSON)
            .body(json!({ "voteOption": option, "userId": voter, "sessionId": session }).to_string())
            .dispatch()
            .await
    }

    /// One topic with a ten-second session, and two registered voters.
    async fn open_with_voters(voting: &Voting) -> (SessionId, VoterId, VoterId) {
        let topic = voting.create_topic("Lunch", None).await.unwrap();
        let session = voting.open_session(topic.id, Some(10)).await.unwrap();
        let alice = voting.register_voter(&Cpf::example()).await.unwrap();
        let bob = voting.register_voter(&Cpf::example2()).await.unwrap();
        (session.id, alice.id, bob.id)
    }

    #[backend_test]
    async fn cast_and_get(client: Client, voting: Voting) {
        let (session, alice, _) = open_with_voters(&voting).await;

        let response = cast(&client, session, alice, "Sim").await;
        assert_eq!(Status::Created, response.status());
        let recorded: VoteDescription = response.into_json().await.unwrap();
        assert_eq!(recorded.vote_option, VoteOption::Yes);
        assert_eq!(recorded.user_id, alice);

        let response = client
            .get(format!("{API_BASE}/votes/{}", recorded.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let fetched: VoteDescription = response.into_json().await.unwrap();
        assert_eq!(fetched, recorded);

        let response = client
            .get(format!("{API_BASE}/votes/session/{session}"))
            .dispatch()
            .await;
        let votes: Paginated<VoteDescription> = response.into_json().await.unwrap();
        assert_eq!(votes.items, vec![recorded]);
    }

    #[backend_test]
    async fn status_for_each_rejection(client: Client, voting: Voting, clock: ManualClock) {
        let (session, alice, bob) = open_with_voters(&voting).await;

        assert_eq!(Status::NotFound, cast(&client, 99, alice, "Sim").await.status());
        assert_eq!(Status::NotFound, cast(&client, session, 99, "Sim").await.status());
        assert_eq!(Status::BadRequest, cast(&client, session, alice, "Talvez").await.status());

        assert_eq!(Status::Created, cast(&client, session, alice, "Não").await.status());
        let response = cast(&client, session, alice, "Sim").await;
        assert_eq!(Status::Conflict, response.status());
        let error: ErrorMessage = response.into_json().await.unwrap();
        assert_eq!(
            error.message,
            format!("Voter {alice} has already voted in session {session}")
        );

        clock.advance(Duration::seconds(10));
        assert_eq!(Status::Forbidden, cast(&client, session, bob, "Sim").await.status());

        let tally = voting.tally(1).await.unwrap();
        assert_eq!((tally.yes, tally.no), (0, 1));
    }

    #[backend_test]
    async fn concurrent_requests_from_one_voter(client: Client, voting: Voting) {
        let (session, alice, _) = open_with_voters(&voting).await;

        let responses = rocket::futures::future::join_all(
            (0..16).map(|_| cast(&client, session, alice, "Sim")),
        )
        .await;
        let created = responses
            .iter()
            .filter(|r| r.status() == Status::Created)
            .count();
        let conflicts = responses
            .iter()
            .filter(|r| r.status() == Status::Conflict)
            .count();
        assert_eq!((created, conflicts), (1, 15));
    }
}
