use rocket::{http::Status, response::status::Created, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        cpf::Cpf,
        voter::{VoterDescription, VoterSpec},
    },
    common::VoterId,
};
use crate::{Voting, API_BASE};

pub fn routes() -> Vec<Route> {
    routes![register_voter, voter, validate_identifier]
}

#[post("/users", data = "<spec>", format = "json")]
async fn register_voter(
    spec: Json<VoterSpec>,
    voting: &State<Voting>,
) -> Result<Created<Json<VoterDescription>>> {
    let cpf: Cpf = spec.cpf.parse()?;
    let voter = voting.register_voter(&cpf).await?;
    let location = format!("{API_BASE}/users/{}", voter.id);
    Ok(Created::new(location).body(Json(voter.into())))
}

#[get("/users/<voter_id>")]
async fn voter(voter_id: VoterId, voting: &State<Voting>) -> Result<Json<VoterDescription>> {
    let voter = voting.voter(voter_id).await?;
    Ok(Json(voter.into()))
}

/// Check that an identifier is well-formed enough to register with.
#[get("/users/<cpf>/validate")]
async fn validate_identifier(cpf: &str) -> Result<Status> {
    let cpf: Cpf = cpf.parse()?;
    debug!("Identifier {cpf} is valid");
    Ok(Status::Ok)
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::{Client, LocalResponse},
        serde::json::json,
    };

    use super::*;

    async fn register<'c>(client: &'c Client, cpf: &str) -> LocalResponse<'c> {
        client
            .post(format!("{API_BASE}/users"))
            .header(ContentType::JSON)
            .body(json!({ "cpf": cpf }).to_string())
            .dispatch()
            .await
    }

    #[backend_test]
    async fn register_and_get(client: Client) {
        let response = register(&client, "529.982.247-25").await;
        assert_eq!(Status::Created, response.status());
        let created: VoterDescription = response.into_json().await.unwrap();

        let response = client
            .get(format!("{API_BASE}/users/{}", created.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body = response.into_string().await.unwrap();
        assert!(!body.contains("cpf"));
        assert!(!body.contains("identifier"));

        let response = client.get(format!("{API_BASE}/users/99")).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn duplicate_identifier_conflicts(client: Client) {
        assert_eq!(Status::Created, register(&client, "52998224725").await.status());
        assert_eq!(Status::Conflict, register(&client, "529.982.247-25").await.status());
        assert_eq!(Status::Created, register(&client, "111.444.777-35").await.status());
    }

    #[backend_test]
    async fn malformed_identifier(client: Client, voting: Voting) {
        for cpf in ["", "123", "529.982.247-26", "000.000.000-00", "987.654.321-0\u{0660}"] {
            assert_eq!(
                Status::BadRequest,
                register(&client, cpf).await.status(),
                "{cpf}"
            );
        }
        assert!(matches!(
            voting.voter(1).await,
            Err(crate::error::Error::VoterNotFound(1))
        ));
    }

    #[backend_test]
    async fn validate_identifier_without_registering(client: Client, voting: Voting) {
        for cpf in ["529.982.247-25", "11144477735"] {
            let response = client
                .get(format!("{API_BASE}/users/{cpf}/validate"))
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status(), "{cpf}");
        }

        for cpf in ["529.982.247-26", "123", "987.654.321-0%D9%A0"] {
            let response = client
                .get(format!("{API_BASE}/users/{cpf}/validate"))
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status(), "{cpf}");
        }

        assert!(matches!(
            voting.voter(1).await,
            Err(crate::error::Error::VoterNotFound(1))
        ));
    }
}
