use crate::error::{Error, Result};
use crate::model::{
    api::cpf::Cpf,
    common::VoterId,
    db::voter::{NewVoter, Voter},
};

use super::Voting;

impl Voting {
    /// Register a voter under their national identifier.
    /// Each identifier can be registered at most once.
    pub async fn register_voter(&self, cpf: &Cpf) -> Result<Voter> {
        let voter = NewVoter {
            identifier_hmac: cpf.hmac(self.config.hmac_secret()),
            registered_at: self.now(),
        };
        match self.store.insert_voter(voter).await {
            Ok(voter) => {
                info!("Registered voter {}", voter.id);
                Ok(voter)
            }
            Err(e @ Error::DuplicateVoter) => {
                warn!("Rejected duplicate voter registration");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn voter(&self, id: VoterId) -> Result<Voter> {
        self.store.voter(id).await?.ok_or(Error::VoterNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;

    use super::*;

    #[rocket::async_test]
    async fn identifiers_are_unique() {
        let voting = Voting::example(ManualClock::default());

        let first = voting.register_voter(&Cpf::example()).await.unwrap();
        let second = voting.register_voter(&Cpf::example2()).await.unwrap();
        assert_ne!(first.id, second.id);

        // Same number, different formatting.
        let unformatted: Cpf = "52998224725".parse().unwrap();
        assert!(matches!(
            voting.register_voter(&unformatted).await,
            Err(Error::DuplicateVoter)
        ));
    }

    #[rocket::async_test]
    async fn identifier_is_not_stored() {
        let voting = Voting::example(ManualClock::default());
        let cpf = Cpf::example();

        let voter = voting.register_voter(&cpf).await.unwrap();
        assert!(!voter.identifier_hmac.contains("52998224725"));
        assert_eq!(voter.identifier_hmac.len(), 64);
        assert_eq!(voting.voter(voter.id).await.unwrap(), voter);
        assert!(matches!(
            voting.voter(voter.id + 1).await,
            Err(Error::VoterNotFound(_))
        ));
    }
}
