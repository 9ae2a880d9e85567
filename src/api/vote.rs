use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::api::vote::{BallotPaper, VoteReceipt, VoteRequest},
    voting::VotingCoordinator,
};

pub fn routes() -> Vec<Route> {
    routes![ballot_paper, submit_vote]
}

/// Anyone holding a valid token may see what they can vote for.
#[get("/vote?<token>")]
async fn ballot_paper(token: &str, coordinator: VotingCoordinator) -> Result<Json<BallotPaper>> {
    Ok(Json(coordinator.ballot_paper(token).await?))
}

#[post("/vote", data = "<request>", format = "json")]
async fn submit_vote(
    request: Json<VoteRequest>,
    coordinator: VotingCoordinator,
) -> Result<Json<VoteReceipt>> {
    let vote = coordinator.submit(&request).await?;
    Ok(Json(VoteReceipt::from(&vote)))
}

#[cfg(test)]
mod tests {
    use mongodb::{bson::doc, Database};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use super::*;
    use crate::model::{
        common::ElectionStatus,
        db::{
            candidate::{Candidate, CandidateCore},
            election::{Election, ElectionCore},
            token::{VotingToken, DEFAULT_MAX_TOKEN_BATCH},
            vote::Vote,
        },
        mongodb::{Coll, Id},
    };

    #[backend_test]
    async fn vote_over_http(client: Client, db: Database, votes: Coll<Vote>) {
        let (election, candidate, token) = election_with_token(&db, ElectionStatus::Active).await;

        let response = client
            .get(uri!(ballot_paper(token.token.token.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let ballot: BallotPaper = response.into_json().await.unwrap();
        assert_eq!(ballot.election.id, election.id);
        assert_eq!(ballot.candidates.len(), 1);
        assert_eq!(ballot.candidates[0].id, candidate.id);

        let request = VoteRequest {
            token: token.token.token.clone(),
            candidate_id: candidate.id,
        };
        let response = client
            .post(uri!(submit_vote))
            .header(ContentType::JSON)
            .body(json!(request).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body = response.into_string().await.unwrap();
        assert!(!body.contains(&token.token.token));
        assert!(!body.contains(&candidate.id.to_string()));

        // Spent tokens are refused, and no longer show a ballot.
        let response = client
            .post(uri!(submit_vote))
            .header(ContentType::JSON)
            .body(json!(request).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let response = client
            .get(uri!(ballot_paper(token.token.token.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let count = votes
            .count_documents(doc! { "election_id": election.id }, None)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[backend_test]
    async fn draft_election_ballot_refused(client: Client, db: Database) {
        let (_, _, token) = election_with_token(&db, ElectionStatus::Draft).await;

        let response = client
            .get(uri!(ballot_paper(token.token.token.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test]
    async fn foreign_candidate_refused(client: Client, db: Database, votes: Coll<Vote>) {
        let (_, _, token) = election_with_token(&db, ElectionStatus::Active).await;
        let (_, foreign, _) = election_with_token(&db, ElectionStatus::Active).await;

        let request = VoteRequest {
            token: token.token.token.clone(),
            candidate_id: foreign.id,
        };
        let response = client
            .post(uri!(submit_vote))
            .header(ContentType::JSON)
            .body(json!(request).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 0);
    }

    /// An election with one candidate and one unused token.
    async fn election_with_token(
        db: &Database,
        status: ElectionStatus,
    ) -> (Election, Candidate, VotingToken) {
        let election = Election {
            id: Id::new(),
            election: ElectionCore::example(status, Id::new()),
        };
        Coll::<Election>::from_db(db)
            .insert_one(&election, None)
            .await
            .unwrap();

        let candidate = Candidate {
            id: Id::new(),
            candidate: CandidateCore::example(election.id, "Ada", 0),
        };
        Coll::<Candidate>::from_db(db)
            .insert_one(&candidate, None)
            .await
            .unwrap();

        let tokens = Coll::<VotingToken>::from_db(db);
        let token = VotingToken::generate(&tokens, &election, 1, DEFAULT_MAX_TOKEN_BATCH)
            .await
            .unwrap()
            .remove(0);

        (election, candidate, token)
    }
}
