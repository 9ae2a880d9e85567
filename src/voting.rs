//! The voting transaction: turning a token and a choice into exactly one vote.

use std::fmt::{Display, Formatter};

use log::{debug, error, info, warn};
use mongodb::{bson::doc, options::FindOptions, Client, Database};
use rocket::{
    futures::TryStreamExt,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::vote::{BallotPaper, VoteRequest},
    db::{candidate::Candidate, election::Election, token::VotingToken, vote::Vote},
    mongodb::{is_write_conflict, Coll, Id, UnitOfWork},
};

/// How far a submission got before it committed or was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Received,
    TokenValidated,
    VoteRecorded,
    TokenConsumed,
    Committed,
}

impl Display for SubmissionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::TokenValidated => "token validated",
            Self::VoteRecorded => "vote recorded",
            Self::TokenConsumed => "token consumed",
            Self::Committed => "committed",
        };
        write!(f, "{name}")
    }
}

/// Accepts anonymous votes.
///
/// Recording the vote and consuming its token happen in one unit of work, so
/// for any token at most one submission ever commits.
#[derive(Clone)]
pub struct VotingCoordinator {
    client: Client,
    tokens: Coll<VotingToken>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
}

impl VotingCoordinator {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            tokens: Coll::from_db(db),
            elections: Coll::from_db(db),
            candidates: Coll::from_db(db),
            votes: Coll::from_db(db),
        }
    }

    /// The election a token is good for, with its candidates in display order.
    pub async fn ballot_paper(&self, token: &str) -> Result<BallotPaper> {
        let (_, election) =
            VotingToken::resolve_election(&self.tokens, &self.elections, token).await?;

        let filter = doc! { "election_id": election.id };
        let options = FindOptions::builder()
            .sort(doc! { "order": 1, "_id": 1 })
            .build();
        let candidates: Vec<Candidate> = self
            .candidates
            .find(filter, options)
            .await?
            .try_collect()
            .await?;

        Ok(BallotPaper {
            election: election.into(),
            candidates: candidates.into_iter().map(Into::into).collect(),
        })
    }

    /// Submit a vote, returning it once committed.
    ///
    /// Nothing is persisted unless this returns `Ok`.
    pub async fn submit(&self, request: &VoteRequest) -> Result<Vote> {
        let mut state = SubmissionState::Received;
        let result = self.run(request, &mut state).await;
        match result {
            Ok(ref vote) => info!(
                "Vote {} committed in election {}",
                vote.id, vote.election_id
            ),
            Err(ref err) if err.is_system_error() => {
                error!("Vote submission failed after '{state}': {err}")
            }
            Err(ref err) => warn!("Vote submission rejected after '{state}': {err}"),
        }
        result
    }

    async fn run(&self, request: &VoteRequest, state: &mut SubmissionState) -> Result<Vote> {
        // Cheap early rejection. The unit of work below re-checks everything
        // that matters against concurrent submissions.
        let (token, election) =
            VotingToken::resolve_election(&self.tokens, &self.elections, &request.token).await?;
        *state = SubmissionState::TokenValidated;

        let candidate_filter = doc! {
            "_id": request.candidate_id,
            "election_id": election.id,
        };
        if self.candidates.find_one(candidate_filter, None).await?.is_none() {
            return Err(Error::UnknownCandidate);
        }

        let mut uow = UnitOfWork::begin(&self.client).await?;
        match self
            .record_and_consume(&mut uow, election.id, request.candidate_id, token.id, state)
            .await
        {
            Ok(vote) => {
                uow.commit().await?;
                *state = SubmissionState::Committed;
                Ok(vote)
            }
            Err(err) => {
                if let Err(abort_err) = uow.rollback().await {
                    debug!("Ignoring failed abort of vote transaction: {abort_err}");
                }
                Err(err)
            }
        }
    }

    async fn record_and_consume(
        &self,
        uow: &mut UnitOfWork,
        election_id: Id,
        candidate_id: Id,
        token_id: Id,
        state: &mut SubmissionState,
    ) -> Result<Vote> {
        let vote = Vote::record(
            &self.votes,
            &self.candidates,
            election_id,
            candidate_id,
            token_id,
            uow.session(),
        )
        .await?;
        *state = SubmissionState::VoteRecorded;

        let consumed = VotingToken::mark_used(&self.tokens, token_id, uow.session())
            .await
            .map_err(conflict_as_duplicate)?;
        if !consumed {
            return Err(Error::DuplicateVote);
        }
        *state = SubmissionState::TokenConsumed;

        Ok(vote)
    }
}

/// Another transaction got to the same token first. Every other storage
/// failure stays a system error, since nothing was committed.
fn conflict_as_duplicate(err: Error) -> Error {
    match err {
        Error::Db(ref db_err) if is_write_conflict(db_err) => Error::DuplicateVote,
        err => err,
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VotingCoordinator {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwraps are safe as both are always managed.
        let client = req.guard::<&State<Client>>().await.unwrap();
        let db = req.guard::<&State<Database>>().await.unwrap();
        Outcome::Success(Self::new(client.inner().clone(), db))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use mongodb::{
        bson::{doc, from_document},
        error::{
            CommandError, Error as DbError, ErrorKind, WriteConcernError, WriteFailure,
            TRANSIENT_TRANSACTION_ERROR,
        },
    };
    use rocket::local::asynchronous::Client;

    use super::*;
    use crate::model::{
        common::ElectionStatus,
        db::{candidate::CandidateCore, election::ElectionCore, token::DEFAULT_MAX_TOKEN_BATCH},
    };

    #[test]
    fn other_errors_pass_through() {
        let err = conflict_as_duplicate(Error::UnknownCandidate);
        assert!(matches!(err, Error::UnknownCandidate));
    }

    #[test]
    fn write_conflict_is_duplicate() {
        let conflict: CommandError = from_document(doc! {
            "code": 112,
            "codeName": "WriteConflict",
            "errmsg": "write conflict during plan execution",
        })
        .unwrap();
        let err = conflict_as_duplicate(Error::Db(ErrorKind::Command(conflict).into()));
        assert!(matches!(err, Error::DuplicateVote));
    }

    #[test]
    fn transient_storage_failure_is_system_error() {
        let shutdown: WriteConcernError = from_document(doc! {
            "code": 91,
            "codeName": "ShutdownInProgress",
            "errmsg": "the server is shutting down",
            "errorLabels": [TRANSIENT_TRANSACTION_ERROR],
        })
        .unwrap();
        let db_err: DbError = ErrorKind::Write(WriteFailure::WriteConcernError(shutdown)).into();
        assert!(db_err.contains_label(TRANSIENT_TRANSACTION_ERROR));

        let err = conflict_as_duplicate(Error::Db(db_err));
        assert!(matches!(err, Error::Db(_)));
        assert!(err.is_system_error());
    }

    #[backend_test]
    async fn submit_round_trip(client: Client, db: Database) {
        let coordinator = coordinator(&client, &db);
        let (election, candidates) = insert_election(&db, ElectionStatus::Active).await;
        let token = issue_tokens(&db, &election, 1).await.remove(0);

        let tokens = Coll::<VotingToken>::from_db(&db);
        let found = VotingToken::lookup(&tokens, &token.token.token).await.unwrap();
        assert_eq!(found.id, token.id);
        assert_eq!(found.election_id, election.id);
        assert!(!found.is_used);
        assert!(matches!(
            VotingToken::lookup(&tokens, "missing").await,
            Err(Error::NotFound(_))
        ));

        let request = VoteRequest {
            token: token.token.token.clone(),
            candidate_id: candidates[1].id,
        };
        let vote = coordinator.submit(&request).await.unwrap();
        assert_eq!(vote.election_id, election.id);
        assert_eq!(vote.candidate_id, candidates[1].id);
        assert_eq!(vote.token_id, token.id);

        let used = VotingToken::lookup(&tokens, &token.token.token).await.unwrap();
        assert!(used.is_used);
        assert!(used.used_at.is_some());

        // A second submission is refused by the token check before it reaches
        // the ledger, so it reports an invalid token rather than a duplicate.
        let result = coordinator.submit(&request).await;
        assert!(matches!(result, Err(Error::InvalidOrExpiredToken)));
        assert_eq!(count_votes(&db, election.id).await, 1);
    }

    #[backend_test]
    async fn vote_and_token_are_atomic(client: Client, db: Database) {
        let coordinator = coordinator(&client, &db);
        let (election, candidates) = insert_election(&db, ElectionStatus::Active).await;
        let token = issue_tokens(&db, &election, 1).await.remove(0);

        // A vote already exists for this token, although the token looks unused.
        Coll::<Vote>::from_db(&db)
            .insert_one(
                Vote {
                    id: Id::new(),
                    vote: crate::model::db::vote::VoteCore {
                        election_id: election.id,
                        candidate_id: candidates[0].id,
                        token_id: token.id,
                        voted_at: chrono::Utc::now(),
                    },
                },
                None,
            )
            .await
            .unwrap();

        let request = VoteRequest {
            token: token.token.token.clone(),
            candidate_id: candidates[1].id,
        };
        let result = coordinator.submit(&request).await;
        assert!(matches!(result, Err(Error::DuplicateVote)));

        // The token was not consumed and no second vote appeared.
        let tokens = Coll::<VotingToken>::from_db(&db);
        let token = VotingToken::lookup(&tokens, &token.token.token).await.unwrap();
        assert!(!token.is_used);
        assert_eq!(count_votes(&db, election.id).await, 1);
    }

    #[backend_test]
    async fn concurrent_submissions_single_winner(client: Client, db: Database) {
        let first = coordinator(&client, &db);
        let second = first.clone();
        let (election, candidates) = insert_election(&db, ElectionStatus::Active).await;
        let token = issue_tokens(&db, &election, 1).await.remove(0);

        let request_a = VoteRequest {
            token: token.token.token.clone(),
            candidate_id: candidates[0].id,
        };
        let request_b = VoteRequest {
            token: token.token.token.clone(),
            candidate_id: candidates[1].id,
        };
        let (a, b) = rocket::tokio::join!(first.submit(&request_a), second.submit(&request_b));

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        for result in [a, b] {
            assert!(matches!(
                result,
                Ok(_) | Err(Error::DuplicateVote) | Err(Error::InvalidOrExpiredToken)
            ));
        }

        assert_eq!(count_votes(&db, election.id).await, 1);
        let tokens = Coll::<VotingToken>::from_db(&db);
        let token = VotingToken::lookup(&tokens, &token.token.token).await.unwrap();
        assert!(token.is_used);
    }

    #[backend_test]
    async fn many_tokens_many_votes(client: Client, db: Database) {
        let coordinator = coordinator(&client, &db);
        let (election, candidates) = insert_election(&db, ElectionStatus::Active).await;
        let tokens = issue_tokens(&db, &election, 10).await;

        for (i, token) in tokens.iter().enumerate() {
            let request = VoteRequest {
                token: token.token.token.clone(),
                candidate_id: candidates[i % 2].id,
            };
            coordinator.submit(&request).await.unwrap();
        }

        let counts = Vote::counts_by_candidate(
            &Coll::from_db(&db),
            &Coll::from_db(&db),
            election.id,
        )
        .await
        .unwrap();
        let total: u64 = counts.iter().map(|c| c.count).sum();
        assert_eq!(total, 10);
        assert_eq!(counts.len(), candidates.len());
    }

    #[backend_test]
    async fn inactive_elections_reject_tokens(client: Client, db: Database) {
        let coordinator = coordinator(&client, &db);
        for status in [ElectionStatus::Draft, ElectionStatus::Completed] {
            let (election, candidates) = insert_election(&db, status).await;
            let token = issue_tokens(&db, &election, 1).await.remove(0);

            let result = coordinator.ballot_paper(&token.token.token).await;
            assert!(matches!(result, Err(Error::InvalidOrExpiredToken)));

            let request = VoteRequest {
                token: token.token.token.clone(),
                candidate_id: candidates[0].id,
            };
            let result = coordinator.submit(&request).await;
            assert!(matches!(result, Err(Error::InvalidOrExpiredToken)));
            assert_eq!(count_votes(&db, election.id).await, 0);
        }
    }

    #[backend_test]
    async fn unknown_tokens_rejected(client: Client, db: Database) {
        let coordinator = coordinator(&client, &db);
        let (_, candidates) = insert_election(&db, ElectionStatus::Active).await;

        for token in ["", "not-a-token", "00000000000000000000000000000000"] {
            let request = VoteRequest {
                token: token.to_string(),
                candidate_id: candidates[0].id,
            };
            let result = coordinator.submit(&request).await;
            assert!(matches!(result, Err(Error::InvalidOrExpiredToken)));
        }
    }

    #[backend_test]
    async fn foreign_candidate_rejected(client: Client, db: Database) {
        let coordinator = coordinator(&client, &db);
        let (election, _) = insert_election(&db, ElectionStatus::Active).await;
        let (other_election, other_candidates) =
            insert_election(&db, ElectionStatus::Active).await;
        let token = issue_tokens(&db, &election, 1).await.remove(0);

        for candidate_id in [other_candidates[0].id, Id::new()] {
            let request = VoteRequest {
                token: token.token.token.clone(),
                candidate_id,
            };
            let result = coordinator.submit(&request).await;
            assert!(matches!(result, Err(Error::UnknownCandidate)));
        }

        assert_eq!(count_votes(&db, election.id).await, 0);
        assert_eq!(count_votes(&db, other_election.id).await, 0);
        let tokens = Coll::<VotingToken>::from_db(&db);
        let token = VotingToken::lookup(&tokens, &token.token.token).await.unwrap();
        assert!(!token.is_used);
    }

    #[backend_test]
    async fn draft_becomes_votable_when_activated(client: Client, db: Database) {
        let coordinator = coordinator(&client, &db);
        let (election, candidates) = insert_election(&db, ElectionStatus::Draft).await;
        let token = issue_tokens(&db, &election, 1).await.remove(0);
        let request = VoteRequest {
            token: token.token.token.clone(),
            candidate_id: candidates[0].id,
        };

        let result = coordinator.submit(&request).await;
        assert!(matches!(result, Err(Error::InvalidOrExpiredToken)));

        Coll::<Election>::from_db(&db)
            .update_one(
                election.id.as_doc(),
                doc! { "$set": { "status": ElectionStatus::Active } },
                None,
            )
            .await
            .unwrap();

        coordinator.submit(&request).await.unwrap();
        assert_eq!(count_votes(&db, election.id).await, 1);
    }

    #[backend_test]
    async fn ballot_paper_lists_candidates_in_order(client: Client, db: Database) {
        let coordinator = coordinator(&client, &db);
        let (election, candidates) = insert_election(&db, ElectionStatus::Active).await;
        let token = issue_tokens(&db, &election, 1).await.remove(0);

        let ballot = coordinator.ballot_paper(&token.token.token).await.unwrap();
        assert_eq!(ballot.election.id, election.id);
        let ids = ballot.candidates.iter().map(|c| c.id).collect::<Vec<_>>();
        let expected = candidates.iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids, expected);
    }

    #[backend_test]
    async fn generated_tokens_are_unique(db: Database) {
        let (election, _) = insert_election(&db, ElectionStatus::Draft).await;
        let tokens = issue_tokens(&db, &election, 500).await;
        let distinct = tokens
            .iter()
            .map(|t| t.token.token.clone())
            .collect::<HashSet<_>>();
        assert_eq!(distinct.len(), 500);
    }

    fn coordinator(client: &Client, db: &Database) -> VotingCoordinator {
        let db_client = client.rocket().state::<mongodb::Client>().unwrap();
        VotingCoordinator::new(db_client.clone(), db)
    }

    /// Insert an election with three candidates, returned in ballot order.
    async fn insert_election(
        db: &Database,
        status: ElectionStatus,
    ) -> (Election, Vec<Candidate>) {
        let election = Election {
            id: Id::new(),
            election: ElectionCore::example(status, Id::new()),
        };
        Coll::<Election>::from_db(db)
            .insert_one(&election, None)
            .await
            .unwrap();

        let candidates = ["Ada", "Grace", "Barbara"]
            .into_iter()
            .enumerate()
            .map(|(order, name)| Candidate {
                id: Id::new(),
                candidate: CandidateCore::example(election.id, name, order as i32),
            })
            .collect::<Vec<_>>();
        Coll::<Candidate>::from_db(db)
            .insert_many(&candidates, None)
            .await
            .unwrap();

        (election, candidates)
    }

    async fn issue_tokens(
        db: &Database,
        election: &Election,
        count: i64,
    ) -> Vec<VotingToken> {
        let tokens = Coll::<VotingToken>::from_db(db);
        VotingToken::generate(&tokens, election, count, DEFAULT_MAX_TOKEN_BATCH)
            .await
            .unwrap()
    }

    async fn count_votes(db: &Database, election_id: Id) -> u64 {
        Coll::<Vote>::from_db(db)
            .count_documents(doc! { "election_id": election_id }, None)
            .await
            .unwrap()
    }
}
