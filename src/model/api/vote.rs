use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{candidate::CandidateDescription, election::ElectionDescription},
    db::vote::Vote,
    mongodb::{hex_id, Id},
    pagination::PaginationResult,
};

/// What a voter sees after presenting a valid token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPaper {
    pub election: ElectionDescription,
    /// In display order.
    pub candidates: Vec<CandidateDescription>,
}

/// A vote submission from an anonymous voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub token: String,
    #[serde(with = "hex_id")]
    pub candidate_id: Id,
}

/// Confirmation that a vote was committed. Deliberately says nothing about
/// the token or the choice made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    #[serde(with = "hex_id")]
    pub election_id: Id,
    pub voted_at: DateTime<Utc>,
}

impl From<&Vote> for VoteReceipt {
    fn from(vote: &Vote) -> Self {
        Self {
            election_id: vote.election_id,
            voted_at: vote.voted_at,
        }
    }
}

/// A recorded vote, as listed to an election's admins.
///
/// The token is left out so the listing alone cannot be joined against the
/// token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    #[serde(with = "hex_id")]
    pub candidate_id: Id,
    pub voted_at: DateTime<Utc>,
}

impl From<Vote> for VoteDescription {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id,
            candidate_id: vote.vote.candidate_id,
            voted_at: vote.vote.voted_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VotePage {
    pub votes: Vec<VoteDescription>,
    pub pagination: PaginationResult,
}
