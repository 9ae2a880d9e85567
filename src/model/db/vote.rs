use std::cmp::Reverse;
use std::collections::HashMap;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, from_document, serde_helpers::chrono_datetime_as_bson_datetime},
    options::FindOptions,
    ClientSession,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::report::CandidateCount,
    db::candidate::Candidate,
    mongodb::{is_duplicate_key_error, is_write_conflict, Coll, Id},
    pagination::Pagination,
};

/// Core vote data, as stored in the database.
///
/// Votes are never updated or deleted individually once recorded. The only
/// way a vote leaves the ledger is the cascade when its whole election is
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub election_id: Id,
    pub candidate_id: Id,
    /// Unique across all votes, enforced by an index.
    pub token_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voted_at: DateTime<Utc>,
}

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Vote {
    /// Record a vote as part of a unit of work.
    ///
    /// Fails with [`Error::UnknownCandidate`] if the candidate is not part of
    /// the election, and with [`Error::DuplicateVote`] if a vote already exists
    /// for this token (or another transaction is writing one concurrently).
    pub async fn record(
        votes: &Coll<Vote>,
        candidates: &Coll<Candidate>,
        election_id: Id,
        candidate_id: Id,
        token_id: Id,
        session: &mut ClientSession,
    ) -> Result<Vote> {
        let candidate_filter = doc! {
            "_id": candidate_id,
            "election_id": election_id,
        };
        candidates
            .find_one_with_session(candidate_filter, None, session)
            .await?
            .ok_or(Error::UnknownCandidate)?;

        let vote = Vote {
            id: Id::new(),
            vote: VoteCore {
                election_id,
                candidate_id,
                token_id,
                voted_at: Utc::now(),
            },
        };
        match votes.insert_one_with_session(&vote, None, session).await {
            Ok(_) => Ok(vote),
            Err(err) if is_duplicate_key_error(&err) || is_write_conflict(&err) => {
                Err(Error::DuplicateVote)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Count the votes for every candidate in an election, including those
    /// with none. Sorted by count descending, ties broken by name ascending.
    pub async fn counts_by_candidate(
        votes: &Coll<Vote>,
        candidates: &Coll<Candidate>,
        election_id: Id,
    ) -> Result<Vec<CandidateCount>> {
        let filter = doc! { "election_id": election_id };
        let election_candidates: Vec<Candidate> = candidates
            .find(filter.clone(), None)
            .await?
            .try_collect()
            .await?;

        let pipeline = [
            doc! { "$match": filter },
            doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
        ];
        let groups: Vec<_> = votes
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;
        let mut counts = HashMap::with_capacity(groups.len());
        for group in groups {
            let group: VoteGroup = from_document(group)?;
            counts.insert(group.candidate_id, group.count);
        }

        Ok(tally(election_candidates, &counts))
    }

    /// A page of the votes cast in an election, most recent first.
    pub async fn list(
        votes: &Coll<Vote>,
        election_id: Id,
        pagination: &Pagination,
    ) -> Result<(Vec<Vote>, u64)> {
        let filter = doc! { "election_id": election_id };
        let total = votes.count_documents(filter.clone(), None).await?;
        let options = FindOptions::builder()
            .sort(doc! { "voted_at": -1, "_id": -1 })
            .skip(pagination.skip())
            .limit(pagination.page_size() as i64)
            .build();
        let page = votes.find(filter, options).await?.try_collect().await?;
        Ok((page, total))
    }
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

/// One row of the `$group` stage in [`Vote::counts_by_candidate`].
#[derive(Deserialize)]
struct VoteGroup {
    #[serde(rename = "_id")]
    candidate_id: Id,
    count: u64,
}

/// Combine candidates with their vote counts into an ordered result table.
fn tally(candidates: Vec<Candidate>, counts: &HashMap<Id, u64>) -> Vec<CandidateCount> {
    let mut table = candidates
        .into_iter()
        .map(|candidate| CandidateCount {
            count: counts.get(&candidate.id).copied().unwrap_or(0),
            candidate_id: candidate.id,
            name: candidate.candidate.name,
        })
        .collect::<Vec<_>>();
    table.sort_by(|a, b| {
        Reverse(a.count)
            .cmp(&Reverse(b.count))
            .then_with(|| a.name.cmp(&b.name))
    });
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::db::candidate::NewCandidate;

    fn candidate(name: &str) -> Candidate {
        Candidate {
            id: Id::new(),
            candidate: NewCandidate::example(Id::new(), name, 0),
        }
    }

    #[test]
    fn tally_orders_by_count_then_name() {
        let (alice, bob, carol, dave) = (
            candidate("Alice"),
            candidate("Bob"),
            candidate("Carol"),
            candidate("Dave"),
        );
        let counts = HashMap::from([(alice.id, 3), (bob.id, 7), (carol.id, 3)]);

        let table = tally(vec![dave, carol, bob, alice], &counts);
        let summary = table
            .iter()
            .map(|row| (row.name.as_str(), row.count))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![("Bob", 7), ("Alice", 3), ("Carol", 3), ("Dave", 0)]
        );
    }

    #[test]
    fn tally_ignores_votes_for_unlisted_candidates() {
        let alice = candidate("Alice");
        let counts = HashMap::from([(Id::new(), 10)]);

        let table = tally(vec![alice.clone()], &counts);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].candidate_id, alice.id);
        assert_eq!(table[0].count, 0);
    }

    #[test]
    fn tally_of_nothing_is_empty() {
        assert!(tally(Vec::new(), &HashMap::new()).is_empty());
    }
}
