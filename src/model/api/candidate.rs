use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::candidate::{Candidate, NewCandidate},
    mongodb::{hex_id, Id},
};

/// A candidate specification, as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub order: i32,
}

impl CandidateSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::BadRequest("Candidate name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn into_new_candidate(self, election_id: Id) -> NewCandidate {
        NewCandidate {
            election_id,
            name: self.name,
            description: self.description,
            photo_url: self.photo_url,
            order: self.order,
        }
    }
}

/// A candidate, as shown on a ballot paper or to an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub name: String,
    pub description: String,
    pub photo_url: String,
    pub order: i32,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.candidate.name,
            description: candidate.candidate.description,
            photo_url: candidate.candidate.photo_url,
            order: candidate.candidate.order,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateSpec {
        pub fn example(name: &str, order: i32) -> Self {
            Self {
                name: name.to_string(),
                description: String::new(),
                photo_url: String::new(),
                order,
            }
        }
    }
}
