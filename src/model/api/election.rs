use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::ElectionStatus,
    db::election::{Election, NewElection},
    mongodb::{hex_id, Id},
};

/// An election specification, as submitted by a superadmin to create or
/// edit an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Ignored on creation: new elections always start as drafts.
    #[serde(default)]
    pub status: ElectionStatus,
}

impl ElectionSpec {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::BadRequest("Election title must not be empty".to_string()));
        }
        if self.end_date <= self.start_date {
            return Err(Error::BadRequest(
                "Election must end after it starts".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a new draft election created by the given user.
    pub fn into_new_election(self, created_by: Id) -> NewElection {
        NewElection {
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            status: ElectionStatus::Draft,
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// An election, as described to an admin or voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ElectionStatus,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            title: election.election.title,
            description: election.election.description,
            start_date: election.election.start_date,
            end_date: election.election.end_date,
            status: election.election.status,
        }
    }
}
