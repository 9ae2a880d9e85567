use serde::{Deserialize, Serialize};

use crate::model::{
    api::election::ElectionDescription,
    mongodb::{hex_id, Id},
};

/// The number of votes one candidate received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCount {
    #[serde(with = "hex_id")]
    pub candidate_id: Id,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionStats {
    pub total_tokens: u64,
    pub used_tokens: u64,
    pub total_votes: u64,
    pub total_candidates: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperAdminStats {
    pub total_elections: u64,
    pub active_elections: u64,
    pub total_admins: u64,
    pub total_votes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub assigned_elections: u64,
    pub active_elections: u64,
}

/// Results for one election: per-candidate counts, most votes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionReport {
    pub election: ElectionDescription,
    pub results: Vec<CandidateCount>,
    pub stats: ElectionStats,
}
