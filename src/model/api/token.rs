use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    db::token::VotingToken,
    mongodb::{hex_id, Id},
    pagination::PaginationResult,
};

/// A request to issue a batch of voting tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateTokensRequest {
    pub count: i64,
}

/// A voting token, as shown to the admins who distribute them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub token: String,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<VotingToken> for TokenDescription {
    fn from(token: VotingToken) -> Self {
        Self {
            id: token.id,
            token: token.token.token,
            is_used: token.token.is_used,
            used_at: token.token.used_at,
            created_at: token.token.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPage {
    pub tokens: Vec<TokenDescription>,
    pub pagination: PaginationResult,
}
