use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use log::error;
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    options::FindOptions,
    ClientSession,
};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::election::Election,
    mongodb::{is_duplicate_key_error, Coll, Id},
    pagination::Pagination,
};

/// Bytes of entropy in each voting token.
pub const TOKEN_BYTES: usize = 16;

/// Length of a token's string form: two hex digits per byte.
pub const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

/// Default upper bound on how many tokens one request may issue.
pub const DEFAULT_MAX_TOKEN_BATCH: u32 = 1000;

/// Core voting token data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingTokenCore {
    /// Foreign Key election ID. Fixed at creation.
    pub election_id: Id,
    /// The opaque bearer string handed to a voter. Unique across all elections.
    pub token: String,
    pub is_used: bool,
    #[serde(default, with = "optional_bson_datetime")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A voting token from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingToken {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub token: VotingTokenCore,
}

impl VotingToken {
    /// Create a fresh, unused token for the given election.
    pub fn new(election_id: Id, mut rng: impl RngCore + CryptoRng) -> Self {
        let mut bytes = [0_u8; TOKEN_BYTES];
        rng.fill_bytes(&mut bytes);
        Self {
            id: Id::new(),
            token: VotingTokenCore {
                election_id,
                token: HEXLOWER.encode(&bytes),
                is_used: false,
                used_at: None,
                created_at: Utc::now(),
            },
        }
    }

    /// Issue `count` new tokens for the given election.
    ///
    /// Tokens are inserted one at a time. If an insert fails part way through,
    /// the tokens already inserted stay valid and the error is returned.
    /// A collision on the unique token index is an error, never retried.
    pub async fn generate(
        tokens: &Coll<VotingToken>,
        election: &Election,
        count: i64,
        max_batch: u32,
    ) -> Result<Vec<VotingToken>> {
        let count = validate_count(count, max_batch)?;

        let mut generated = Vec::with_capacity(count);
        for _ in 0..count {
            let token = VotingToken::new(election.id, OsRng);
            if let Err(err) = tokens.insert_one(&token, None).await {
                if is_duplicate_key_error(&err) {
                    error!(
                        "Voting token collision in election {} after {} tokens",
                        election.id,
                        generated.len()
                    );
                }
                return Err(err.into());
            }
            generated.push(token);
        }

        Ok(generated)
    }

    /// Find a token by exact match on its string form.
    pub async fn lookup(tokens: &Coll<VotingToken>, token: &str) -> Result<VotingToken> {
        Self::find(tokens, token)
            .await?
            .ok_or_else(|| Error::not_found("Voting token"))
    }

    async fn find(tokens: &Coll<VotingToken>, token: &str) -> Result<Option<VotingToken>> {
        let filter = doc! { "token": token };
        Ok(tokens.find_one(filter, None).await?)
    }

    /// Find the election a token can currently be used to vote in.
    ///
    /// This only succeeds if the token exists, is unused, and belongs to an
    /// active election. Every other combination gives the same
    /// [`Error::InvalidOrExpiredToken`], so anonymous callers learn nothing
    /// about which check failed.
    pub async fn resolve_election(
        tokens: &Coll<VotingToken>,
        elections: &Coll<Election>,
        token: &str,
    ) -> Result<(VotingToken, Election)> {
        let token = Self::find(tokens, token)
            .await?
            .filter(|t| !t.is_used)
            .ok_or(Error::InvalidOrExpiredToken)?;
        let election = elections
            .find_one(token.election_id.as_doc(), None)
            .await?
            .filter(|e| e.status.accepts_votes())
            .ok_or(Error::InvalidOrExpiredToken)?;
        Ok((token, election))
    }

    /// Mark a token used as part of a unit of work.
    ///
    /// The update only matches a token that is still unused, so this returns
    /// `false` if the token had already been consumed.
    pub async fn mark_used(
        tokens: &Coll<VotingToken>,
        token_id: Id,
        session: &mut ClientSession,
    ) -> Result<bool> {
        let filter = doc! {
            "_id": token_id,
            "is_used": false,
        };
        let update = doc! {
            "$set": {
                "is_used": true,
                "used_at": mongodb::bson::DateTime::now(),
            }
        };
        let result = tokens
            .update_one_with_session(filter, update, None, session)
            .await?;
        Ok(result.modified_count == 1)
    }

    /// A page of the tokens issued for an election, newest first.
    pub async fn list(
        tokens: &Coll<VotingToken>,
        election_id: Id,
        pagination: &Pagination,
    ) -> Result<(Vec<VotingToken>, u64)> {
        let filter = doc! { "election_id": election_id };
        let total = tokens.count_documents(filter.clone(), None).await?;
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .skip(pagination.skip())
            .limit(pagination.page_size() as i64)
            .build();
        let page = tokens.find(filter, options).await?.try_collect().await?;
        Ok((page, total))
    }
}

impl Deref for VotingToken {
    type Target = VotingTokenCore;

    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl DerefMut for VotingToken {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.token
    }
}

/// Check a requested batch size, returning it as a `usize` if acceptable.
pub fn validate_count(count: i64, max_batch: u32) -> Result<usize> {
    if count <= 0 || count > i64::from(max_batch) {
        return Err(Error::InvalidCount(count, max_batch));
    }
    Ok(count as usize)
}

/// Like `chrono_datetime_as_bson_datetime`, but for an optional field.
mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .map(bson::DateTime::from_chrono)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(value.map(bson::DateTime::to_chrono))
    }
}
