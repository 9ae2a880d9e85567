use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    candidate::Candidate,
    election::Election,
    election_admin::ElectionAdmin,
    token::VotingToken,
    user::{NewUser, User},
    vote::Vote,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// User collections
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}
impl MongoCollection for NewUser {
    const NAME: &'static str = USERS;
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}

// Voting token collection
impl MongoCollection for VotingToken {
    const NAME: &'static str = "voting_tokens";
}

// Vote collection
impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

// Election admin assignment collection
impl MongoCollection for ElectionAdmin {
    const NAME: &'static str = "election_admins";
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique indexes are what make token strings and vote-per-token
/// uniqueness structural rather than application checks.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // User collection.
    let user_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // Candidate collection.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "order": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Voting token collection.
    let token_indexes = [
        IndexModel::builder()
            .keys(doc! {"token": 1})
            .options(unique.clone())
            .build(),
        IndexModel::builder()
            .keys(doc! {"election_id": 1, "created_at": -1})
            .build(),
    ];
    Coll::<VotingToken>::from_db(db)
        .create_indexes(token_indexes, None)
        .await?;

    // Vote collection.
    let vote_indexes = [
        IndexModel::builder()
            .keys(doc! {"token_id": 1})
            .options(unique.clone())
            .build(),
        IndexModel::builder()
            .keys(doc! {"election_id": 1, "candidate_id": 1})
            .build(),
    ];
    Coll::<Vote>::from_db(db)
        .create_indexes(vote_indexes, None)
        .await?;

    // Election admin collection.
    let assignment_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "user_id": 1})
        .options(unique)
        .build();
    Coll::<ElectionAdmin>::from_db(db)
        .create_index(assignment_index, None)
        .await?;

    Ok(())
}
