use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    auth::{access::require_role, session::SessionResolver},
    common::Role,
    db::user::User,
    mongodb::{hex_id, Coll, Id},
};
use crate::Config;

/// An authenticated administrative actor: who they are and what role they hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub role: Role,
}

impl Principal {
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Principal {
    type Error = Error;

    /// Resolve the session cookie into a principal, failing closed on anything
    /// that cannot be validated.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwraps are safe as both are always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();

        let resolver = SessionResolver::new(config, Coll::from_db(db));
        match resolver.resolve(req.cookies()).await {
            Ok(principal) => Outcome::Success(principal),
            Err(e) => Outcome::Failure((e.status(), e)),
        }
    }
}

/// Guard for routes only superadmins may use.
#[derive(Debug, Clone, Copy)]
pub struct SuperAdmin(pub Principal);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SuperAdmin {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let principal = try_outcome!(req.guard::<Principal>().await);
        match require_role(Some(&principal), Role::SuperAdmin) {
            Ok(_) => Outcome::Success(SuperAdmin(principal)),
            Err(e) => Outcome::Failure((Status::Forbidden, e)),
        }
    }
}

/// Guard for routes any admin (including superadmins) may use. Routes taking
/// an election ID must still authorize against that election.
#[derive(Debug, Clone, Copy)]
pub struct AnyAdmin(pub Principal);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AnyAdmin {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let principal = try_outcome!(req.guard::<Principal>().await);
        match require_role(Some(&principal), Role::Admin) {
            Ok(_) => Outcome::Success(AnyAdmin(principal)),
            Err(e) => Outcome::Failure((Status::Forbidden, e)),
        }
    }
}
