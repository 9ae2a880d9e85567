use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    auth::Principal,
    common::Role,
    db::election_admin::ElectionAdmin,
    mongodb::{Coll, Id},
};

/// Check that a principal is present and holds at least the given role.
pub fn require_role(principal: Option<&Principal>, minimum: Role) -> Result<&Principal> {
    let principal = principal.ok_or(Error::Unauthenticated)?;
    if principal.role.satisfies(minimum) {
        Ok(principal)
    } else {
        Err(Error::Forbidden)
    }
}

/// May this principal act on the given election?
///
/// Superadmins may act on any election, whether or not it exists. Admins may
/// only act on elections they have been assigned to, so a nonexistent election
/// is always refused.
pub async fn can_access_election(
    principal: &Principal,
    election_id: Id,
    assignments: &Coll<ElectionAdmin>,
) -> Result<bool> {
    match principal.role {
        Role::SuperAdmin => Ok(true),
        Role::Admin => {
            let filter = doc! {
                "election_id": election_id,
                "user_id": principal.id,
            };
            Ok(assignments.find_one(filter, None).await?.is_some())
        }
    }
}

/// Like [`can_access_election`], but fails with [`Error::Forbidden`] when
/// access is refused. Call this before touching any election-scoped data.
pub async fn authorize_election(
    principal: &Principal,
    election_id: Id,
    assignments: &Coll<ElectionAdmin>,
) -> Result<()> {
    if can_access_election(principal, election_id, assignments).await? {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}
