//! Advisory statistics for dashboards and reports.
//!
//! Nothing in the voting or access-control paths depends on these numbers, so
//! a failed count is logged and reported as zero rather than failing the
//! request.

use log::warn;
use mongodb::bson::{doc, Document};
use rocket::futures::TryStreamExt;

use crate::model::{
    api::report::{AdminStats, ElectionStats, SuperAdminStats},
    auth::Principal,
    common::{ElectionStatus, Role},
    db::{
        candidate::Candidate, election::Election, election_admin::ElectionAdmin, token::VotingToken,
        user::User, vote::Vote,
    },
    mongodb::{Coll, Id, MongoCollection},
};

/// Count matching documents, treating failure as zero.
async fn advisory_count<T: MongoCollection>(coll: &Coll<T>, filter: Document) -> u64 {
    match coll.count_documents(filter, None).await {
        Ok(count) => count,
        Err(err) => {
            warn!("Ignoring failed statistics count on '{}': {err}", T::NAME);
            0
        }
    }
}

/// Token, vote and candidate totals for one election.
pub async fn election_stats(
    tokens: &Coll<VotingToken>,
    votes: &Coll<Vote>,
    candidates: &Coll<Candidate>,
    election_id: Id,
) -> ElectionStats {
    let filter = doc! { "election_id": election_id };
    let used = doc! { "election_id": election_id, "is_used": true };
    ElectionStats {
        total_tokens: advisory_count(tokens, filter.clone()).await,
        used_tokens: advisory_count(tokens, used).await,
        total_votes: advisory_count(votes, filter.clone()).await,
        total_candidates: advisory_count(candidates, filter).await,
    }
}

/// System-wide totals for the superadmin dashboard.
pub async fn superadmin_stats(
    elections: &Coll<Election>,
    users: &Coll<User>,
    votes: &Coll<Vote>,
) -> SuperAdminStats {
    SuperAdminStats {
        total_elections: advisory_count(elections, doc! {}).await,
        active_elections: advisory_count(elections, doc! { "status": ElectionStatus::Active })
            .await,
        total_admins: advisory_count(users, doc! { "role": Role::Admin }).await,
        total_votes: advisory_count(votes, doc! {}).await,
    }
}

/// Totals over the elections a principal may act on: the assigned ones for
/// an admin, every election for a superadmin.
pub async fn admin_stats(
    assignments: &Coll<ElectionAdmin>,
    elections: &Coll<Election>,
    principal: &Principal,
) -> AdminStats {
    let scope = match principal.role {
        Role::SuperAdmin => doc! {},
        Role::Admin => {
            let assigned_ids = assigned_elections(assignments, principal.id).await;
            doc! { "_id": { "$in": assigned_ids } }
        }
    };

    let mut active = scope.clone();
    active.insert("status", ElectionStatus::Active);
    AdminStats {
        assigned_elections: advisory_count(elections, scope).await,
        active_elections: advisory_count(elections, active).await,
    }
}

async fn assigned_elections(assignments: &Coll<ElectionAdmin>, user_id: Id) -> Vec<Id> {
    let listing = match assignments.find(doc! { "user_id": user_id }, None).await {
        Ok(cursor) => {
            cursor
                .map_ok(|assignment| assignment.election_id)
                .try_collect()
                .await
        }
        Err(err) => Err(err),
    };
    listing.unwrap_or_else(|err| {
        warn!("Ignoring failed assignment listing for {user_id}: {err}");
        Vec::new()
    })
}
