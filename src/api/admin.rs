use log::{debug, info};
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            candidate::{CandidateDescription, CandidateSpec},
            election::ElectionDescription,
            report::{AdminStats, ElectionReport},
            token::{GenerateTokensRequest, TokenDescription, TokenPage},
            vote::{VoteDescription, VotePage},
        },
        auth::{authorize_election, AnyAdmin},
        common::{ElectionStatus, Role},
        db::{
            candidate::Candidate,
            election::Election,
            election_admin::ElectionAdmin,
            stats::{admin_stats, election_stats},
            token::VotingToken,
            vote::Vote,
        },
        mongodb::{is_write_conflict, Coll, Id, UnitOfWork},
        pagination::Pagination,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        my_elections,
        dashboard,
        list_candidates,
        add_candidate,
        modify_candidate,
        delete_candidate,
        list_tokens,
        generate_tokens,
        list_votes,
        results,
    ]
}

/// The elections this admin may act on: every election for a superadmin.
#[get("/admin/elections")]
async fn my_elections(
    principal: AnyAdmin,
    elections: Coll<Election>,
    assignments: Coll<ElectionAdmin>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let filter = match principal.0.role {
        Role::SuperAdmin => doc! {},
        Role::Admin => {
            let assigned: Vec<Id> = assignments
                .find(doc! { "user_id": principal.0.id }, None)
                .await?
                .map_ok(|assignment| assignment.election_id)
                .try_collect()
                .await?;
            doc! { "_id": { "$in": assigned } }
        }
    };
    let options = FindOptions::builder()
        .sort(doc! { "start_date": -1, "_id": -1 })
        .build();
    let elections = elections
        .find(filter, options)
        .await?
        .map_ok(ElectionDescription::from)
        .try_collect()
        .await?;
    Ok(Json(elections))
}

#[get("/admin/dashboard")]
async fn dashboard(
    principal: AnyAdmin,
    assignments: Coll<ElectionAdmin>,
    elections: Coll<Election>,
) -> Json<AdminStats> {
    Json(admin_stats(&assignments, &elections, &principal.0).await)
}

#[get("/elections/<election_id>/candidates")]
async fn list_candidates(
    principal: AnyAdmin,
    election_id: Id,
    assignments: Coll<ElectionAdmin>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    authorize_election(&principal.0, election_id, &assignments).await?;

    let options = FindOptions::builder()
        .sort(doc! { "order": 1, "_id": 1 })
        .build();
    let candidates = candidates
        .find(doc! { "election_id": election_id }, options)
        .await?
        .map_ok(CandidateDescription::from)
        .try_collect()
        .await?;
    Ok(Json(candidates))
}

#[post("/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    principal: AnyAdmin,
    election_id: Id,
    spec: Json<CandidateSpec>,
    assignments: Coll<ElectionAdmin>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    authorize_election(&principal.0, election_id, &assignments).await?;
    spec.validate()?;
    find_election(&elections, election_id).await?;

    let candidate = Candidate {
        id: Id::new(),
        candidate: spec.0.into_new_candidate(election_id),
    };
    candidates.insert_one(&candidate, None).await?;

    info!("Candidate {} added to election {election_id}", candidate.id);
    Ok(Json(candidate.into()))
}

#[put(
    "/elections/<election_id>/candidates/<candidate_id>",
    data = "<spec>",
    format = "json"
)]
async fn modify_candidate(
    principal: AnyAdmin,
    election_id: Id,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    assignments: Coll<ElectionAdmin>,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    authorize_election(&principal.0, election_id, &assignments).await?;
    spec.validate()?;

    let filter = doc! {
        "_id": candidate_id,
        "election_id": election_id,
    };
    let update = doc! {
        "$set": {
            "name": &spec.name,
            "description": &spec.description,
            "photo_url": &spec.photo_url,
            "order": spec.order,
        }
    };
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let candidate = candidates
        .find_one_and_update(filter, update, options)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
    Ok(Json(candidate.into()))
}

/// Remove a candidate from an election that is still a draft.
///
/// The removal bumps the election's `candidate_revision` inside the same unit
/// of work, so it conflicts with the election opening concurrently. Votes can
/// therefore never reference a removed candidate.
#[delete("/elections/<election_id>/candidates/<candidate_id>")]
async fn delete_candidate(
    principal: AnyAdmin,
    election_id: Id,
    candidate_id: Id,
    db_client: &State<Client>,
    assignments: Coll<ElectionAdmin>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<()> {
    authorize_election(&principal.0, election_id, &assignments).await?;

    let mut uow = UnitOfWork::begin(db_client).await?;
    let removed = remove_candidate(
        &mut uow,
        &elections,
        &candidates,
        &votes,
        election_id,
        candidate_id,
    )
    .await;
    if let Err(err) = removed {
        if let Err(abort_err) = uow.rollback().await {
            debug!("Ignoring failed abort of candidate removal: {abort_err}");
        }
        return Err(err);
    }
    uow.commit().await?;

    info!("Candidate {candidate_id} removed from election {election_id}");
    Ok(())
}

async fn remove_candidate(
    uow: &mut UnitOfWork,
    elections: &Coll<Election>,
    candidates: &Coll<Candidate>,
    votes: &Coll<Vote>,
    election_id: Id,
    candidate_id: Id,
) -> Result<()> {
    let draft = doc! {
        "_id": election_id,
        "status": ElectionStatus::Draft,
    };
    let bump = doc! { "$inc": { "candidate_revision": 1 } };
    let touched = elections
        .update_one_with_session(draft, bump, None, uow.session())
        .await
        .map_err(|err| election_changed(err, election_id))?;
    if touched.matched_count == 0 {
        let exists = elections
            .find_one_with_session(election_id.as_doc(), None, uow.session())
            .await?
            .is_some();
        return Err(if exists {
            Error::Conflict(format!("Election {election_id} is no longer a draft"))
        } else {
            Error::not_found(format!("Election {election_id}"))
        });
    }

    let with_votes = doc! {
        "election_id": election_id,
        "candidate_id": candidate_id,
    };
    if votes
        .count_documents_with_session(with_votes, None, uow.session())
        .await?
        > 0
    {
        return Err(Error::Conflict(format!(
            "Candidate {candidate_id} has already received votes"
        )));
    }

    let filter = doc! {
        "_id": candidate_id,
        "election_id": election_id,
    };
    let result = candidates
        .delete_one_with_session(filter, None, uow.session())
        .await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    Ok(())
}

/// The election was changed by someone else mid-removal, e.g. it opened.
fn election_changed(err: DbError, election_id: Id) -> Error {
    if is_write_conflict(&err) {
        Error::Conflict(format!("Election {election_id} changed concurrently"))
    } else {
        err.into()
    }
}

#[get("/elections/<election_id>/tokens")]
async fn list_tokens(
    principal: AnyAdmin,
    election_id: Id,
    pagination: Pagination,
    assignments: Coll<ElectionAdmin>,
    tokens: Coll<VotingToken>,
) -> Result<Json<TokenPage>> {
    authorize_election(&principal.0, election_id, &assignments).await?;

    let (page, total) = VotingToken::list(&tokens, election_id, &pagination).await?;
    Ok(Json(TokenPage {
        tokens: page.into_iter().map(TokenDescription::from).collect(),
        pagination: pagination.result(total),
    }))
}

#[post("/elections/<election_id>/tokens", data = "<request>", format = "json")]
async fn generate_tokens(
    principal: AnyAdmin,
    election_id: Id,
    request: Json<GenerateTokensRequest>,
    assignments: Coll<ElectionAdmin>,
    elections: Coll<Election>,
    tokens: Coll<VotingToken>,
    config: &State<Config>,
) -> Result<Json<Vec<TokenDescription>>> {
    authorize_election(&principal.0, election_id, &assignments).await?;
    let election = find_election(&elections, election_id).await?;

    let generated =
        VotingToken::generate(&tokens, &election, request.count, config.max_token_batch()).await?;
    info!(
        "{} voting tokens issued for election {election_id} by {}",
        generated.len(),
        principal.0.id
    );
    Ok(Json(
        generated.into_iter().map(TokenDescription::from).collect(),
    ))
}

#[get("/elections/<election_id>/votes")]
async fn list_votes(
    principal: AnyAdmin,
    election_id: Id,
    pagination: Pagination,
    assignments: Coll<ElectionAdmin>,
    votes: Coll<Vote>,
) -> Result<Json<VotePage>> {
    authorize_election(&principal.0, election_id, &assignments).await?;

    let (page, total) = Vote::list(&votes, election_id, &pagination).await?;
    Ok(Json(VotePage {
        votes: page.into_iter().map(VoteDescription::from).collect(),
        pagination: pagination.result(total),
    }))
}

#[get("/elections/<election_id>/results")]
async fn results(
    principal: AnyAdmin,
    election_id: Id,
    assignments: Coll<ElectionAdmin>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    tokens: Coll<VotingToken>,
    votes: Coll<Vote>,
) -> Result<Json<ElectionReport>> {
    authorize_election(&principal.0, election_id, &assignments).await?;
    let election = find_election(&elections, election_id).await?;

    let results = Vote::counts_by_candidate(&votes, &candidates, election_id).await?;
    let stats = election_stats(&tokens, &votes, &candidates, election_id).await;
    Ok(Json(ElectionReport {
        election: election.into(),
        results,
        stats,
    }))
}

async fn find_election(elections: &Coll<Election>, election_id: Id) -> Result<Election> {
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}
