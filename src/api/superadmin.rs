use log::info;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            credentials::UserCredentials,
            election::{ElectionDescription, ElectionSpec},
            report::SuperAdminStats,
            user::{AssignAdminRequest, UserDescription},
        },
        auth::SuperAdmin,
        common::{ElectionStatus, Role},
        db::{
            candidate::Candidate,
            election::Election,
            election_admin::ElectionAdmin,
            stats::superadmin_stats,
            token::VotingToken,
            user::{NewUser, User},
            vote::Vote,
        },
        mongodb::{is_duplicate_key_error, Coll, Id, UnitOfWork},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        create_election,
        modify_election,
        delete_election,
        list_election_admins,
        assign_election_admin,
        list_users,
        create_user,
        dashboard,
    ]
}

#[get("/elections")]
async fn list_elections(
    _principal: SuperAdmin,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .build();
    let elections = elections
        .find(None, options)
        .await?
        .map_ok(ElectionDescription::from)
        .try_collect()
        .await?;
    Ok(Json(elections))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    principal: SuperAdmin,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    spec.validate()?;

    let election = Election {
        id: Id::new(),
        election: spec.0.into_new_election(principal.0.id),
    };
    elections.insert_one(&election, None).await?;

    info!("Election {} created by {}", election.id, principal.0.id);
    Ok(Json(election.into()))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    _principal: SuperAdmin,
    election_id: Id,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    spec.validate()?;

    let update = doc! {
        "$set": {
            "title": &spec.title,
            "description": &spec.description,
            "start_date": BsonDateTime::from_chrono(spec.start_date),
            "end_date": BsonDateTime::from_chrono(spec.end_date),
            "status": spec.status,
        }
    };
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    // An election that has opened never goes back to draft.
    let mut filter = election_id.as_doc();
    if spec.status == ElectionStatus::Draft {
        filter.insert("status", ElectionStatus::Draft);
    }
    let updated = elections
        .find_one_and_update(filter, update, options)
        .await?;
    let election = match updated {
        Some(election) => election,
        None => {
            return Err(match elections.find_one(election_id.as_doc(), None).await? {
                Some(_) => Error::Conflict(format!("Election {election_id} has already opened")),
                None => Error::not_found(format!("Election {election_id}")),
            });
        }
    };

    info!("Election {} updated, status {:?}", election.id, election.status);
    Ok(Json(election.into()))
}

/// Delete an election and everything belonging to it, all at once.
#[delete("/elections/<election_id>")]
async fn delete_election(
    _principal: SuperAdmin,
    election_id: Id,
    db_client: &State<Client>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    tokens: Coll<VotingToken>,
    votes: Coll<Vote>,
    assignments: Coll<ElectionAdmin>,
) -> Result<()> {
    let mut uow = UnitOfWork::begin(db_client).await?;

    let owned = doc! { "election_id": election_id };
    votes
        .delete_many_with_session(owned.clone(), None, uow.session())
        .await?;
    tokens
        .delete_many_with_session(owned.clone(), None, uow.session())
        .await?;
    candidates
        .delete_many_with_session(owned.clone(), None, uow.session())
        .await?;
    assignments
        .delete_many_with_session(owned, None, uow.session())
        .await?;
    let result = elections
        .delete_one_with_session(election_id.as_doc(), None, uow.session())
        .await?;

    if result.deleted_count == 0 {
        uow.rollback().await?;
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    uow.commit().await?;

    info!("Election {election_id} deleted with all its data");
    Ok(())
}

#[get("/elections/<election_id>/admins")]
async fn list_election_admins(
    _principal: SuperAdmin,
    election_id: Id,
    assignments: Coll<ElectionAdmin>,
    users: Coll<User>,
) -> Result<Json<Vec<UserDescription>>> {
    let user_ids: Vec<Id> = assignments
        .find(doc! { "election_id": election_id }, None)
        .await?
        .map_ok(|assignment| assignment.user_id)
        .try_collect()
        .await?;

    let filter = doc! { "_id": { "$in": user_ids } };
    let options = FindOptions::builder().sort(doc! { "username": 1 }).build();
    let admins = users
        .find(filter, options)
        .await?
        .map_ok(UserDescription::from)
        .try_collect()
        .await?;
    Ok(Json(admins))
}

/// Give an admin authority over an election. Assigning twice is harmless.
#[post("/elections/<election_id>/admins", data = "<request>", format = "json")]
async fn assign_election_admin(
    _principal: SuperAdmin,
    election_id: Id,
    request: Json<AssignAdminRequest>,
    elections: Coll<Election>,
    users: Coll<User>,
    assignments: Coll<ElectionAdmin>,
) -> Result<()> {
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    let user = users
        .find_one(request.user_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {}", request.user_id)))?;
    if user.role != Role::Admin {
        return Err(Error::BadRequest(
            "Only admins are assigned to elections".to_string(),
        ));
    }

    match assignments
        .insert_one(ElectionAdmin::new(election_id, user.id), None)
        .await
    {
        Ok(_) => {
            info!("Admin {} assigned to election {election_id}", user.id);
            Ok(())
        }
        Err(err) if is_duplicate_key_error(&err) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[get("/users")]
async fn list_users(_principal: SuperAdmin, users: Coll<User>) -> Result<Json<Vec<UserDescription>>> {
    let options = FindOptions::builder().sort(doc! { "username": 1 }).build();
    let users = users
        .find(None, options)
        .await?
        .map_ok(UserDescription::from)
        .try_collect()
        .await?;
    Ok(Json(users))
}

#[post("/users", data = "<credentials>", format = "json")]
async fn create_user(
    _principal: SuperAdmin,
    credentials: Json<UserCredentials>,
    users: Coll<User>,
) -> Result<Json<UserDescription>> {
    let user = User {
        id: Id::new(),
        user: NewUser::from_credentials(credentials.0)?,
    };
    match users.insert_one(&user, None).await {
        Ok(_) => {}
        Err(err) if is_duplicate_key_error(&err) => {
            return Err(Error::Conflict(format!(
                "Username already in use: {}",
                user.username
            )));
        }
        Err(err) => return Err(err.into()),
    }

    info!("User {} created with role {}", user.id, user.role);
    Ok(Json(user.into()))
}

#[get("/superadmin/dashboard")]
async fn dashboard(
    _principal: SuperAdmin,
    elections: Coll<Election>,
    users: Coll<User>,
    votes: Coll<Vote>,
) -> Json<SuperAdminStats> {
    Json(superadmin_stats(&elections, &users, &votes).await)
}
