use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::Role,
    db::user::User,
    mongodb::{hex_id, Id},
};

/// A user, as listed to superadmins. Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.user.username,
            role: user.user.role,
            created_at: user.user.created_at,
        }
    }
}

/// A request to give an admin authority over an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignAdminRequest {
    #[serde(with = "hex_id")]
    pub user_id: Id,
}
