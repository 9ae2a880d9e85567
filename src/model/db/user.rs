use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use log::warn;
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    api::credentials::UserCredentials,
    common::Role,
    mongodb::{Coll, Id},
};

/// Username of the superadmin created on first launch.
pub const DEFAULT_SUPERADMIN_USERNAME: &str = "superadmin";

/// Core administrative user data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Check whether the given password is correct.
    ///
    /// A malformed stored hash is treated as a mismatch.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Ensure that at least one superadmin exists, creating the default one if not.
///
/// This operation is idempotent.
pub async fn ensure_superadmin_exists(users: &Coll<NewUser>, password: &str) -> Result<()> {
    let filter = doc! { "role": Role::SuperAdmin };
    if users.count_documents(filter, None).await? > 0 {
        return Ok(());
    }

    warn!("No superadmin found, creating default user '{DEFAULT_SUPERADMIN_USERNAME}'");
    let credentials = UserCredentials {
        username: DEFAULT_SUPERADMIN_USERNAME.to_string(),
        password: password.to_string(),
        role: Role::SuperAdmin,
    };
    let user = NewUser::from_credentials(credentials)?;
    users.insert_one(user, None).await?;
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl UserCore {
        pub fn example_admin() -> Self {
            Self::from_credentials(UserCredentials::example_admin()).unwrap()
        }

        pub fn example_admin2() -> Self {
            Self::from_credentials(UserCredentials::example_admin2()).unwrap()
        }

        pub fn example_superadmin() -> Self {
            Self::from_credentials(UserCredentials::example_superadmin()).unwrap()
        }
    }
}
