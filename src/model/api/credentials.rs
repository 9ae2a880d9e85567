use argon2::Config;
use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::Role, db::user::NewUser};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Login details, received from a user. The password is in plaintext, so
/// this is never stored.
#[derive(Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Details of a new user to create, received from a superadmin. These are
/// never stored directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Admin
}

impl NewUser {
    /// Create a new user from credentials by hashing the password.
    /// This enforces that the username is non-empty, and the password meets minimum length.
    pub fn from_credentials(cred: UserCredentials) -> Result<Self> {
        if cred.username.trim().is_empty() {
            return Err(Error::BadRequest("Username must not be empty".to_string()));
        }
        if cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        OsRng.fill_bytes(&mut salt);
        let password_hash = argon2::hash_encoded(cred.password.as_bytes(), &salt, &Config::default())?;
        Ok(Self {
            username: cred.username,
            password_hash,
            role: cred.role,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl UserCredentials {
        pub fn example_admin() -> Self {
            Self {
                username: "returning-officer".into(),
                password: "count-every-vote".into(),
                role: Role::Admin,
            }
        }

        pub fn example_admin2() -> Self {
            Self {
                username: "deputy-officer".into(),
                password: "recount-please".into(),
                role: Role::Admin,
            }
        }

        pub fn example_superadmin() -> Self {
            Self {
                username: "chief-officer".into(),
                password: "totallysecurepassword".into(),
                role: Role::SuperAdmin,
            }
        }

        pub fn login(&self) -> LoginRequest {
            LoginRequest {
                username: self.username.clone(),
                password: self.password.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn reject_empty_username() {
        let cred = UserCredentials {
            username: "  ".into(),
            ..UserCredentials::example_admin()
        };
        assert!(matches!(NewUser::from_credentials(cred), Err(Error::BadRequest(_))));
    }

    #[test]
    fn reject_short_password() {
        let cred = UserCredentials {
            password: "short".into(),
            ..UserCredentials::example_admin()
        };
        assert!(matches!(NewUser::from_credentials(cred), Err(Error::BadRequest(_))));
    }

    #[test]
    fn password_is_hashed() {
        let cred = UserCredentials::example_superadmin();
        let user = NewUser::from_credentials(cred.clone()).unwrap();
        assert_eq!(user.username, cred.username);
        assert_eq!(user.role, Role::SuperAdmin);
        assert_ne!(user.password_hash, cred.password);
        assert!(user.verify_password(&cred.password));
    }

    #[test]
    fn role_defaults_to_admin() {
        let cred: UserCredentials =
            serde_json::from_str(r#"{"username": "bob", "password": "12345678"}"#).unwrap();
        assert_eq!(cred.role, Role::Admin);
    }

    #[test]
    fn unknown_role_rejected() {
        let result = serde_json::from_str::<UserCredentials>(
            r#"{"username": "bob", "password": "12345678", "role": "root"}"#,
        );
        assert!(result.is_err());
    }
}
