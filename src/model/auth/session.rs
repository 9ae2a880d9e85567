use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::debug;
use rocket::{
    http::{Cookie, CookieJar, SameSite},
    time::Duration,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{auth::Principal, db::user::User, mongodb::Coll};
use crate::Config;

pub const SESSION_COOKIE: &str = "session";

/// Session cookie claims: the principal plus an expiry datetime.
///
/// The role is a closed enum, so a token carrying any other role value fails
/// to decode.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    principal: Principal,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

impl Principal {
    /// Sign this principal into a session cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            principal: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(SESSION_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Verify and decode a session cookie value.
    ///
    /// Any failure, including a bad signature, expiry, or unrecognised role,
    /// is reported as [`Error::Unauthenticated`].
    pub fn from_session(value: &str, config: &Config) -> Result<Self> {
        jsonwebtoken::decode(
            value,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| data.claims.principal)
        .map_err(|e| {
            debug!("Rejected session: {e}");
            Error::Unauthenticated
        })
    }
}

/// Maps session state to a typed [`Principal`].
///
/// Everything it needs is handed to it at construction.
pub struct SessionResolver<'a> {
    config: &'a Config,
    users: Coll<User>,
}

impl<'a> SessionResolver<'a> {
    pub fn new(config: &'a Config, users: Coll<User>) -> Self {
        Self { config, users }
    }

    /// Resolve the session in the given cookies.
    ///
    /// The session must be present and valid, and must still describe an
    /// existing user holding the same role. Otherwise the request is
    /// unauthenticated.
    pub async fn resolve(&self, cookies: &CookieJar<'_>) -> Result<Principal> {
        let cookie = cookies.get(SESSION_COOKIE).ok_or(Error::Unauthenticated)?;
        let principal = Principal::from_session(cookie.value(), self.config)?;

        let user = self
            .users
            .find_one(principal.id.as_doc(), None)
            .await?
            .ok_or(Error::Unauthenticated)?;
        if user.role != principal.role {
            debug!("Session role for {} no longer matches the user record", principal.id);
            return Err(Error::Unauthenticated);
        }

        Ok(principal)
    }
}
