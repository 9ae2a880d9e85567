//! Authentication and authorization of administrative users.

pub mod access;
mod principal;
pub mod session;

pub use access::{authorize_election, can_access_election, require_role};
pub use principal::{AnyAdmin, Principal, SuperAdmin};
pub use session::{SessionResolver, SESSION_COOKIE};
