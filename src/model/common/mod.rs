//! Types shared between the database and API representations.

mod election;
mod role;

pub use election::ElectionStatus;
pub use role::{Role, UnknownRole};
