//! API-friendly (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as plain hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Password hashes are never included.

pub mod candidate;
pub mod credentials;
pub mod election;
pub mod report;
pub mod token;
pub mod user;
pub mod vote;
