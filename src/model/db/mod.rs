//! DB-compatible (e.g. de/serialisable) types, and the operations on them.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod candidate;
pub mod election;
pub mod election_admin;
pub mod stats;
pub mod token;
pub mod user;
pub mod vote;

pub use candidate::{Candidate, NewCandidate};
pub use election::{Election, NewElection};
pub use election_admin::ElectionAdmin;
pub use token::VotingToken;
pub use user::{NewUser, User};
pub use vote::Vote;
