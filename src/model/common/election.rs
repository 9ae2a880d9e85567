use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the election lifecycle. The status is advisory: nothing moves an
/// election between states except an explicit edit by a superadmin. An
/// election that has left `Draft` never returns to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Under construction. Tokens may be issued but are not yet accepted.
    #[default]
    Draft,
    /// Accepting votes.
    Active,
    /// Finished. Results remain readable, tokens are no longer accepted.
    Completed,
}

impl ElectionStatus {
    /// Only active elections accept votes.
    pub fn accepts_votes(self) -> bool {
        self == Self::Active
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_accepts_votes() {
        assert!(!ElectionStatus::Draft.accepts_votes());
        assert!(ElectionStatus::Active.accepts_votes());
        assert!(!ElectionStatus::Completed.accepts_votes());
    }

    #[test]
    fn new_elections_are_drafts() {
        assert_eq!(ElectionStatus::default(), ElectionStatus::Draft);
        assert_eq!(Bson::from(ElectionStatus::Active), Bson::String("active".into()));
    }
}
