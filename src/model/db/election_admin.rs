use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Grants an admin authority over one election. Unique per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionAdmin {
    pub election_id: Id,
    pub user_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub assigned_at: DateTime<Utc>,
}

impl ElectionAdmin {
    pub fn new(election_id: Id, user_id: Id) -> Self {
        Self {
            election_id,
            user_id,
            assigned_at: Utc::now(),
        }
    }
}
