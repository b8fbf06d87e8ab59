use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Durable marker that a location's payroll for one period was confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApprovalRecord {
    #[schema(example = "Everett")]
    pub location: String,
    #[schema(example = "2025-8-16")]
    pub period_id: String,
    #[schema(value_type = String, format = "date-time")]
    pub approved_at: NaiveDateTime,
    #[schema(example = "approved")]
    pub status: String,
}

impl ApprovalRecord {
    pub const APPROVED: &'static str = "approved";

    pub fn new(location: impl Into<String>, period_id: impl Into<String>, at: NaiveDateTime) -> Self {
        ApprovalRecord {
            location: location.into(),
            period_id: period_id.into(),
            approved_at: at,
            status: Self::APPROVED.to_string(),
        }
    }

    /// Document key, `{location}_{period_id}`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.location, self.period_id)
    }
}

/// Approval state of one (location, period). The only transition is
/// `Unapproved -> Approved`; approving again replaces the timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ApprovalState {
    Unapproved,
    Approved {
        approved_at: NaiveDateTime,
    },
}

impl ApprovalState {
    pub fn from_record(record: Option<&ApprovalRecord>) -> Self {
        match record {
            Some(r) => ApprovalState::Approved {
                approved_at: r.approved_at,
            },
            None => ApprovalState::Unapproved,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalState::Approved { .. })
    }
}
