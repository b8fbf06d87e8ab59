use serde::Serialize;
use utoipa::ToSchema;

use crate::model::role::Role;
use crate::model::user::{RoleDetails, UserProfile};
use crate::services::SheetSync;

pub mod attendance;
pub mod payroll;
pub mod reports;
pub mod shifts;

/// Report sheet state after a ledger write. `synced = false` means the
/// change is stored but the sheet needs a manual regenerate.
#[derive(Debug, Serialize, ToSchema)]
pub struct SheetStatus {
    #[schema(example = true)]
    pub synced: bool,
    pub error: Option<String>,
}

impl From<SheetSync> for SheetStatus {
    fn from(sync: SheetSync) -> Self {
        match sync {
            SheetSync::Synced => SheetStatus {
                synced: true,
                error: None,
            },
            SheetSync::Failed { error } => SheetStatus {
                synced: false,
                error: Some(error),
            },
        }
    }
}

/// Flat view of a user for roster listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct Member {
    #[schema(example = "u-1001")]
    pub id: String,
    #[schema(example = "ada@example.com", format = "email")]
    pub email: String,
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Byron")]
    pub last_name: String,
    pub role: Role,
    pub locations: Vec<String>,
    /// Students only
    pub grade_level: Option<String>,
    /// Students only
    pub parent_contact: Option<String>,
    /// Tutors only
    pub google_meets_link: Option<String>,
}

impl From<UserProfile> for Member {
    fn from(user: UserProfile) -> Self {
        let role = user.role();
        let (grade_level, parent_contact, google_meets_link) = match user.details {
            RoleDetails::Student {
                grade_level,
                parent_contact,
            } => (grade_level, Some(parent_contact), None),
            RoleDetails::Tutor { google_meets_link } => (None, None, Some(google_meets_link)),
            _ => (None, None, None),
        };
        Member {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role,
            locations: user.tutoring_location,
            grade_level,
            parent_contact,
            google_meets_link,
        }
    }
}
