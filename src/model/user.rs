use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::model::role::Role;

/// Role-specific fields. Each role carries exactly its own set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum RoleDetails {
    #[serde(rename_all = "camelCase")]
    Student {
        grade_level: Option<String>,
        parent_contact: String,
    },
    #[serde(rename_all = "camelCase")]
    Tutor { google_meets_link: String },
    JuniorProjectManager,
    SeniorProjectManager,
    Admin,
}

impl RoleDetails {
    pub fn role(&self) -> Role {
        match self {
            RoleDetails::Student { .. } => Role::Student,
            RoleDetails::Tutor { .. } => Role::Tutor,
            RoleDetails::JuniorProjectManager => Role::JuniorProjectManager,
            RoleDetails::SeniorProjectManager => Role::SeniorProjectManager,
            RoleDetails::Admin => Role::Admin,
        }
    }

    /// Builds the variant for `role` from the optional columns a user row
    /// carries; columns that belong to other roles are ignored.
    pub fn from_columns(
        role: Role,
        grade_level: Option<String>,
        parent_contact: Option<String>,
        google_meets_link: Option<String>,
    ) -> Self {
        match role {
            Role::Student => RoleDetails::Student {
                grade_level,
                parent_contact: parent_contact.unwrap_or_default(),
            },
            Role::Tutor => RoleDetails::Tutor {
                google_meets_link: google_meets_link.unwrap_or_default(),
            },
            Role::JuniorProjectManager => RoleDetails::JuniorProjectManager,
            Role::SeniorProjectManager => RoleDetails::SeniorProjectManager,
            Role::Admin => RoleDetails::Admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Tutoring locations the user belongs to
    pub tutoring_location: Vec<String>,
    #[serde(flatten)]
    pub details: RoleDetails,
}

impl UserProfile {
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        tutoring_location: Vec<String>,
        details: RoleDetails,
    ) -> Result<Self, AppError> {
        let profile = UserProfile {
            id: id.into(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            tutoring_location,
            details,
        };

        if profile.id.trim().is_empty() {
            return Err(AppError::validation("user id must not be empty"));
        }
        if profile.first_name.trim().is_empty() || profile.last_name.trim().is_empty() {
            return Err(AppError::validation("first and last name are required"));
        }
        if !profile.email.is_empty() && !profile.email.contains('@') {
            return Err(AppError::validation(format!(
                "invalid email address: {}",
                profile.email
            )));
        }
        Ok(profile)
    }

    pub fn role(&self) -> Role {
        self.details.role()
    }
}
