use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Role {
    Student,
    Tutor,
    JuniorProjectManager,
    SeniorProjectManager,
    Admin,
}

impl Role {
    /// Roles that clock in and out and show up on payroll.
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::Student)
    }
}
