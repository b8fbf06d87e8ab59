use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceEntry {
    pub status: AttendanceStatus,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_edited: Option<NaiveDateTime>,
}

/// All marks for one location on one day, keyed by student id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub location: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub student: BTreeMap<String, AttendanceEntry>,
}

impl AttendanceRecord {
    pub fn new(location: impl Into<String>, date: NaiveDate) -> Self {
        AttendanceRecord {
            location: location.into(),
            date,
            student: BTreeMap::new(),
        }
    }

    /// Document key, `{location}_{date}`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.location, self.date.format("%Y-%m-%d"))
    }

    pub fn present_count(&self) -> usize {
        self.student
            .values()
            .filter(|e| e.status == AttendanceStatus::Present)
            .count()
    }

    pub fn status_of(&self, student_id: &str) -> Option<AttendanceStatus> {
        self.student.get(student_id).map(|e| e.status)
    }
}
