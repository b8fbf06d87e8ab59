use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    ClockIn,
    ClockOut,
}

/// One clock event in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShiftEvent {
    #[schema(example = "5f0c6c2e-8d4f-4c1e-9a8e-2b0d7a1f3c55")]
    pub id: String,
    #[schema(example = "clock-in")]
    pub event: EventKind,
    #[schema(example = "u-1001")]
    pub user_id: String,
    #[schema(example = "Everett")]
    pub location: String,
    #[schema(example = "tutor")]
    pub role: Role,
    #[schema(example = "2025-08-04T15:02:11", value_type = String, format = "date-time")]
    pub timestamp: NaiveDateTime,
}

impl ShiftEvent {
    pub fn new(
        event: EventKind,
        user_id: impl Into<String>,
        location: impl Into<String>,
        role: Role,
        timestamp: NaiveDateTime,
    ) -> Self {
        ShiftEvent {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            user_id: user_id.into(),
            location: location.into(),
            role,
            timestamp,
        }
    }

    pub fn is_clock_in(&self) -> bool {
        self.event == EventKind::ClockIn
    }

    pub fn is_clock_out(&self) -> bool {
        self.event == EventKind::ClockOut
    }

    /// Ledger order: by timestamp, a clock-in before a clock-out at the same
    /// instant, then by id.
    pub fn chronological(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.is_clock_out().cmp(&other.is_clock_out()))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// A clock-in immediately followed by a clock-out of the same user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Shift {
    pub user_id: String,
    pub location: String,
    pub clock_in_id: String,
    pub clock_out_id: String,
    #[schema(value_type = String, format = "date-time")]
    pub start: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub end: NaiveDateTime,
}

impl Shift {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn seconds(&self) -> i64 {
        self.duration().num_seconds().max(0)
    }
}

/// Result of pairing one event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    Complete(Shift),
    /// Clock-in with no clock-out right after it
    Incomplete(ShiftEvent),
}

impl Pairing {
    pub fn shift(&self) -> Option<&Shift> {
        match self {
            Pairing::Complete(shift) => Some(shift),
            Pairing::Incomplete(_) => None,
        }
    }
}

/// Formats timestamps the way they are written to report sheets.
pub fn fmt_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Seconds to hours, rounded to two decimals.
pub fn hours_from_seconds(seconds: i64) -> f64 {
    (seconds as f64 / 3600.0 * 100.0).round() / 100.0
}
