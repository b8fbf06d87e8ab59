//! Persistence seams. Services only see these traits; `mysql` holds the
//! production implementation and `memory` the in-process doubles used by tests.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::AppError;
use crate::model::approval::ApprovalRecord;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::role::Role;
use crate::model::shift::ShiftEvent;
use crate::model::user::UserProfile;

#[cfg(test)]
pub mod memory;
pub mod mysql;

/// Time window `[from, to)` for ledger queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl Window {
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Window { from, to }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.from <= ts && ts < self.to
    }
}

/// Append-only clock event storage. Listing methods return events sorted by
/// timestamp, ties broken by id, so pairing is deterministic.
#[async_trait]
pub trait ShiftStore: Send + Sync {
    async fn insert(&self, event: &ShiftEvent) -> Result<(), AppError>;

    /// Inserts both events or neither.
    async fn insert_pair(&self, clock_in: &ShiftEvent, clock_out: &ShiftEvent) -> Result<(), AppError>;

    async fn get(&self, id: &str) -> Result<Option<ShiftEvent>, AppError>;

    /// Returns false when no event has this id.
    async fn update_timestamp(&self, id: &str, timestamp: NaiveDateTime) -> Result<bool, AppError>;

    /// Applies every update or none; fails with `NotFound` if an id is missing.
    async fn update_timestamps(&self, updates: &[(String, NaiveDateTime)]) -> Result<(), AppError>;

    /// Deletes every id or none; fails with `NotFound` if an id is missing.
    async fn delete(&self, ids: &[String]) -> Result<(), AppError>;

    async fn list_for_location(&self, location: &str, window: Window) -> Result<Vec<ShiftEvent>, AppError>;

    async fn list_for_user(
        &self,
        user_id: &str,
        location: Option<&str>,
        window: Window,
    ) -> Result<Vec<ShiftEvent>, AppError>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Creates the day's record if needed and sets the student's entry.
    async fn upsert_mark(
        &self,
        location: &str,
        date: NaiveDate,
        student_id: &str,
        status: AttendanceStatus,
        at: NaiveDateTime,
    ) -> Result<(), AppError>;

    /// Updates an existing entry; returns false when the student has none.
    async fn update_mark(
        &self,
        location: &str,
        date: NaiveDate,
        student_id: &str,
        status: AttendanceStatus,
        at: NaiveDateTime,
    ) -> Result<bool, AppError>;

    async fn record(&self, location: &str, date: NaiveDate) -> Result<Option<AttendanceRecord>, AppError>;

    /// Records with `from <= date <= to`, ordered by date.
    async fn records_between(
        &self,
        location: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError>;
}

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Creates or replaces the record for (location, period_id).
    async fn upsert(&self, record: &ApprovalRecord) -> Result<(), AppError>;

    async fn get(&self, location: &str, period_id: &str) -> Result<Option<ApprovalRecord>, AppError>;

    async fn list_for_period(&self, period_id: &str) -> Result<Vec<ApprovalRecord>, AppError>;
}

/// Read-only view of the identity provider.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;

    async fn at_location(&self, location: &str) -> Result<Vec<UserProfile>, AppError>;

    async fn with_role(&self, role: Role) -> Result<Vec<UserProfile>, AppError>;
}
