use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use super::{require, require_location};
use crate::error::AppError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::role::Role;
use crate::model::user::UserProfile;
use crate::store::{AttendanceStore, UserDirectory};
use crate::utils::clock::Clock;

/// Daily present/absent marks per location.
pub struct AttendanceRegister {
    store: Arc<dyn AttendanceStore>,
    directory: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    locations: Vec<String>,
}

impl AttendanceRegister {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        directory: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
        locations: Vec<String>,
    ) -> Self {
        Self {
            store,
            directory,
            clock,
            locations,
        }
    }

    async fn record_on(&self, location: &str, date: NaiveDate) -> Result<AttendanceRecord, AppError> {
        self.store
            .record(location, date)
            .await?
            .ok_or_else(|| AppError::not_found(format!("no attendance record for {} on {}", location, date)))
    }

    /// Sets today's mark, creating the day's record on first use.
    #[instrument(skip(self))]
    pub async fn mark(
        &self,
        location: &str,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, AppError> {
        require_location(&self.locations, location)?;
        require("student_id", student_id)?;

        let now = self.clock.now();
        self.store
            .upsert_mark(location, now.date(), student_id, status, now)
            .await?;
        let record = self.record_on(location, now.date()).await?;
        info!(key = %record.key(), student_id, %status, "Attendance marked");
        Ok(record)
    }

    /// Changes an existing mark from today and stamps `last_edited`.
    #[instrument(skip(self))]
    pub async fn edit(
        &self,
        location: &str,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, AppError> {
        require_location(&self.locations, location)?;
        require("student_id", student_id)?;
        let now = self.clock.now();
        self.record_on(location, now.date()).await?;

        if !self
            .store
            .update_mark(location, now.date(), student_id, status, now)
            .await?
        {
            return Err(AppError::not_found(format!(
                "student {} has no attendance mark at {} today",
                student_id, location
            )));
        }
        let record = self.record_on(location, now.date()).await?;
        info!(key = %record.key(), student_id, %status, "Attendance edited");
        Ok(record)
    }

    /// Present marks on `date` (today when `None`); zero when nothing was
    /// recorded yet.
    pub async fn count_present(&self, location: &str, date: Option<NaiveDate>) -> Result<usize, AppError> {
        require_location(&self.locations, location)?;
        let date = date.unwrap_or_else(|| self.clock.today());
        Ok(self
            .store
            .record(location, date)
            .await?
            .map(|r| r.present_count())
            .unwrap_or(0))
    }

    /// Students enrolled at `location`.
    pub async fn roster(&self, location: &str) -> Result<Vec<UserProfile>, AppError> {
        require_location(&self.locations, location)?;
        let mut students: Vec<UserProfile> = self
            .directory
            .at_location(location)
            .await?
            .into_iter()
            .filter(|u| u.role() == Role::Student)
            .collect();
        students.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(students)
    }

    pub async fn record(&self, location: &str, date: NaiveDate) -> Result<Option<AttendanceRecord>, AppError> {
        require_location(&self.locations, location)?;
        self.store.record(location, date).await
    }
}
