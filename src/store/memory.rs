//! In-process doubles for the store traits.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::Mutex;

use super::{ApprovalStore, AttendanceStore, ShiftStore, UserDirectory, Window};
use crate::error::AppError;
use crate::model::approval::ApprovalRecord;
use crate::model::attendance::{AttendanceEntry, AttendanceRecord, AttendanceStatus};
use crate::model::role::Role;
use crate::model::shift::ShiftEvent;
use crate::model::user::{RoleDetails, UserProfile};

fn sorted(mut events: Vec<ShiftEvent>) -> Vec<ShiftEvent> {
    events.sort_by(|a, b| a.chronological(b));
    events
}

#[derive(Default)]
pub struct MemoryShiftStore {
    events: Mutex<HashMap<String, ShiftEvent>>,
}

impl MemoryShiftStore {
    pub async fn all(&self) -> Vec<ShiftEvent> {
        sorted(self.events.lock().await.values().cloned().collect())
    }
}

#[async_trait]
impl ShiftStore for MemoryShiftStore {
    async fn insert(&self, event: &ShiftEvent) -> Result<(), AppError> {
        self.events.lock().await.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn insert_pair(&self, clock_in: &ShiftEvent, clock_out: &ShiftEvent) -> Result<(), AppError> {
        let mut events = self.events.lock().await;
        events.insert(clock_in.id.clone(), clock_in.clone());
        events.insert(clock_out.id.clone(), clock_out.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ShiftEvent>, AppError> {
        Ok(self.events.lock().await.get(id).cloned())
    }

    async fn update_timestamp(&self, id: &str, timestamp: NaiveDateTime) -> Result<bool, AppError> {
        match self.events.lock().await.get_mut(id) {
            Some(e) => {
                e.timestamp = timestamp;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_timestamps(&self, updates: &[(String, NaiveDateTime)]) -> Result<(), AppError> {
        let mut events = self.events.lock().await;
        if let Some((missing, _)) = updates.iter().find(|(id, _)| !events.contains_key(id)) {
            return Err(AppError::not_found(format!("shift event {} not found", missing)));
        }
        for (id, ts) in updates {
            if let Some(e) = events.get_mut(id) {
                e.timestamp = *ts;
            }
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), AppError> {
        let mut events = self.events.lock().await;
        if let Some(missing) = ids.iter().find(|id| !events.contains_key(*id)) {
            return Err(AppError::not_found(format!("shift event {} not found", missing)));
        }
        for id in ids {
            events.remove(id);
        }
        Ok(())
    }

    async fn list_for_location(&self, location: &str, window: Window) -> Result<Vec<ShiftEvent>, AppError> {
        let events = self.events.lock().await;
        Ok(sorted(
            events
                .values()
                .filter(|e| e.location == location && window.contains(e.timestamp))
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        location: Option<&str>,
        window: Window,
    ) -> Result<Vec<ShiftEvent>, AppError> {
        let events = self.events.lock().await;
        Ok(sorted(
            events
                .values()
                .filter(|e| {
                    e.user_id == user_id
                        && location.is_none_or(|l| e.location == l)
                        && window.contains(e.timestamp)
                })
                .cloned()
                .collect(),
        ))
    }
}

#[derive(Default)]
pub struct MemoryAttendanceStore {
    records: Mutex<BTreeMap<(String, NaiveDate), AttendanceRecord>>,
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn upsert_mark(
        &self,
        location: &str,
        date: NaiveDate,
        student_id: &str,
        status: AttendanceStatus,
        at: NaiveDateTime,
    ) -> Result<(), AppError> {
        let mut records = self.records.lock().await;
        let record = records
            .entry((location.to_string(), date))
            .or_insert_with(|| AttendanceRecord::new(location, date));
        let last_edited = record.student.get(student_id).and_then(|e| e.last_edited);
        record.student.insert(
            student_id.to_string(),
            AttendanceEntry {
                status,
                timestamp: at,
                last_edited,
            },
        );
        Ok(())
    }

    async fn update_mark(
        &self,
        location: &str,
        date: NaiveDate,
        student_id: &str,
        status: AttendanceStatus,
        at: NaiveDateTime,
    ) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        let entry = records
            .get_mut(&(location.to_string(), date))
            .and_then(|r| r.student.get_mut(student_id));
        match entry {
            Some(e) => {
                e.status = status;
                e.last_edited = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record(&self, location: &str, date: NaiveDate) -> Result<Option<AttendanceRecord>, AppError> {
        Ok(self.records.lock().await.get(&(location.to_string(), date)).cloned())
    }

    async fn records_between(
        &self,
        location: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| r.location == location && from <= r.date && r.date <= to)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryApprovalStore {
    records: Mutex<BTreeMap<(String, String), ApprovalRecord>>,
}

#[async_trait]
impl ApprovalStore for MemoryApprovalStore {
    async fn upsert(&self, record: &ApprovalRecord) -> Result<(), AppError> {
        self.records
            .lock()
            .await
            .insert((record.location.clone(), record.period_id.clone()), record.clone());
        Ok(())
    }

    async fn get(&self, location: &str, period_id: &str) -> Result<Option<ApprovalRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&(location.to_string(), period_id.to_string()))
            .cloned())
    }

    async fn list_for_period(&self, period_id: &str) -> Result<Vec<ApprovalRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| r.period_id == period_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    users: Mutex<Vec<UserProfile>>,
    pub lookups: AtomicUsize,
    pub unavailable: AtomicBool,
}

impl MemoryDirectory {
    pub async fn add(&self, user: UserProfile) {
        self.users.lock().await.push(user);
    }

    pub async fn add_staff(&self, id: &str, first: &str, last: &str, details: RoleDetails, locations: &[&str]) {
        let email = format!("{}@example.com", id);
        let user = UserProfile::new(
            id,
            email,
            first,
            last,
            locations.iter().map(|l| l.to_string()).collect(),
            details,
        )
        .unwrap();
        self.add(user).await;
    }

    fn check(&self) -> Result<(), AppError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(AppError::external("database", "directory offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.check()?;
        Ok(self.users.lock().await.iter().find(|u| u.id == user_id).cloned())
    }

    async fn at_location(&self, location: &str) -> Result<Vec<UserProfile>, AppError> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .filter(|u| u.tutoring_location.iter().any(|l| l == location))
            .cloned()
            .collect())
    }

    async fn with_role(&self, role: Role) -> Result<Vec<UserProfile>, AppError> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .filter(|u| u.role() == role)
            .cloned()
            .collect())
    }
}
