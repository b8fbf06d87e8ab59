use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, warn};

use super::{ApprovalStore, AttendanceStore, ShiftStore, UserDirectory, Window};
use crate::error::AppError;
use crate::model::approval::ApprovalRecord;
use crate::model::attendance::{AttendanceEntry, AttendanceRecord, AttendanceStatus};
use crate::model::role::Role;
use crate::model::shift::{EventKind, ShiftEvent};
use crate::model::user::{RoleDetails, UserProfile};

/// `?, ?, ?` for an IN clause of `n` values.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/* =========================
Shifts
========================= */

#[derive(FromRow)]
struct ShiftRow {
    id: String,
    event: String,
    user_id: String,
    location: String,
    role: String,
    timestamp: NaiveDateTime,
}

impl TryFrom<ShiftRow> for ShiftEvent {
    type Error = AppError;

    fn try_from(row: ShiftRow) -> Result<Self, Self::Error> {
        let event = EventKind::from_str(&row.event).map_err(|_| {
            AppError::external("database", format!("shift {} has unknown event '{}'", row.id, row.event))
        })?;
        let role = Role::from_str(&row.role).map_err(|_| {
            AppError::external("database", format!("shift {} has unknown role '{}'", row.id, row.role))
        })?;
        Ok(ShiftEvent {
            id: row.id,
            event,
            user_id: row.user_id,
            location: row.location,
            role,
            timestamp: row.timestamp,
        })
    }
}

fn into_events(rows: Vec<ShiftRow>) -> Result<Vec<ShiftEvent>, AppError> {
    rows.into_iter().map(ShiftEvent::try_from).collect()
}

const INSERT_SHIFT: &str = r#"
    INSERT INTO shifts (id, event, user_id, location, role, `timestamp`)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

pub struct MySqlShiftStore {
    pool: MySqlPool,
}

impl MySqlShiftStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShiftStore for MySqlShiftStore {
    async fn insert(&self, event: &ShiftEvent) -> Result<(), AppError> {
        sqlx::query(INSERT_SHIFT)
            .bind(&event.id)
            .bind(event.event.as_ref())
            .bind(&event.user_id)
            .bind(&event.location)
            .bind(event.role.as_ref())
            .bind(event.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_pair(&self, clock_in: &ShiftEvent, clock_out: &ShiftEvent) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for event in [clock_in, clock_out] {
            sqlx::query(INSERT_SHIFT)
                .bind(&event.id)
                .bind(event.event.as_ref())
                .bind(&event.user_id)
                .bind(&event.location)
                .bind(event.role.as_ref())
                .bind(event.timestamp)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ShiftEvent>, AppError> {
        let row = sqlx::query_as::<_, ShiftRow>(
            r#"
            SELECT id, event, user_id, location, role, `timestamp`
            FROM shifts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ShiftEvent::try_from).transpose()
    }

    async fn update_timestamp(&self, id: &str, timestamp: NaiveDateTime) -> Result<bool, AppError> {
        let updates = [(id.to_string(), timestamp)];
        match self.update_timestamps(&updates).await {
            Ok(()) => Ok(true),
            Err(AppError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn update_timestamps(&self, updates: &[(String, NaiveDateTime)]) -> Result<(), AppError> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        // Lock the rows first; MySQL reports 0 affected rows for no-op updates.
        let sql = format!(
            "SELECT id FROM shifts WHERE id IN ({}) FOR UPDATE",
            placeholders(updates.len())
        );
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for (id, _) in updates {
            query = query.bind(id);
        }
        let found = query.fetch_all(&mut *tx).await?;

        if let Some((missing, _)) = updates.iter().find(|(id, _)| !found.contains(id)) {
            return Err(AppError::not_found(format!("shift event {} not found", missing)));
        }

        for (id, timestamp) in updates {
            sqlx::query("UPDATE shifts SET `timestamp` = ? WHERE id = ?")
                .bind(timestamp)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            let result = sqlx::query("DELETE FROM shifts WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                // dropping the transaction rolls back earlier deletes
                return Err(AppError::not_found(format!("shift event {} not found", id)));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_for_location(&self, location: &str, window: Window) -> Result<Vec<ShiftEvent>, AppError> {
        let rows = sqlx::query_as::<_, ShiftRow>(
            r#"
            SELECT id, event, user_id, location, role, `timestamp`
            FROM shifts
            WHERE location = ?
            AND `timestamp` >= ?
            AND `timestamp` < ?
            ORDER BY `timestamp`, event = 'clock-out', id
            "#,
        )
        .bind(location)
        .bind(window.from)
        .bind(window.to)
        .fetch_all(&self.pool)
        .await?;

        debug!(location, count = rows.len(), "Loaded location shifts");
        into_events(rows)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        location: Option<&str>,
        window: Window,
    ) -> Result<Vec<ShiftEvent>, AppError> {
        let mut sql = String::from(
            r#"
            SELECT id, event, user_id, location, role, `timestamp`
            FROM shifts
            WHERE user_id = ?
            AND `timestamp` >= ?
            AND `timestamp` < ?
            "#,
        );
        if location.is_some() {
            sql.push_str(" AND location = ?");
        }
        sql.push_str(" ORDER BY `timestamp`, event = 'clock-out', id");

        let mut query = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(user_id)
            .bind(window.from)
            .bind(window.to);
        if let Some(location) = location {
            query = query.bind(location);
        }

        into_events(query.fetch_all(&self.pool).await?)
    }
}

/* =========================
Attendance
========================= */

#[derive(FromRow)]
struct AttendanceRow {
    location: String,
    date: NaiveDate,
    student_id: String,
    status: String,
    marked_at: NaiveDateTime,
    last_edited: Option<NaiveDateTime>,
}

/// Folds per-student rows into one record per (location, date).
fn group_attendance(rows: Vec<AttendanceRow>) -> Vec<AttendanceRecord> {
    let mut records: BTreeMap<(String, NaiveDate), AttendanceRecord> = BTreeMap::new();
    for row in rows {
        let status = match AttendanceStatus::from_str(&row.status) {
            Ok(s) => s,
            Err(_) => {
                warn!(student_id = %row.student_id, status = %row.status, "Skipping attendance row with unknown status");
                continue;
            }
        };
        records
            .entry((row.location.clone(), row.date))
            .or_insert_with(|| AttendanceRecord::new(row.location.clone(), row.date))
            .student
            .insert(
                row.student_id,
                AttendanceEntry {
                    status,
                    timestamp: row.marked_at,
                    last_edited: row.last_edited,
                },
            );
    }
    records.into_values().collect()
}

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn upsert_mark(
        &self,
        location: &str,
        date: NaiveDate,
        student_id: &str,
        status: AttendanceStatus,
        at: NaiveDateTime,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO attendance (location, date, student_id, status, marked_at, last_edited)
            VALUES (?, ?, ?, ?, ?, NULL)
            ON DUPLICATE KEY UPDATE status = VALUES(status), marked_at = VALUES(marked_at)
            "#,
        )
        .bind(location)
        .bind(date)
        .bind(student_id)
        .bind(status.as_ref())
        .bind(at)
        .execute(&self.pool)
        .await?;
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
        let exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM attendance
            WHERE location = ? AND date = ? AND student_id = ?
            "#,
        )
        .bind(location)
        .bind(date)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        if exists == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE attendance
            SET status = ?, last_edited = ?
            WHERE location = ? AND date = ? AND student_id = ?
            "#,
        )
        .bind(status.as_ref())
        .bind(at)
        .bind(location)
        .bind(date)
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    async fn record(&self, location: &str, date: NaiveDate) -> Result<Option<AttendanceRecord>, AppError> {
        let rows = sqlx::query_as::<_, AttendanceRow>(
            r#"
            SELECT location, date, student_id, status, marked_at, last_edited
            FROM attendance
            WHERE location = ? AND date = ?
            "#,
        )
        .bind(location)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_attendance(rows).into_iter().next())
    }

    async fn records_between(
        &self,
        location: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let rows = sqlx::query_as::<_, AttendanceRow>(
            r#"
            SELECT location, date, student_id, status, marked_at, last_edited
            FROM attendance
            WHERE location = ? AND date >= ? AND date <= ?
            ORDER BY date
            "#,
        )
        .bind(location)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_attendance(rows))
    }
}

/* =========================
Payroll approvals
========================= */

#[derive(FromRow)]
struct ApprovalRow {
    location: String,
    period_id: String,
    approved_at: NaiveDateTime,
    status: String,
}

impl From<ApprovalRow> for ApprovalRecord {
    fn from(row: ApprovalRow) -> Self {
        ApprovalRecord {
            location: row.location,
            period_id: row.period_id,
            approved_at: row.approved_at,
            status: row.status,
        }
    }
}

pub struct MySqlApprovalStore {
    pool: MySqlPool,
}

impl MySqlApprovalStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalStore for MySqlApprovalStore {
    async fn upsert(&self, record: &ApprovalRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO payroll_approvals (location, period_id, approved_at, status)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE approved_at = VALUES(approved_at), status = VALUES(status)
            "#,
        )
        .bind(&record.location)
        .bind(&record.period_id)
        .bind(record.approved_at)
        .bind(&record.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, location: &str, period_id: &str) -> Result<Option<ApprovalRecord>, AppError> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            r#"
            SELECT location, period_id, approved_at, status
            FROM payroll_approvals
            WHERE location = ? AND period_id = ?
            "#,
        )
        .bind(location)
        .bind(period_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ApprovalRecord::from))
    }

    async fn list_for_period(&self, period_id: &str) -> Result<Vec<ApprovalRecord>, AppError> {
        let rows = sqlx::query_as::<_, ApprovalRow>(
            r#"
            SELECT location, period_id, approved_at, status
            FROM payroll_approvals
            WHERE period_id = ?
            ORDER BY location
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ApprovalRecord::from).collect())
    }
}

/* =========================
Users
========================= */

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    grade_level: Option<String>,
    parent_contact: Option<String>,
    google_meets_link: Option<String>,
}

pub struct MySqlUserDirectory {
    pool: MySqlPool,
}

impl MySqlUserDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Attaches location memberships and drops rows that cannot form a
    /// valid profile.
    async fn hydrate(&self, rows: Vec<UserRow>) -> Result<Vec<UserProfile>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT user_id, location FROM user_locations WHERE user_id IN ({}) ORDER BY location",
            placeholders(rows.len())
        );
        let mut query = sqlx::query_as::<_, (String, String)>(&sql);
        for row in &rows {
            query = query.bind(&row.id);
        }
        let mut locations: HashMap<String, Vec<String>> = HashMap::new();
        for (user_id, location) in query.fetch_all(&self.pool).await? {
            locations.entry(user_id).or_default().push(location);
        }

        let mut profiles = Vec::with_capacity(rows.len());
        for row in rows {
            let role = match Role::from_str(&row.role) {
                Ok(r) => r,
                Err(_) => {
                    warn!(user_id = %row.id, role = %row.role, "Skipping user with unknown role");
                    continue;
                }
            };
            let details =
                RoleDetails::from_columns(role, row.grade_level, row.parent_contact, row.google_meets_link);
            let tutoring_location = locations.remove(&row.id).unwrap_or_default();
            match UserProfile::new(row.id, row.email, row.first_name, row.last_name, tutoring_location, details) {
                Ok(p) => profiles.push(p),
                Err(e) => warn!(error = %e, "Skipping invalid user row"),
            }
        }
        Ok(profiles)
    }
}

const USER_COLUMNS: &str =
    "u.id, u.email, u.first_name, u.last_name, u.role, u.grade_level, u.parent_contact, u.google_meets_link";

#[async_trait]
impl UserDirectory for MySqlUserDirectory {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        let sql = format!("SELECT {} FROM users u WHERE u.id = ?", USER_COLUMNS);
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(self.hydrate(rows).await?.into_iter().next())
    }

    async fn at_location(&self, location: &str) -> Result<Vec<UserProfile>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM users u
            JOIN user_locations l ON l.user_id = u.id
            WHERE l.location = ?
            ORDER BY u.last_name, u.first_name, u.id
            "#,
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(location)
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    async fn with_role(&self, role: Role) -> Result<Vec<UserProfile>, AppError> {
        let sql = format!(
            "SELECT {} FROM users u WHERE u.role = ? ORDER BY u.last_name, u.first_name, u.id",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.as_ref())
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }
}
