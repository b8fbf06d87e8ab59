//! Report sheets regenerated from the ledger and the attendance register.
//! Every rewrite builds the complete row set first and hands it to
//! `TabularSink::replace_sheet`, so a sheet is never left half written.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::hours::HoursAggregator;
use super::require_location;
use crate::error::AppError;
use crate::model::attendance::AttendanceStatus;
use crate::model::period::{PayPeriod, fmt_date, period_for, sheet_start_date};
use crate::model::role::Role;
use crate::model::shift::{ShiftEvent, fmt_timestamp};
use crate::model::user::UserProfile;
use crate::sink::{Row, TabularSink, header_row};
use crate::store::{AttendanceStore, ShiftStore, UserDirectory, Window};
use crate::utils::clock::Clock;
use crate::utils::timeout::bounded;

pub const LOG_HEADER: [&str; 6] = ["Location", "Role", "First Name", "Last Name", "Timestamp", "Status"];
pub const SUMMARY_HEADER: [&str; 4] = ["First Name", "Last Name", "Role", "Total Hours"];
pub const ATTENDANCE_HEADER: [&str; 3] = ["First Name", "Last Name", "Status"];
pub const UNMARKED: &str = "Unmarked";

const SHEETS: &str = "sheets";

/// Workbook names, one per report family.
#[derive(Debug, Clone)]
pub struct Workbooks {
    pub log: String,
    pub summary: String,
    pub attendance: String,
    pub monthly: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SheetWrite {
    pub workbook: String,
    pub sheet: String,
    /// Data rows written, header excluded
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CleanupReport {
    pub workbook: String,
    #[schema(value_type = String, format = "date")]
    pub cutoff: NaiveDate,
    pub deleted: Vec<String>,
    /// Sheets kept because no start date could be read from their name
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SummaryReport {
    pub sheet: SheetWrite,
    pub cleanup: CleanupReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyAttendance {
    pub sheet: SheetWrite,
    /// `M/YY` of the reported month
    pub month: String,
    pub row: Vec<String>,
}

/// Payroll export for one location and period.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollCsv {
    pub location: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub users: usize,
}

impl PayrollCsv {
    pub fn is_empty(&self) -> bool {
        self.users == 0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sort_by_name(users: &mut [UserProfile]) {
    users.sort_by(|a, b| {
        a.last_name
            .cmp(&b.last_name)
            .then_with(|| a.first_name.cmp(&b.first_name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn log_row(event: &ShiftEvent, first: &str, last: &str) -> Row {
    vec![
        event.location.clone(),
        event.role.to_string(),
        first.to_string(),
        last.to_string(),
        fmt_timestamp(event.timestamp),
        event.event.to_string(),
    ]
}

pub struct ReportService {
    shifts: Arc<dyn ShiftStore>,
    directory: Arc<dyn UserDirectory>,
    attendance: Arc<dyn AttendanceStore>,
    sink: Arc<dyn TabularSink>,
    hours: Arc<HoursAggregator>,
    clock: Arc<dyn Clock>,
    workbooks: Workbooks,
    locations: Vec<String>,
    retention_days: u32,
    timeout: Duration,
}

impl ReportService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shifts: Arc<dyn ShiftStore>,
        directory: Arc<dyn UserDirectory>,
        attendance: Arc<dyn AttendanceStore>,
        sink: Arc<dyn TabularSink>,
        hours: Arc<HoursAggregator>,
        clock: Arc<dyn Clock>,
        workbooks: Workbooks,
        locations: Vec<String>,
        retention_days: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            shifts,
            directory,
            attendance,
            sink,
            hours,
            clock,
            workbooks,
            locations,
            retention_days,
            timeout,
        }
    }

    pub fn workbooks(&self) -> &Workbooks {
        &self.workbooks
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn current_period(&self) -> PayPeriod {
        period_for(self.clock.today())
    }

    async fn replace(&self, workbook: &str, sheet: &str, rows: Vec<Row>) -> Result<SheetWrite, AppError> {
        bounded(SHEETS, self.timeout, self.sink.replace_sheet(workbook, sheet, &rows)).await?;
        Ok(SheetWrite {
            workbook: workbook.to_string(),
            sheet: sheet.to_string(),
            rows: rows.len().saturating_sub(1),
        })
    }

    /// First and last name by user id. Users no longer on the roster are
    /// looked up one by one; unknown ids fall back to the id itself.
    async fn names(&self, location: &str, events: &[ShiftEvent]) -> Result<HashMap<String, (String, String)>, AppError> {
        let mut names: HashMap<String, (String, String)> = self
            .directory
            .at_location(location)
            .await?
            .into_iter()
            .map(|u| (u.id, (u.first_name, u.last_name)))
            .collect();

        for event in events {
            if names.contains_key(&event.user_id) {
                continue;
            }
            let name = match self.directory.get(&event.user_id).await? {
                Some(u) => (u.first_name, u.last_name),
                None => (event.user_id.clone(), String::new()),
            };
            names.insert(event.user_id.clone(), name);
        }
        Ok(names)
    }

    async fn log_rows(&self, location: &str, period: &PayPeriod) -> Result<Vec<Row>, AppError> {
        let window = Window::new(period.starts_at(), period.ends_before());
        let events = self.shifts.list_for_location(location, window).await?;
        let names = self.names(location, &events).await?;

        let mut rows = Vec::with_capacity(events.len() + 1);
        rows.push(header_row(&LOG_HEADER));
        for event in &events {
            let (first, last) = names
                .get(&event.user_id)
                .map(|(f, l)| (f.as_str(), l.as_str()))
                .unwrap_or((event.user_id.as_str(), ""));
            rows.push(log_row(event, first, last));
        }
        Ok(rows)
    }

    /// Rewrites the current period's log sheet for `location`.
    pub async fn regenerate_log(&self, location: &str) -> Result<SheetWrite, AppError> {
        require_location(&self.locations, location)?;
        let period = self.current_period();
        self.regenerate_log_for(location, &period).await
    }

    #[instrument(skip(self, period), fields(period = %period.id()))]
    pub async fn regenerate_log_for(&self, location: &str, period: &PayPeriod) -> Result<SheetWrite, AppError> {
        let rows = self.log_rows(location, period).await?;
        let written = self
            .replace(&self.workbooks.log, &period.log_sheet_name(location), rows)
            .await?;
        info!(location, sheet = %written.sheet, rows = written.rows, "Log sheet regenerated");
        Ok(written)
    }

    /// Single-row append for a live clock event, followed by a prune of
    /// expired log sheets. A failed prune is logged and left for the next
    /// event or the cleanup job.
    pub async fn append_live_event(&self, event: &ShiftEvent, profile: &UserProfile) -> Result<(), AppError> {
        let period = period_for(event.timestamp.date());
        let row = log_row(event, &profile.first_name, &profile.last_name);
        bounded(
            SHEETS,
            self.timeout,
            self.sink.append_rows(
                &self.workbooks.log,
                &period.log_sheet_name(&event.location),
                &LOG_HEADER,
                &[row],
            ),
        )
        .await?;

        if let Err(e) = self.cleanup(&self.workbooks.log).await {
            warn!(workbook = %self.workbooks.log, error = %e, "Log cleanup after live event failed");
        }
        Ok(())
    }

    async fn summary_rows(&self, location: &str, period: &PayPeriod) -> Result<(Vec<Row>, usize), AppError> {
        let totals = self.hours.aggregate(location, period).await?;
        let mut rows = Vec::with_capacity(totals.len() + 1);
        rows.push(header_row(&SUMMARY_HEADER));
        rows.extend(totals.iter().map(|u| {
            vec![
                u.first_name.clone(),
                u.last_name.clone(),
                u.role.to_string(),
                format!("{:.2}", u.hours),
            ]
        }));
        Ok((rows, totals.len()))
    }

    /// Rewrites the current period's summary sheet, then prunes old sheets
    /// from the summary workbook.
    #[instrument(skip(self))]
    pub async fn regenerate_summary(&self, location: &str) -> Result<SummaryReport, AppError> {
        require_location(&self.locations, location)?;
        let period = self.current_period();
        let (rows, _) = self.summary_rows(location, &period).await?;
        let sheet = self
            .replace(&self.workbooks.summary, &period.summary_sheet_name(location), rows)
            .await?;
        info!(location, sheet = %sheet.sheet, users = sheet.rows, "Summary sheet regenerated");

        let cleanup = self.cleanup(&self.workbooks.summary).await?;
        Ok(SummaryReport { sheet, cleanup })
    }

    /// Payroll CSV with the summary layout. `users == 0` means nothing was
    /// worked in the period.
    pub async fn payroll_csv(&self, location: &str, period: &PayPeriod) -> Result<PayrollCsv, AppError> {
        let (rows, users) = self.summary_rows(location, period).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &rows {
            writer
                .write_record(row)
                .map_err(|e| AppError::external("csv", e))?;
        }
        let bytes = writer.into_inner().map_err(|e| AppError::external("csv", e))?;

        Ok(PayrollCsv {
            location: location.to_string(),
            file_name: period.payroll_csv_name(location),
            bytes,
            users,
        })
    }

    /// Deletes sheets whose embedded start date is older than the retention
    /// cutoff. Names without a readable date are never deleted.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, workbook: &str) -> Result<CleanupReport, AppError> {
        let today = self.clock.today();
        let cutoff = chrono::Duration::try_days(i64::from(self.retention_days))
            .and_then(|keep| today.checked_sub_signed(keep))
            .ok_or_else(|| {
                AppError::validation(format!("retention of {} days is out of range", self.retention_days))
            })?;
        let sheets = bounded(SHEETS, self.timeout, self.sink.list_sheets(workbook)).await?;

        let mut report = CleanupReport {
            workbook: workbook.to_string(),
            cutoff,
            deleted: Vec::new(),
            skipped: Vec::new(),
        };
        for sheet in sheets {
            match sheet_start_date(&sheet) {
                Some(start) if start < cutoff => {
                    bounded(SHEETS, self.timeout, self.sink.delete_sheet(workbook, &sheet)).await?;
                    info!(workbook, sheet = %sheet, %start, "Deleted expired sheet");
                    report.deleted.push(sheet);
                }
                Some(_) => {}
                None => {
                    warn!(workbook, sheet = %sheet, "Sheet name has no start date, keeping it");
                    report.skipped.push(sheet);
                }
            }
        }
        Ok(report)
    }

    /// Daily attendance sheet: every student at `location` with their mark,
    /// or `Unmarked`.
    #[instrument(skip(self))]
    pub async fn regenerate_attendance(&self, location: &str, date: NaiveDate) -> Result<SheetWrite, AppError> {
        require_location(&self.locations, location)?;
        let mut students: Vec<UserProfile> = self
            .directory
            .at_location(location)
            .await?
            .into_iter()
            .filter(|u| u.role() == Role::Student)
            .collect();
        sort_by_name(&mut students);
        let record = self.attendance.record(location, date).await?;

        let mut rows = Vec::with_capacity(students.len() + 1);
        rows.push(header_row(&ATTENDANCE_HEADER));
        for student in students {
            let status = record
                .as_ref()
                .and_then(|r| r.status_of(&student.id))
                .map(|s: AttendanceStatus| s.to_string())
                .unwrap_or_else(|| UNMARKED.to_string());
            rows.push(vec![student.first_name, student.last_name, status]);
        }

        let sheet = format!("{} - {}", location, fmt_date(date));
        let written = self.replace(&self.workbooks.attendance, &sheet, rows).await?;
        info!(location, sheet = %written.sheet, students = written.rows, "Attendance sheet regenerated");
        Ok(written)
    }

    /// Average present count per day of the month before `today`, for every
    /// configured location plus the total. The month's row in the yearly
    /// sheet is replaced if it already exists.
    #[instrument(skip(self))]
    pub async fn monthly_attendance(&self, today: NaiveDate) -> Result<MonthlyAttendance, AppError> {
        let month_end = today.with_day(1).unwrap_or(today) - chrono::Duration::days(1);
        let month_start = month_end.with_day(1).unwrap_or(month_end);
        let days = f64::from(month_end.day());
        let label = month_start.format("%-m/%y").to_string();
        let sheet = month_start.year().to_string();

        let mut row = vec![label.clone()];
        let mut grand_total = 0usize;
        for location in &self.locations {
            let present: usize = self
                .attendance
                .records_between(location, month_start, month_end)
                .await?
                .iter()
                .map(|r| r.present_count())
                .sum();
            grand_total += present;
            row.push(format!("{:.2}", round2(present as f64 / days)));
        }
        row.push(format!("{:.2}", round2(grand_total as f64 / days)));

        let mut header = vec!["Month/Year".to_string()];
        header.extend(self.locations.iter().cloned());
        header.push("Total Average".to_string());

        let workbook = self.workbooks.monthly.clone();
        let mut rows = bounded(SHEETS, self.timeout, self.sink.read_sheet(&workbook, &sheet))
            .await?
            .unwrap_or_default();
        if rows.is_empty() {
            rows.push(header);
        } else {
            rows[0] = header;
        }
        match rows.iter().skip(1).position(|r| r.first() == Some(&label)) {
            Some(i) => rows[i + 1] = row.clone(),
            None => rows.push(row.clone()),
        }

        let written = self.replace(&workbook, &sheet, rows).await?;
        info!(month = %label, sheet = %written.sheet, "Monthly attendance recorded");
        Ok(MonthlyAttendance {
            sheet: written,
            month: label,
            row,
        })
    }
}
