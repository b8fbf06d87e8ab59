use crate::api::attendance::{CountResponse, MarkAttendance};
use crate::api::payroll::{ApprovalResponse, ApprovalStatus, ApprovalsResponse, FinalNoticeView};
use crate::api::reports::HoursReport;
use crate::api::shifts::{
    AddShift, ClockRequest, EditEvent, EditShift, EventWriteResponse, ShiftWriteResponse,
};
use crate::api::{Member, SheetStatus};
use crate::model::approval::ApprovalRecord;
use crate::model::attendance::{AttendanceEntry, AttendanceRecord, AttendanceStatus};
use crate::model::period::{Half, PayPeriod};
use crate::model::role::Role;
use crate::model::shift::{EventKind, Shift, ShiftEvent};
use crate::services::hours::{UserHours, WorkHours};
use crate::services::reports::{CleanupReport, MonthlyAttendance, SheetWrite, SummaryReport};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Staff Ledger API",
        version = "1.0.0",
        description = r#"
## Staff Time Ledger

This API runs time tracking and payroll preparation for a multi-location tutoring organization.

### 🔹 Key Features
- **Shift Ledger**
  - Clock in and out, correct shifts and single events, look up daily work hours
- **Attendance**
  - Mark and edit daily student attendance per location
- **Reports**
  - Per-period hours, location log and summary sheets, daily and monthly attendance sheets
- **Payroll Approval**
  - Approve a location's payroll for the current pay period and email the admins

### 🗓 Pay Periods
Periods run from the 1st to the 15th and from the 16th to the last day of the month.
Period ids look like `2025-8-1` and `2025-8-16`.

### 📦 Response Format
- JSON-based RESTful responses
- Errors carry `error` and `kind` fields

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::shifts::clock_in,
        crate::api::shifts::clock_out,
        crate::api::shifts::staff_roster,
        crate::api::shifts::find_user,
        crate::api::shifts::work_hours,
        crate::api::shifts::list_shifts,
        crate::api::shifts::add_shift,
        crate::api::shifts::edit_shift,
        crate::api::shifts::remove_shift,
        crate::api::shifts::edit_event,
        crate::api::shifts::delete_event,

        crate::api::attendance::students,
        crate::api::attendance::mark,
        crate::api::attendance::edit,
        crate::api::attendance::count,

        crate::api::reports::hours,
        crate::api::reports::regenerate_log,
        crate::api::reports::regenerate_summary,
        crate::api::reports::regenerate_attendance,
        crate::api::reports::monthly_attendance,
        crate::api::reports::cleanup,

        crate::api::payroll::approve,
        crate::api::payroll::list_approvals,
        crate::api::payroll::approval_status
    ),
    components(
        schemas(
            ClockRequest,
            AddShift,
            EditShift,
            EditEvent,
            EventWriteResponse,
            ShiftWriteResponse,
            SheetStatus,
            Member,
            Role,
            EventKind,
            ShiftEvent,
            Shift,
            WorkHours,
            MarkAttendance,
            CountResponse,
            AttendanceStatus,
            AttendanceEntry,
            AttendanceRecord,
            Half,
            PayPeriod,
            UserHours,
            HoursReport,
            SheetWrite,
            SummaryReport,
            CleanupReport,
            MonthlyAttendance,
            ApprovalRecord,
            ApprovalResponse,
            ApprovalsResponse,
            ApprovalStatus,
            FinalNoticeView
        )
    ),
    tags(
        (name = "Shifts", description = "Clock events and shift corrections"),
        (name = "Attendance", description = "Daily student attendance"),
        (name = "Reports", description = "Hours aggregation and report sheets"),
        (name = "Payroll", description = "Per-location payroll approval"),
    )
)]
pub struct ApiDoc;
