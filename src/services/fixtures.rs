//! Services wired to in-memory doubles, shared by the service and handler tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;

use super::approval::ApprovalWorkflow;
use super::attendance::AttendanceRegister;
use super::hours::HoursAggregator;
use super::ledger::ShiftLedger;
use super::reports::{ReportService, Workbooks};
use crate::model::role::Role;
use crate::model::shift::{EventKind, ShiftEvent};
use crate::model::user::RoleDetails;
use crate::notify::recording::RecordingNotifier;
use crate::sink::memory::MemorySink;
use crate::state::AppState;
use crate::store::memory::{MemoryApprovalStore, MemoryAttendanceStore, MemoryDirectory, MemoryShiftStore};
use crate::utils::clock::FixedClock;

pub const LOCATIONS: [&str; 2] = ["Everett", "Lynnwood"];

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn event(user: &str, location: &str, kind: EventKind, ts: &str) -> ShiftEvent {
    ShiftEvent::new(kind, user, location, Role::Tutor, at(ts))
}

pub fn workbooks() -> Workbooks {
    Workbooks {
        log: "Log".into(),
        summary: "Summary".into(),
        attendance: "Attendance".into(),
        monthly: "Monthly".into(),
    }
}

pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub shifts: Arc<MemoryShiftStore>,
    pub directory: Arc<MemoryDirectory>,
    pub attendance_store: Arc<MemoryAttendanceStore>,
    pub approvals: Arc<MemoryApprovalStore>,
    pub sink: Arc<MemorySink>,
    pub notifier: Arc<RecordingNotifier>,
    pub hours: Arc<HoursAggregator>,
    pub reports: Arc<ReportService>,
    pub ledger: Arc<ShiftLedger>,
    pub attendance: Arc<AttendanceRegister>,
    pub approval: Arc<ApprovalWorkflow>,
}

impl Harness {
    /// Everett: tutor t1 (Ada Byron), manager t2 (Grace Hopper, also
    /// Lynnwood), students s1 (Kim Lee) and s2 (Sam Park).
    /// Lynnwood: tutor t4 (Lin Lynn). Admin a1 has no location.
    pub async fn new(now: &str) -> Self {
        Self::with_retention(now, 180).await
    }

    pub async fn with_retention(now: &str, retention_days: u32) -> Self {
        let clock = Arc::new(FixedClock::parse(now));
        let shifts = Arc::new(MemoryShiftStore::default());
        let directory = Arc::new(MemoryDirectory::default());
        let attendance_store = Arc::new(MemoryAttendanceStore::default());
        let approvals = Arc::new(MemoryApprovalStore::default());
        let sink = Arc::new(MemorySink::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let tutor = || RoleDetails::Tutor {
            google_meets_link: "https://meet.example/room".into(),
        };
        let student = |grade: &str| RoleDetails::Student {
            grade_level: Some(grade.into()),
            parent_contact: "555-0100".into(),
        };
        directory.add_staff("t1", "Ada", "Byron", tutor(), &["Everett"]).await;
        directory
            .add_staff("t2", "Grace", "Hopper", RoleDetails::JuniorProjectManager, &["Everett", "Lynnwood"])
            .await;
        directory.add_staff("t4", "Lin", "Lynn", tutor(), &["Lynnwood"]).await;
        directory.add_staff("s2", "Sam", "Park", student("8"), &["Everett"]).await;
        directory.add_staff("s1", "Kim", "Lee", student("7"), &["Everett"]).await;
        directory.add_staff("a1", "Root", "Admin", RoleDetails::Admin, &[]).await;

        let locations: Vec<String> = LOCATIONS.iter().map(|l| l.to_string()).collect();
        let timeout = Duration::from_secs(5);

        let hours = Arc::new(HoursAggregator::new(shifts.clone(), directory.clone()));
        let reports = Arc::new(ReportService::new(
            shifts.clone(),
            directory.clone(),
            attendance_store.clone(),
            sink.clone(),
            hours.clone(),
            clock.clone(),
            workbooks(),
            locations.clone(),
            retention_days,
            timeout,
        ));
        let ledger = Arc::new(ShiftLedger::new(
            shifts.clone(),
            directory.clone(),
            hours.clone(),
            reports.clone(),
            clock.clone(),
            locations.clone(),
        ));
        let attendance = Arc::new(AttendanceRegister::new(
            attendance_store.clone(),
            directory.clone(),
            clock.clone(),
            locations.clone(),
        ));
        let approval = Arc::new(ApprovalWorkflow::new(
            approvals.clone(),
            reports.clone(),
            directory.clone(),
            notifier.clone(),
            clock.clone(),
            locations,
            timeout,
        ));

        Harness {
            clock,
            shifts,
            directory,
            attendance_store,
            approvals,
            sink,
            notifier,
            hours,
            reports,
            ledger,
            attendance,
            approval,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            ledger: self.ledger.clone(),
            hours: self.hours.clone(),
            attendance: self.attendance.clone(),
            reports: self.reports.clone(),
            approval: self.approval.clone(),
        }
    }

    /// Same stores, different configured location list.
    pub fn approval_with_locations(&self, locations: &[&str]) -> ApprovalWorkflow {
        ApprovalWorkflow::new(
            self.approvals.clone(),
            self.reports.clone(),
            self.directory.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            locations.iter().map(|l| l.to_string()).collect(),
            Duration::from_secs(5),
        )
    }
}
