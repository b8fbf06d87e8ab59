use std::sync::Arc;

use sqlx::MySqlPool;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::notify::smtp::SmtpNotifier;
use crate::notify::{DisabledNotifier, Notifier};
use crate::services::approval::ApprovalWorkflow;
use crate::services::attendance::AttendanceRegister;
use crate::services::hours::HoursAggregator;
use crate::services::ledger::ShiftLedger;
use crate::services::reports::ReportService;
use crate::sink::TabularSink;
use crate::sink::csv_workbook::CsvWorkbookSink;
use crate::store::mysql::{MySqlApprovalStore, MySqlAttendanceStore, MySqlShiftStore, MySqlUserDirectory};
use crate::store::{ApprovalStore, AttendanceStore, ShiftStore, UserDirectory};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::roster_cache::CachedDirectory;

/// Every service a handler can reach, built once at startup and shared
/// through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<ShiftLedger>,
    pub hours: Arc<HoursAggregator>,
    pub attendance: Arc<AttendanceRegister>,
    pub reports: Arc<ReportService>,
    pub approval: Arc<ApprovalWorkflow>,
}

impl AppState {
    pub fn build(config: &Config, pool: MySqlPool) -> Result<Self, AppError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let shifts: Arc<dyn ShiftStore> = Arc::new(MySqlShiftStore::new(pool.clone()));
        let attendance_store: Arc<dyn AttendanceStore> = Arc::new(MySqlAttendanceStore::new(pool.clone()));
        let approvals: Arc<dyn ApprovalStore> = Arc::new(MySqlApprovalStore::new(pool.clone()));
        let directory: Arc<dyn UserDirectory> = Arc::new(CachedDirectory::new(
            Arc::new(MySqlUserDirectory::new(pool)),
            config.roster_cache_ttl,
        ));
        let sink: Arc<dyn TabularSink> = Arc::new(CsvWorkbookSink::new(config.sheets_dir.clone()));

        let notifier: Arc<dyn Notifier> = match &config.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, port = smtp.port, "SMTP notifier configured");
                Arc::new(SmtpNotifier::from_config(smtp, config.external_timeout)?)
            }
            None => {
                warn!("SMTP_HOST not set, payroll approval emails are disabled");
                Arc::new(DisabledNotifier)
            }
        };

        let hours = Arc::new(HoursAggregator::new(shifts.clone(), directory.clone()));
        let reports = Arc::new(ReportService::new(
            shifts.clone(),
            directory.clone(),
            attendance_store.clone(),
            sink,
            hours.clone(),
            clock.clone(),
            config.workbooks.clone(),
            config.locations.clone(),
            config.retention_days,
            config.external_timeout,
        ));
        let ledger = Arc::new(ShiftLedger::new(
            shifts,
            directory.clone(),
            hours.clone(),
            reports.clone(),
            clock.clone(),
            config.locations.clone(),
        ));
        let attendance = Arc::new(AttendanceRegister::new(
            attendance_store,
            directory.clone(),
            clock.clone(),
            config.locations.clone(),
        ));
        let approval = Arc::new(ApprovalWorkflow::new(
            approvals,
            reports.clone(),
            directory,
            notifier,
            clock,
            config.locations.clone(),
            config.external_timeout,
        ));

        Ok(Self {
            ledger,
            hours,
            attendance,
            reports,
            approval,
        })
    }
}
