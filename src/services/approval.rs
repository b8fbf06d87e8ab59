use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::reports::ReportService;
use super::{require, require_location};
use crate::error::AppError;
use crate::model::approval::{ApprovalRecord, ApprovalState};
use crate::model::period::{PayPeriod, fmt_date, period_for, period_id};
use crate::model::role::Role;
use crate::notify::{Attachment, Notification, Notifier};
use crate::store::{ApprovalStore, UserDirectory};
use crate::utils::clock::Clock;
use crate::utils::timeout::bounded;

pub const FINAL_SUBJECT: &str = "Final Payroll Verification: All Locations Approved";

/// What happened to the consolidated email after an approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinalNotice {
    Sent { attachments: usize },
    /// Other locations still have to approve
    NotReady { pending: Vec<String> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalOutcome {
    pub record: ApprovalRecord,
    pub period: PayPeriod,
    /// Users on the approved payroll
    pub users: usize,
    pub final_notice: FinalNotice,
}

pub struct ApprovalWorkflow {
    approvals: Arc<dyn ApprovalStore>,
    reports: Arc<ReportService>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    locations: Vec<String>,
    timeout: Duration,
}

impl ApprovalWorkflow {
    pub fn new(
        approvals: Arc<dyn ApprovalStore>,
        reports: Arc<ReportService>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        locations: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            approvals,
            reports,
            directory,
            notifier,
            clock,
            locations,
            timeout,
        }
    }

    async fn admin_emails(&self) -> Result<Vec<String>, AppError> {
        let emails: Vec<String> = self
            .directory
            .with_role(Role::Admin)
            .await?
            .into_iter()
            .map(|u| u.email)
            .filter(|e| !e.trim().is_empty())
            .collect();
        if emails.is_empty() {
            return Err(AppError::state("no admin email addresses to notify"));
        }
        Ok(emails)
    }

    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        bounded("smtp", self.timeout, self.notifier.send(notification)).await
    }

    /// Confirms the current period's payroll for `location`: emails the CSV
    /// to every admin, records the approval, and once every configured
    /// location has approved sends one email carrying all payroll CSVs.
    /// Nothing is written or sent when the location has no hours.
    #[instrument(skip(self))]
    pub async fn approve(&self, location: &str) -> Result<ApprovalOutcome, AppError> {
        require_location(&self.locations, location)?;
        let period = period_for(self.clock.today());

        let csv = self.reports.payroll_csv(location, &period).await?;
        if csv.is_empty() {
            return Err(AppError::state(format!(
                "no payroll data for {} in period {}",
                location,
                period.id()
            )));
        }
        let admins = self.admin_emails().await?;

        let notification = Notification {
            recipients: admins.clone(),
            subject: format!("Payroll Approved: {}", location),
            body: format!(
                "Hello Admin Team,\n\nThe payroll for {} covering {} to {} has been approved for your records.\n\nRegards,\nPayroll Automation System\n",
                location,
                fmt_date(period.start),
                fmt_date(period.end)
            ),
            attachments: vec![Attachment::csv(csv.file_name.clone(), csv.bytes.clone())],
        };
        self.send(&notification).await?;

        let record = ApprovalRecord::new(location, period.id(), self.clock.now());
        self.approvals.upsert(&record).await?;
        info!(key = %record.key(), users = csv.users, "Payroll approved");

        let pending = self.pending(&record.period_id).await?;
        let final_notice = if pending.is_empty() {
            self.send_final(&period, admins).await
        } else {
            FinalNotice::NotReady { pending }
        };

        Ok(ApprovalOutcome {
            record,
            period,
            users: csv.users,
            final_notice,
        })
    }

    async fn send_final(&self, period: &PayPeriod, admins: Vec<String>) -> FinalNotice {
        let mut attachments = Vec::new();
        for location in &self.locations {
            match self.reports.payroll_csv(location, period).await {
                Ok(csv) if csv.is_empty() => {
                    info!(location = %location, "No payroll data, skipping attachment");
                }
                Ok(csv) => attachments.push(Attachment::csv(csv.file_name, csv.bytes)),
                Err(e) => warn!(location = %location, error = %e, "Could not build payroll CSV"),
            }
        }

        let count = attachments.len();
        let notification = Notification {
            recipients: admins,
            subject: FINAL_SUBJECT.to_string(),
            body: format!(
                "Hello Admin Team,\n\nAll locations have approved their payroll for {} to {}.\nAttached are the CSV summaries for each location.\n\nRegards,\nPayroll Automation System\n",
                fmt_date(period.start),
                fmt_date(period.end)
            ),
            attachments,
        };
        match self.send(&notification).await {
            Ok(()) => {
                info!(period = %period.id(), attachments = count, "Final payroll email sent");
                FinalNotice::Sent { attachments: count }
            }
            Err(e) => {
                error!(period = %period.id(), error = %e, "Final payroll email failed");
                FinalNotice::Failed { error: e.to_string() }
            }
        }
    }

    /// Configured locations without an approval for `period_id`.
    pub async fn pending(&self, period_id: &str) -> Result<Vec<String>, AppError> {
        let approved: HashSet<String> = self
            .approvals
            .list_for_period(period_id)
            .await?
            .into_iter()
            .map(|r| r.location)
            .collect();
        Ok(self
            .locations
            .iter()
            .filter(|l| !approved.contains(*l))
            .cloned()
            .collect())
    }

    pub async fn all_approved(&self, period_id: &str) -> Result<bool, AppError> {
        Ok(self.pending(period_id).await?.is_empty())
    }

    pub async fn status(&self, location: &str, period_id: &str) -> Result<ApprovalState, AppError> {
        require_location(&self.locations, location)?;
        require("period", period_id)?;
        let record = self.approvals.get(location, period_id).await?;
        Ok(ApprovalState::from_record(record.as_ref()))
    }

    pub async fn list_approvals(&self, period_id: &str) -> Result<Vec<ApprovalRecord>, AppError> {
        require("period", period_id)?;
        self.approvals.list_for_period(period_id).await
    }

    pub fn current_period_id(&self) -> String {
        period_id(self.clock.today())
    }
}
