use actix_web::{HttpResponse, web};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::reports::resolve_period;
use crate::error::AppError;
use crate::model::approval::{ApprovalRecord, ApprovalState};
use crate::model::period::PayPeriod;
use crate::services::approval::{ApprovalOutcome, FinalNotice};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ApprovalQuery {
    /// Pay period id such as `2025-8-16`; defaults to the current period
    pub period: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FinalNoticeView {
    /// `sent`, `not_ready` or `failed`
    #[schema(example = "not_ready")]
    pub status: String,
    pub attachments: Option<usize>,
    pub pending: Vec<String>,
    pub error: Option<String>,
}

impl From<FinalNotice> for FinalNoticeView {
    fn from(notice: FinalNotice) -> Self {
        match notice {
            FinalNotice::Sent { attachments } => FinalNoticeView {
                status: "sent".into(),
                attachments: Some(attachments),
                pending: Vec::new(),
                error: None,
            },
            FinalNotice::NotReady { pending } => FinalNoticeView {
                status: "not_ready".into(),
                attachments: None,
                pending,
                error: None,
            },
            FinalNotice::Failed { error } => FinalNoticeView {
                status: "failed".into(),
                attachments: None,
                pending: Vec::new(),
                error: Some(error),
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApprovalResponse {
    #[schema(example = "Payroll approved for Everett")]
    pub message: String,
    pub record: ApprovalRecord,
    pub period: PayPeriod,
    pub users: usize,
    pub final_notice: FinalNoticeView,
}

impl From<ApprovalOutcome> for ApprovalResponse {
    fn from(outcome: ApprovalOutcome) -> Self {
        ApprovalResponse {
            message: format!("Payroll approved for {}", outcome.record.location),
            record: outcome.record,
            period: outcome.period,
            users: outcome.users,
            final_notice: outcome.final_notice.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApprovalsResponse {
    #[schema(example = "2025-8-16")]
    pub period_id: String,
    pub approved: Vec<ApprovalRecord>,
    pub pending: Vec<String>,
    pub all_approved: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApprovalStatus {
    pub location: String,
    pub period_id: String,
    pub approved: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<NaiveDateTime>,
}

/// Validated period id from the query, or the current period's.
fn period_param(state: &AppState, query: &ApprovalQuery) -> Result<String, AppError> {
    match query.period.as_deref() {
        Some(id) => Ok(resolve_period(state, Some(id))?.id()),
        None => Ok(state.approval.current_period_id()),
    }
}

#[utoipa::path(
    post,
    path = "/api/payroll/{location}/approve",
    params(("location", Path, description = "Location name")),
    responses(
        (status = 200, description = "Payroll approved and emailed", body = ApprovalResponse),
        (status = 400, description = "Unknown location"),
        (status = 409, description = "Nothing to approve or no admin to notify", body = Object, example = json!({
            "error": "no payroll data for Everett in period 2025-8-16",
            "kind": "state"
        })),
        (status = 502, description = "Email could not be sent")
    ),
    tag = "Payroll"
)]
pub async fn approve(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let outcome = state.approval.approve(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApprovalResponse::from(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/payroll/approvals",
    params(ApprovalQuery),
    responses(
        (status = 200, description = "Approvals recorded for the period", body = ApprovalsResponse)
    ),
    tag = "Payroll"
)]
pub async fn list_approvals(
    state: web::Data<AppState>,
    query: web::Query<ApprovalQuery>,
) -> Result<HttpResponse, AppError> {
    let period_id = period_param(&state, &query)?;
    let approved = state.approval.list_approvals(&period_id).await?;
    let pending = state.approval.pending(&period_id).await?;
    let all_approved = state.approval.all_approved(&period_id).await?;

    Ok(HttpResponse::Ok().json(ApprovalsResponse {
        all_approved,
        period_id,
        approved,
        pending,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{location}/status",
    params(("location", Path, description = "Location name"), ApprovalQuery),
    responses(
        (status = 200, description = "Approval state of one location", body = ApprovalStatus)
    ),
    tag = "Payroll"
)]
pub async fn approval_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ApprovalQuery>,
) -> Result<HttpResponse, AppError> {
    let location = path.into_inner();
    let period_id = period_param(&state, &query)?;
    let status = state.approval.status(&location, &period_id).await?;
    let approved = status.is_approved();
    let approved_at = match status {
        ApprovalState::Approved { approved_at } => Some(approved_at),
        ApprovalState::Unapproved => None,
    };

    Ok(HttpResponse::Ok().json(ApprovalStatus {
        location,
        period_id,
        approved,
        approved_at,
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;

    use crate::api::test_support::call;
    use crate::model::shift::EventKind;
    use crate::services::fixtures::{Harness, event};
    use crate::store::ShiftStore;

    async fn worked(h: &Harness, user: &str, location: &str) {
        for (kind, ts) in [
            (EventKind::ClockIn, "2025-08-04 09:00:00"),
            (EventKind::ClockOut, "2025-08-04 11:00:00"),
        ] {
            h.shifts.insert(&event(user, location, kind, ts)).await.unwrap();
        }
    }

    #[actix_web::test]
    async fn empty_payroll_is_a_conflict() {
        let h = Harness::new("2025-08-06 18:00:00").await;
        let (status, json) = call(&h, TestRequest::post().uri("/api/payroll/Everett/approve")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["kind"], "state");
    }

    #[actix_web::test]
    async fn approvals_walk_to_completion() {
        let h = Harness::new("2025-08-06 18:00:00").await;
        worked(&h, "t1", "Everett").await;
        worked(&h, "t4", "Lynnwood").await;

        let (status, json) = call(&h, TestRequest::post().uri("/api/payroll/Everett/approve")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["final_notice"]["status"], "not_ready");
        assert_eq!(json["final_notice"]["pending"][0], "Lynnwood");

        let (_, json) = call(&h, TestRequest::get().uri("/api/payroll/approvals")).await;
        assert_eq!(json["period_id"], "2025-8-1");
        assert_eq!(json["all_approved"], false);

        let (_, json) = call(&h, TestRequest::post().uri("/api/payroll/Lynnwood/approve")).await;
        assert_eq!(json["final_notice"]["status"], "sent");
        assert_eq!(json["final_notice"]["attachments"], 2);

        let (_, json) = call(&h, TestRequest::get().uri("/api/payroll/approvals?period=2025-8-1")).await;
        assert_eq!(json["all_approved"], true);
        assert_eq!(json["approved"].as_array().unwrap().len(), 2);

        let (_, json) = call(&h, TestRequest::get().uri("/api/payroll/Everett/status")).await;
        assert_eq!(json["approved"], true);
    }
}
