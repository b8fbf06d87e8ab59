use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::model::period::PayPeriod;
use crate::services::hours::UserHours;
use crate::services::require_location;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PeriodQuery {
    /// Pay period id such as `2025-8-16`; defaults to the current period
    pub period: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DateQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CleanupQuery {
    /// Workbook to prune; defaults to the summary workbook
    pub workbook: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HoursReport {
    pub location: String,
    #[schema(example = "2025-8-1")]
    pub period_id: String,
    pub period: PayPeriod,
    pub users: Vec<UserHours>,
}

pub(crate) fn resolve_period(state: &AppState, id: Option<&str>) -> Result<PayPeriod, AppError> {
    match id {
        Some(id) => PayPeriod::from_id(id)
            .ok_or_else(|| AppError::validation(format!("invalid pay period id '{}'", id))),
        None => Ok(state.reports.current_period()),
    }
}

#[utoipa::path(
    get,
    path = "/api/reports/{location}/hours",
    params(("location", Path, description = "Location name"), PeriodQuery),
    responses(
        (status = 200, description = "Hours per user for the period", body = HoursReport),
        (status = 400, description = "Unknown location or malformed period id")
    ),
    tag = "Reports"
)]
pub async fn hours(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PeriodQuery>,
) -> Result<HttpResponse, AppError> {
    let location = path.into_inner();
    require_location(state.reports.locations(), &location)?;
    let period = resolve_period(&state, query.period.as_deref())?;

    let users = state.hours.aggregate(&location, &period).await?;
    Ok(HttpResponse::Ok().json(HoursReport {
        location,
        period_id: period.id(),
        period,
        users,
    }))
}

#[utoipa::path(
    post,
    path = "/api/reports/{location}/log",
    params(("location", Path, description = "Location name")),
    responses(
        (status = 200, description = "Log sheet rewritten", body = crate::services::reports::SheetWrite),
        (status = 502, description = "Sheet storage unavailable")
    ),
    tag = "Reports"
)]
pub async fn regenerate_log(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let written = state.reports.regenerate_log(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(written))
}

#[utoipa::path(
    post,
    path = "/api/reports/{location}/summary",
    params(("location", Path, description = "Location name")),
    responses(
        (status = 200, description = "Summary rewritten and old sheets pruned", body = crate::services::reports::SummaryReport),
        (status = 502, description = "Sheet storage unavailable")
    ),
    tag = "Reports"
)]
pub async fn regenerate_summary(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let report = state.reports.regenerate_summary(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    post,
    path = "/api/reports/{location}/attendance",
    params(("location", Path, description = "Location name"), DateQuery),
    responses(
        (status = 200, description = "Daily attendance sheet rewritten", body = crate::services::reports::SheetWrite)
    ),
    tag = "Reports"
)]
pub async fn regenerate_attendance(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<DateQuery>,
) -> Result<HttpResponse, AppError> {
    let date = query.date.unwrap_or_else(|| state.reports.today());
    let written = state
        .reports
        .regenerate_attendance(&path.into_inner(), date)
        .await?;
    Ok(HttpResponse::Ok().json(written))
}

#[utoipa::path(
    post,
    path = "/api/reports/attendance/monthly",
    responses(
        (status = 200, description = "Previous month's averages recorded", body = crate::services::reports::MonthlyAttendance)
    ),
    tag = "Reports"
)]
pub async fn monthly_attendance(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let today = state.reports.today();
    let report = state.reports.monthly_attendance(today).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    post,
    path = "/api/reports/cleanup",
    params(CleanupQuery),
    responses(
        (status = 200, description = "Expired sheets deleted", body = crate::services::reports::CleanupReport),
        (status = 400, description = "Workbook is not a report workbook")
    ),
    tag = "Reports"
)]
pub async fn cleanup(state: web::Data<AppState>, query: web::Query<CleanupQuery>) -> Result<HttpResponse, AppError> {
    let books = state.reports.workbooks();
    let workbook = match query.workbook.as_deref() {
        None => books.summary.clone(),
        Some(name) if [&books.log, &books.summary, &books.attendance]
            .iter()
            .any(|b| b.as_str() == name) =>
        {
            name.to_string()
        }
        Some(name) => {
            return Err(AppError::validation(format!("'{}' is not a dated report workbook", name)));
        }
    };
    let report = state.reports.cleanup(&workbook).await?;
    Ok(HttpResponse::Ok().json(report))
}
