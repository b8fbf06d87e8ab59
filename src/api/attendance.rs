use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::Member;
use crate::error::AppError;
use crate::model::attendance::AttendanceStatus;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkAttendance {
    #[schema(example = "Everett")]
    pub location: String,
    #[schema(example = "s-2001")]
    pub student_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CountQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date", example = "2025-08-04")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub location: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[schema(example = 12)]
    pub present: usize,
}

#[utoipa::path(
    get,
    path = "/api/attendance/{location}/students",
    params(("location", Path, description = "Location name")),
    responses(
        (status = 200, description = "Students enrolled at the location", body = [Member]),
        (status = 400, description = "Unknown location")
    ),
    tag = "Attendance"
)]
pub async fn students(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let students: Vec<Member> = state
        .attendance
        .roster(&path.into_inner())
        .await?
        .into_iter()
        .map(Member::from)
        .collect();
    Ok(HttpResponse::Ok().json(students))
}

#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 200, description = "Today's record after the mark", body = crate::model::attendance::AttendanceRecord),
        (status = 400, description = "Missing student or unknown location")
    ),
    tag = "Attendance"
)]
pub async fn mark(state: web::Data<AppState>, body: web::Json<MarkAttendance>) -> Result<HttpResponse, AppError> {
    let record = state
        .attendance
        .mark(&body.location, &body.student_id, body.status)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    put,
    path = "/api/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 200, description = "Today's record after the edit", body = crate::model::attendance::AttendanceRecord),
        (status = 404, description = "No record for today or no mark for the student")
    ),
    tag = "Attendance"
)]
pub async fn edit(state: web::Data<AppState>, body: web::Json<MarkAttendance>) -> Result<HttpResponse, AppError> {
    let record = state
        .attendance
        .edit(&body.location, &body.student_id, body.status)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{location}/count",
    params(("location", Path, description = "Location name"), CountQuery),
    responses(
        (status = 200, description = "Present students, zero when nothing is recorded", body = CountResponse)
    ),
    tag = "Attendance"
)]
pub async fn count(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CountQuery>,
) -> Result<HttpResponse, AppError> {
    let location = path.into_inner();
    let present = state.attendance.count_present(&location, query.date).await?;
    Ok(HttpResponse::Ok().json(CountResponse {
        location,
        date: query.date,
        present,
    }))
}
