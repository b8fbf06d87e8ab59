use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{Member, SheetStatus};
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::shift::{EventKind, Shift, ShiftEvent};
use crate::services::LedgerWrite;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClockRequest {
    #[schema(example = "u-1001")]
    pub user_id: String,
    #[schema(example = "Everett")]
    pub location: String,
    /// Taken from the user's profile when omitted
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddShift {
    #[schema(example = "u-1001")]
    pub user_id: String,
    #[schema(example = "Everett")]
    pub location: String,
    #[schema(example = "2025-08-04T09:00:00", value_type = String, format = "date-time")]
    pub start: NaiveDateTime,
    #[schema(example = "2025-08-04T12:00:00", value_type = String, format = "date-time")]
    pub end: NaiveDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditShift {
    pub clock_in_id: String,
    pub clock_out_id: String,
    #[schema(example = "2025-08-04T09:00:00", value_type = String, format = "date-time")]
    pub start: NaiveDateTime,
    #[schema(example = "2025-08-04T12:00:00", value_type = String, format = "date-time")]
    pub end: NaiveDateTime,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ShiftIds {
    pub clock_in_id: String,
    pub clock_out_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditEvent {
    #[schema(example = "2025-08-04T09:05:00", value_type = String, format = "date-time")]
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserDayQuery {
    pub user_id: String,
    #[param(value_type = String, format = "date", example = "2025-08-04")]
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NameQuery {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventWriteResponse {
    #[schema(example = "Clock-in recorded")]
    pub message: String,
    pub event: ShiftEvent,
    pub sheet: SheetStatus,
}

impl EventWriteResponse {
    fn new(message: &str, write: LedgerWrite<ShiftEvent>) -> Self {
        Self {
            message: message.to_string(),
            event: write.value,
            sheet: write.sheet.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShiftWriteResponse {
    #[schema(example = "Shift added")]
    pub message: String,
    pub shift: Shift,
    pub sheet: SheetStatus,
}

impl ShiftWriteResponse {
    fn new(message: &str, write: LedgerWrite<Shift>) -> Self {
        Self {
            message: message.to_string(),
            shift: write.value,
            sheet: write.sheet.into(),
        }
    }
}

async fn clock(state: &AppState, body: ClockRequest, kind: EventKind) -> Result<HttpResponse, AppError> {
    let write = state
        .ledger
        .record_event(&body.user_id, &body.location, body.role, kind)
        .await?;
    let message = match kind {
        EventKind::ClockIn => "Clock-in recorded",
        EventKind::ClockOut => "Clock-out recorded",
    };
    Ok(HttpResponse::Created().json(EventWriteResponse::new(message, write)))
}

#[utoipa::path(
    post,
    path = "/api/clock-in",
    request_body = ClockRequest,
    responses(
        (status = 201, description = "Clock-in recorded", body = EventWriteResponse),
        (status = 400, description = "Missing user or unknown location"),
        (status = 404, description = "User not found")
    ),
    tag = "Shifts"
)]
pub async fn clock_in(state: web::Data<AppState>, body: web::Json<ClockRequest>) -> Result<HttpResponse, AppError> {
    clock(&state, body.into_inner(), EventKind::ClockIn).await
}

#[utoipa::path(
    post,
    path = "/api/clock-out",
    request_body = ClockRequest,
    responses(
        (status = 201, description = "Clock-out recorded", body = EventWriteResponse),
        (status = 400, description = "Missing user or unknown location"),
        (status = 404, description = "User not found")
    ),
    tag = "Shifts"
)]
pub async fn clock_out(state: web::Data<AppState>, body: web::Json<ClockRequest>) -> Result<HttpResponse, AppError> {
    clock(&state, body.into_inner(), EventKind::ClockOut).await
}

#[utoipa::path(
    get,
    path = "/api/roster/{location}",
    params(("location", Path, description = "Location name")),
    responses(
        (status = 200, description = "Staff working at the location", body = [Member]),
        (status = 400, description = "Unknown location")
    ),
    tag = "Shifts"
)]
pub async fn staff_roster(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let staff: Vec<Member> = state
        .ledger
        .staff_roster(&path.into_inner())
        .await?
        .into_iter()
        .map(Member::from)
        .collect();
    Ok(HttpResponse::Ok().json(staff))
}

#[utoipa::path(
    get,
    path = "/api/roster/{location}/find",
    params(("location", Path, description = "Location name"), NameQuery),
    responses(
        (status = 200, description = "Matching user", body = Member),
        (status = 404, description = "No user with that name")
    ),
    tag = "Shifts"
)]
pub async fn find_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<NameQuery>,
) -> Result<HttpResponse, AppError> {
    let user = state
        .ledger
        .find_user_by_name(&path.into_inner(), &query.first_name, &query.last_name)
        .await?;
    Ok(HttpResponse::Ok().json(Member::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/work-hours",
    params(UserDayQuery),
    responses(
        (status = 200, description = "Shifts and total hours for the day", body = crate::services::hours::WorkHours),
        (status = 400, description = "Missing user_id")
    ),
    tag = "Shifts"
)]
pub async fn work_hours(state: web::Data<AppState>, query: web::Query<UserDayQuery>) -> Result<HttpResponse, AppError> {
    let hours = state.hours.work_hours(&query.user_id, query.date).await?;
    Ok(HttpResponse::Ok().json(hours))
}

#[utoipa::path(
    get,
    path = "/api/shifts",
    params(UserDayQuery),
    responses(
        (status = 200, description = "Paired shifts with both event ids", body = [Shift])
    ),
    tag = "Shifts"
)]
pub async fn list_shifts(state: web::Data<AppState>, query: web::Query<UserDayQuery>) -> Result<HttpResponse, AppError> {
    let shifts = state.ledger.shifts_on(&query.user_id, query.date).await?;
    Ok(HttpResponse::Ok().json(shifts))
}

#[utoipa::path(
    post,
    path = "/api/shifts",
    request_body = AddShift,
    responses(
        (status = 201, description = "Shift added", body = ShiftWriteResponse),
        (status = 400, description = "End before start or unknown location"),
        (status = 404, description = "User not found")
    ),
    tag = "Shifts"
)]
pub async fn add_shift(state: web::Data<AppState>, body: web::Json<AddShift>) -> Result<HttpResponse, AppError> {
    let write = state
        .ledger
        .add_shift(&body.user_id, &body.location, body.start, body.end)
        .await?;
    Ok(HttpResponse::Created().json(ShiftWriteResponse::new("Shift added", write)))
}

#[utoipa::path(
    put,
    path = "/api/shifts",
    request_body = EditShift,
    responses(
        (status = 200, description = "Shift corrected", body = ShiftWriteResponse),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Events do not form a shift")
    ),
    tag = "Shifts"
)]
pub async fn edit_shift(state: web::Data<AppState>, body: web::Json<EditShift>) -> Result<HttpResponse, AppError> {
    let write = state
        .ledger
        .edit_shift(&body.clock_in_id, &body.clock_out_id, body.start, body.end)
        .await?;
    Ok(HttpResponse::Ok().json(ShiftWriteResponse::new("Shift updated", write)))
}

#[utoipa::path(
    delete,
    path = "/api/shifts",
    params(ShiftIds),
    responses(
        (status = 200, description = "Shift removed", body = ShiftWriteResponse),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Events do not form a shift")
    ),
    tag = "Shifts"
)]
pub async fn remove_shift(state: web::Data<AppState>, query: web::Query<ShiftIds>) -> Result<HttpResponse, AppError> {
    let write = state
        .ledger
        .remove_shift(&query.clock_in_id, &query.clock_out_id)
        .await?;
    Ok(HttpResponse::Ok().json(ShiftWriteResponse::new("Shift removed", write)))
}

#[utoipa::path(
    put,
    path = "/api/shifts/events/{event_id}",
    params(("event_id", Path, description = "Shift event ID")),
    request_body = EditEvent,
    responses(
        (status = 200, description = "Event corrected", body = EventWriteResponse),
        (status = 404, description = "Event not found", body = Object, example = json!({
            "error": "shift event 42 not found",
            "kind": "not_found"
        }))
    ),
    tag = "Shifts"
)]
pub async fn edit_event(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<EditEvent>,
) -> Result<HttpResponse, AppError> {
    let write = state.ledger.edit_event(&path.into_inner(), body.timestamp).await?;
    Ok(HttpResponse::Ok().json(EventWriteResponse::new("Event updated", write)))
}

#[utoipa::path(
    delete,
    path = "/api/shifts/events/{event_id}",
    params(("event_id", Path, description = "Shift event ID")),
    responses(
        (status = 200, description = "Event deleted", body = EventWriteResponse),
        (status = 404, description = "Event not found")
    ),
    tag = "Shifts"
)]
pub async fn delete_event(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let write = state.ledger.delete_event(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(EventWriteResponse::new("Event deleted", write)))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use serde_json::json;

    use crate::api::test_support::call;
    use crate::services::fixtures::Harness;

    #[actix_web::test]
    async fn clock_in_then_out_forms_a_shift() {
        let h = Harness::new("2025-08-04 09:00:00").await;
        let body = json!({ "user_id": "t1", "location": "Everett" });

        let (status, json) = call(&h, TestRequest::post().uri("/api/clock-in").set_json(&body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["event"]["event"], "clock-in");
        assert_eq!(json["event"]["role"], "tutor");
        assert_eq!(json["sheet"]["synced"], true);

        h.clock.advance(chrono::Duration::hours(2));
        let (status, _) = call(&h, TestRequest::post().uri("/api/clock-out").set_json(&body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, json) = call(
            &h,
            TestRequest::get().uri("/api/work-hours?user_id=t1&date=2025-08-04"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_hours"], 2.0);
    }

    #[actix_web::test]
    async fn unknown_user_maps_to_404_and_bad_location_to_400() {
        let h = Harness::new("2025-08-04 09:00:00").await;
        let (status, json) = call(
            &h,
            TestRequest::post()
                .uri("/api/clock-in")
                .set_json(json!({ "user_id": "ghost", "location": "Everett" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["kind"], "not_found");

        let (status, _) = call(
            &h,
            TestRequest::post()
                .uri("/api/clock-in")
                .set_json(json!({ "user_id": "t1", "location": "Atlantis" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn manager_can_add_list_and_remove_a_shift() {
        let h = Harness::new("2025-08-04 18:00:00").await;
        let (status, json) = call(
            &h,
            TestRequest::post().uri("/api/shifts").set_json(json!({
                "user_id": "t1",
                "location": "Everett",
                "start": "2025-08-04T09:00:00",
                "end": "2025-08-04T12:00:00"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let clock_in = json["shift"]["clock_in_id"].as_str().unwrap().to_string();
        let clock_out = json["shift"]["clock_out_id"].as_str().unwrap().to_string();

        let (_, listed) = call(&h, TestRequest::get().uri("/api/shifts?user_id=t1&date=2025-08-04")).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        // swapped ids are not a shift
        let (status, json) = call(
            &h,
            TestRequest::delete().uri(&format!(
                "/api/shifts?clock_in_id={}&clock_out_id={}",
                clock_out, clock_in
            )),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["kind"], "state");

        let (status, _) = call(
            &h,
            TestRequest::delete().uri(&format!(
                "/api/shifts?clock_in_id={}&clock_out_id={}",
                clock_in, clock_out
            )),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[actix_web::test]
    async fn editing_a_missing_event_is_404() {
        let h = Harness::new("2025-08-04 18:00:00").await;
        let (status, _) = call(
            &h,
            TestRequest::put()
                .uri("/api/shifts/events/nope")
                .set_json(json!({ "timestamp": "2025-08-04T09:00:00" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn roster_lists_staff_only() {
        let h = Harness::new("2025-08-04 18:00:00").await;
        let (status, json) = call(&h, TestRequest::get().uri("/api/roster/Everett")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["t1", "t2"]);

        let (status, json) = call(
            &h,
            TestRequest::get().uri("/api/roster/Everett/find?first_name=grace&last_name=hopper"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["role"], "juniorProjectManager");
    }
}
