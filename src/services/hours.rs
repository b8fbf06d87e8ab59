use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use super::ledger::pair_events;
use super::require;
use crate::error::AppError;
use crate::model::period::PayPeriod;
use crate::model::role::Role;
use crate::model::shift::{Shift, ShiftEvent, hours_from_seconds};
use crate::store::{ShiftStore, UserDirectory, Window};

/// Worked time of one user over one pay period.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserHours {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub seconds: i64,
    #[schema(example = 7.0)]
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WorkHours {
    pub user_id: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub shifts: Vec<Shift>,
    pub total_hours: f64,
}

pub fn day_window(date: NaiveDate) -> Window {
    let start = date.and_time(NaiveTime::MIN);
    Window::new(start, start + Duration::days(1))
}

/// Complete shifts in `events`, paired separately per location and ordered
/// by start time.
fn complete_shifts(events: Vec<ShiftEvent>) -> Vec<Shift> {
    let mut by_location: BTreeMap<String, Vec<ShiftEvent>> = BTreeMap::new();
    for event in events {
        by_location.entry(event.location.clone()).or_default().push(event);
    }

    let mut shifts: Vec<Shift> = by_location
        .values()
        .flat_map(|events| pair_events(events))
        .filter_map(|p| p.shift().cloned())
        .collect();
    shifts.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.clock_in_id.cmp(&b.clock_in_id)));
    shifts
}

pub struct HoursAggregator {
    shifts: Arc<dyn ShiftStore>,
    directory: Arc<dyn UserDirectory>,
}

impl HoursAggregator {
    pub fn new(shifts: Arc<dyn ShiftStore>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { shifts, directory }
    }

    /// Totals per roster user of `location` within `period`. Users without
    /// qualifying hours are left out; output is ordered by last name, first
    /// name, then id.
    #[instrument(skip(self, period), fields(period = %period.id()))]
    pub async fn aggregate(&self, location: &str, period: &PayPeriod) -> Result<Vec<UserHours>, AppError> {
        let roster = self.directory.at_location(location).await?;
        let window = Window::new(period.starts_at(), period.ends_before());
        let events = self.shifts.list_for_location(location, window).await?;

        // Store order is chronological, grouping keeps it
        let mut by_user: HashMap<String, Vec<ShiftEvent>> = HashMap::new();
        for event in events {
            by_user.entry(event.user_id.clone()).or_default().push(event);
        }

        let mut totals: Vec<UserHours> = roster
            .into_iter()
            .filter_map(|user| {
                let events = by_user.get(&user.id)?;
                let seconds: i64 = pair_events(events)
                    .iter()
                    .filter_map(|p| p.shift())
                    .map(Shift::seconds)
                    .sum();
                (seconds > 0).then(|| UserHours {
                    role: user.role(),
                    user_id: user.id,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    seconds,
                    hours: hours_from_seconds(seconds),
                })
            })
            .collect();

        totals.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        tracing::debug!(location, users = totals.len(), "Hours aggregated");
        Ok(totals)
    }

    /// Complete shifts of one user on one calendar day, across locations.
    pub async fn shifts_on(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Shift>, AppError> {
        require("user_id", user_id)?;
        let events = self.shifts.list_for_user(user_id, None, day_window(date)).await?;
        Ok(complete_shifts(events))
    }

    pub async fn work_hours(&self, user_id: &str, date: NaiveDate) -> Result<WorkHours, AppError> {
        let shifts = self.shifts_on(user_id, date).await?;
        let seconds: i64 = shifts.iter().map(Shift::seconds).sum();
        Ok(WorkHours {
            user_id: user_id.to_string(),
            date,
            shifts,
            total_hours: hours_from_seconds(seconds),
        })
    }
}
