use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, instrument, warn};

use super::hours::HoursAggregator;
use super::reports::ReportService;
use super::{LedgerWrite, SheetSync, require, require_location};
use crate::error::AppError;
use crate::model::period::period_for;
use crate::model::role::Role;
use crate::model::shift::{EventKind, Pairing, Shift, ShiftEvent};
use crate::model::user::UserProfile;
use crate::store::{ShiftStore, UserDirectory};
use crate::utils::clock::Clock;

/// Pairs a chronologically sorted event stream of one user in a single
/// left-to-right pass. A clock-in pairs only with the event right after it;
/// a clock-in followed by anything else is incomplete, and a clock-out with
/// no open clock-in before it is dropped. Every event lands in at most one
/// shift.
pub fn pair_events(events: &[ShiftEvent]) -> Vec<Pairing> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < events.len() {
        let current = &events[i];
        if current.is_clock_in() {
            match events.get(i + 1) {
                Some(next) if next.is_clock_out() && next.user_id == current.user_id => {
                    out.push(Pairing::Complete(Shift {
                        user_id: current.user_id.clone(),
                        location: current.location.clone(),
                        clock_in_id: current.id.clone(),
                        clock_out_id: next.id.clone(),
                        start: current.timestamp,
                        end: next.timestamp,
                    }));
                    i += 2;
                    continue;
                }
                _ => out.push(Pairing::Incomplete(current.clone())),
            }
        }
        i += 1;
    }
    out
}

fn shift_of(clock_in: &ShiftEvent, clock_out: &ShiftEvent) -> Shift {
    Shift {
        user_id: clock_in.user_id.clone(),
        location: clock_in.location.clone(),
        clock_in_id: clock_in.id.clone(),
        clock_out_id: clock_out.id.clone(),
        start: clock_in.timestamp,
        end: clock_out.timestamp,
    }
}

/// The two events must be a clock-in and a clock-out of the same user at the
/// same location.
fn check_pair(clock_in: &ShiftEvent, clock_out: &ShiftEvent) -> Result<(), AppError> {
    if !clock_in.is_clock_in() || !clock_out.is_clock_out() {
        return Err(AppError::state(format!(
            "events {} and {} are not a clock-in followed by a clock-out",
            clock_in.id, clock_out.id
        )));
    }
    if clock_in.user_id != clock_out.user_id || clock_in.location != clock_out.location {
        return Err(AppError::state(format!(
            "events {} and {} belong to different users or locations",
            clock_in.id, clock_out.id
        )));
    }
    Ok(())
}

fn check_order(start: NaiveDateTime, end: NaiveDateTime) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::validation("shift end must not be before its start"));
    }
    Ok(())
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

pub struct ShiftLedger {
    shifts: Arc<dyn ShiftStore>,
    directory: Arc<dyn UserDirectory>,
    hours: Arc<HoursAggregator>,
    reports: Arc<ReportService>,
    clock: Arc<dyn Clock>,
    locations: Vec<String>,
}

impl ShiftLedger {
    pub fn new(
        shifts: Arc<dyn ShiftStore>,
        directory: Arc<dyn UserDirectory>,
        hours: Arc<HoursAggregator>,
        reports: Arc<ReportService>,
        clock: Arc<dyn Clock>,
        locations: Vec<String>,
    ) -> Self {
        Self {
            shifts,
            directory,
            hours,
            reports,
            clock,
            locations,
        }
    }

    async fn profile(&self, user_id: &str) -> Result<UserProfile, AppError> {
        require("user_id", user_id)?;
        self.directory
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {} not found", user_id)))
    }

    async fn event(&self, id: &str) -> Result<ShiftEvent, AppError> {
        self.shifts
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("shift event {} not found", id)))
    }

    /// Rewrites the log sheet of every period touched by `timestamps`.
    async fn resync(&self, location: &str, timestamps: &[NaiveDateTime]) -> SheetSync {
        let periods: BTreeSet<NaiveDate> = timestamps
            .iter()
            .map(|ts| period_for(ts.date()).start)
            .collect();

        let mut sync = SheetSync::Synced;
        for start in periods {
            let period = period_for(start);
            let result = self.reports.regenerate_log_for(location, &period).await;
            sync = sync.and(SheetSync::from_result(result));
        }
        if !sync.is_synced() {
            warn!(location, "Ledger updated but the log sheet is out of date");
        }
        sync
    }

    /// Appends a clock event stamped with the current time. Open events are
    /// not checked, so a second clock-in simply leaves the first unpaired.
    #[instrument(skip(self))]
    pub async fn record_event(
        &self,
        user_id: &str,
        location: &str,
        role: Option<Role>,
        kind: EventKind,
    ) -> Result<LedgerWrite<ShiftEvent>, AppError> {
        require_location(&self.locations, location)?;
        let profile = self.profile(user_id).await?;
        let role = role.unwrap_or_else(|| profile.role());

        let event = ShiftEvent::new(kind, user_id, location, role, self.clock.now());
        self.shifts.insert(&event).await?;
        info!(event_id = %event.id, user_id, location, kind = %kind, "Clock event recorded");

        let sheet = SheetSync::from_result(self.reports.append_live_event(&event, &profile).await);
        Ok(LedgerWrite { value: event, sheet })
    }

    #[instrument(skip(self))]
    pub async fn edit_event(
        &self,
        event_id: &str,
        timestamp: NaiveDateTime,
    ) -> Result<LedgerWrite<ShiftEvent>, AppError> {
        let mut event = self.event(event_id).await?;
        let previous = event.timestamp;

        if !self.shifts.update_timestamp(event_id, timestamp).await? {
            return Err(AppError::not_found(format!("shift event {} not found", event_id)));
        }
        event.timestamp = timestamp;
        info!(event_id, %previous, %timestamp, "Shift event corrected");

        let sheet = self.resync(&event.location, &[previous, timestamp]).await;
        Ok(LedgerWrite { value: event, sheet })
    }

    #[instrument(skip(self))]
    pub async fn delete_event(&self, event_id: &str) -> Result<LedgerWrite<ShiftEvent>, AppError> {
        let event = self.event(event_id).await?;
        self.shifts.delete(&[event.id.clone()]).await?;
        info!(event_id, user_id = %event.user_id, "Shift event deleted");

        let sheet = self.resync(&event.location, &[event.timestamp]).await;
        Ok(LedgerWrite { value: event, sheet })
    }

    /// Inserts a clock-in and clock-out for a shift that was never recorded.
    #[instrument(skip(self))]
    pub async fn add_shift(
        &self,
        user_id: &str,
        location: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<LedgerWrite<Shift>, AppError> {
        require_location(&self.locations, location)?;
        check_order(start, end)?;
        let role = self.profile(user_id).await?.role();

        let clock_in = ShiftEvent::new(EventKind::ClockIn, user_id, location, role, start);
        let clock_out = ShiftEvent::new(EventKind::ClockOut, user_id, location, role, end);
        self.shifts.insert_pair(&clock_in, &clock_out).await?;
        info!(user_id, location, %start, %end, "Shift added");

        let sheet = self.resync(location, &[start, end]).await;
        Ok(LedgerWrite {
            value: shift_of(&clock_in, &clock_out),
            sheet,
        })
    }

    /// Moves both ends of an existing shift in one store transaction.
    #[instrument(skip(self))]
    pub async fn edit_shift(
        &self,
        clock_in_id: &str,
        clock_out_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<LedgerWrite<Shift>, AppError> {
        check_order(start, end)?;
        let mut clock_in = self.event(clock_in_id).await?;
        let mut clock_out = self.event(clock_out_id).await?;
        check_pair(&clock_in, &clock_out)?;

        let touched = [clock_in.timestamp, clock_out.timestamp, start, end];
        self.shifts
            .update_timestamps(&[
                (clock_in.id.clone(), start),
                (clock_out.id.clone(), end),
            ])
            .await?;
        clock_in.timestamp = start;
        clock_out.timestamp = end;
        info!(clock_in_id, clock_out_id, %start, %end, "Shift corrected");

        let sheet = self.resync(&clock_in.location, &touched).await;
        Ok(LedgerWrite {
            value: shift_of(&clock_in, &clock_out),
            sheet,
        })
    }

    #[instrument(skip(self))]
    pub async fn remove_shift(&self, clock_in_id: &str, clock_out_id: &str) -> Result<LedgerWrite<Shift>, AppError> {
        let clock_in = self.event(clock_in_id).await?;
        let clock_out = self.event(clock_out_id).await?;
        check_pair(&clock_in, &clock_out)?;

        self.shifts
            .delete(&[clock_in.id.clone(), clock_out.id.clone()])
            .await?;
        info!(clock_in_id, clock_out_id, user_id = %clock_in.user_id, "Shift removed");

        let sheet = self
            .resync(&clock_in.location, &[clock_in.timestamp, clock_out.timestamp])
            .await;
        Ok(LedgerWrite {
            value: shift_of(&clock_in, &clock_out),
            sheet,
        })
    }

    pub async fn shifts_on(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Shift>, AppError> {
        self.hours.shifts_on(user_id, date).await
    }

    /// Case-insensitive lookup of a user at `location` by first and last name.
    pub async fn find_user_by_name(&self, location: &str, first: &str, last: &str) -> Result<UserProfile, AppError> {
        require("first_name", first)?;
        require("last_name", last)?;
        self.directory
            .at_location(location)
            .await?
            .into_iter()
            .find(|u| same_name(&u.first_name, first) && same_name(&u.last_name, last))
            .ok_or_else(|| AppError::not_found(format!("no user named {} {} at {}", first, last, location)))
    }

    /// Non-student users at `location`, ordered by name.
    pub async fn staff_roster(&self, location: &str) -> Result<Vec<UserProfile>, AppError> {
        require_location(&self.locations, location)?;
        let mut staff: Vec<UserProfile> = self
            .directory
            .at_location(location)
            .await?
            .into_iter()
            .filter(|u| u.role().is_staff())
            .collect();
        staff.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(staff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{Harness, at, event};
    use crate::services::reports::LOG_HEADER;
    use crate::sink::header_row;
    use std::sync::atomic::Ordering;

    fn kinds(pairings: &[Pairing]) -> Vec<&'static str> {
        pairings
            .iter()
            .map(|p| match p {
                Pairing::Complete(_) => "shift",
                Pairing::Incomplete(_) => "open",
            })
            .collect()
    }

    #[test]
    fn pairs_adjacent_events_greedily() {
        let events = vec![
            event("t1", "Everett", EventKind::ClockIn, "2025-08-04 09:00:00"),
            event("t1", "Everett", EventKind::ClockIn, "2025-08-04 10:00:00"),
            event("t1", "Everett", EventKind::ClockOut, "2025-08-04 11:00:00"),
        ];
        let pairings = pair_events(&events);
        assert_eq!(kinds(&pairings), vec!["open", "shift"]);
        let shift = pairings[1].shift().unwrap();
        assert_eq!(shift.clock_in_id, events[1].id);
        assert_eq!(shift.clock_out_id, events[2].id);
        assert_eq!(shift.seconds(), 3600);
    }

    #[test]
    fn orphan_clock_outs_are_ignored_and_events_used_once() {
        let events = vec![
            event("t1", "Everett", EventKind::ClockOut, "2025-08-04 08:00:00"),
            event("t1", "Everett", EventKind::ClockIn, "2025-08-04 09:00:00"),
            event("t1", "Everett", EventKind::ClockOut, "2025-08-04 10:00:00"),
            event("t1", "Everett", EventKind::ClockOut, "2025-08-04 11:00:00"),
            event("t1", "Everett", EventKind::ClockIn, "2025-08-04 12:00:00"),
        ];
        let pairings = pair_events(&events);
        assert_eq!(kinds(&pairings), vec!["shift", "open"]);

        let mut used: Vec<&str> = pairings
            .iter()
            .filter_map(|p| p.shift())
            .flat_map(|s| [s.clock_in_id.as_str(), s.clock_out_id.as_str()])
            .collect();
        let before = used.len();
        used.dedup();
        assert_eq!(used.len(), before);
        assert!(pair_events(&[]).is_empty());
    }

    #[test]
    fn shift_count_matches_adjacent_pairs() {
        use EventKind::{ClockIn as I, ClockOut as O};
        let pattern = [I, O, I, I, O, O, I, O, I];
        let events: Vec<ShiftEvent> = pattern
            .iter()
            .enumerate()
            .map(|(h, k)| event("t1", "Everett", *k, &format!("2025-08-04 {:02}:00:00", h + 8)))
            .collect();
        // (in, out) windows can never overlap
        let expected = pattern.windows(2).filter(|w| *w == [I, O]).count();
        let got = pair_events(&events).iter().filter(|p| p.shift().is_some()).count();
        assert_eq!(expected, 3);
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn record_event_appends_live_row_and_resolves_role() {
        let h = Harness::new("2025-08-04 09:00:00").await;
        let write = h
            .ledger
            .record_event("t1", "Everett", None, EventKind::ClockIn)
            .await
            .unwrap();
        assert_eq!(write.value.role, Role::Tutor);
        assert!(write.sheet.is_synced());

        let sheet = h
            .sink
            .sheet("Log", "Everett - 2025-08-01 to 2025-08-15")
            .await
            .unwrap();
        assert_eq!(sheet[0], header_row(&LOG_HEADER));
        assert_eq!(
            sheet[1],
            vec!["Everett", "tutor", "Ada", "Byron", "2025-08-04T09:00:00", "clock-in"]
        );
    }

    #[tokio::test]
    async fn live_event_prunes_expired_log_sheets() {
        use crate::sink::TabularSink;

        let h = Harness::new("2025-08-04 09:00:00").await;
        let old = "Everett - 2024-12-01 to 2024-12-15";
        let recent = "Everett - 2025-07-16 to 2025-07-31";
        for name in [old, recent] {
            h.sink.replace_sheet("Log", name, &[header_row(&LOG_HEADER)]).await.unwrap();
        }

        let write = h
            .ledger
            .record_event("t1", "Everett", None, EventKind::ClockIn)
            .await
            .unwrap();
        assert!(write.sheet.is_synced());
        assert!(h.sink.sheet("Log", old).await.is_none());
        assert!(h.sink.sheet("Log", recent).await.is_some());
        assert!(h.sink.sheet("Log", "Everett - 2025-08-01 to 2025-08-15").await.is_some());
    }

    #[tokio::test]
    async fn duplicate_clock_ins_are_accepted() {
        let h = Harness::new("2025-08-04 09:00:00").await;
        for _ in 0..2 {
            h.ledger
                .record_event("t1", "Everett", None, EventKind::ClockIn)
                .await
                .unwrap();
        }
        assert_eq!(h.shifts.all().await.len(), 2);
    }

    #[tokio::test]
    async fn record_event_rejects_unknown_users_and_locations() {
        let h = Harness::new("2025-08-04 09:00:00").await;
        assert!(matches!(
            h.ledger.record_event("ghost", "Everett", None, EventKind::ClockIn).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            h.ledger.record_event("t1", "Atlantis", None, EventKind::ClockIn).await,
            Err(AppError::Validation(_))
        ));
        assert!(h.shifts.all().await.is_empty());
    }

    #[tokio::test]
    async fn sheet_outage_keeps_the_ledger_write() {
        let h = Harness::new("2025-08-04 09:00:00").await;
        h.sink.offline.store(true, Ordering::Relaxed);

        let write = h
            .ledger
            .record_event("t1", "Everett", Some(Role::Tutor), EventKind::ClockIn)
            .await
            .unwrap();
        assert!(matches!(write.sheet, SheetSync::Failed { .. }));
        assert_eq!(h.shifts.all().await.len(), 1);
    }

    #[tokio::test]
    async fn corrections_regenerate_the_log() {
        let h = Harness::new("2025-08-04 18:00:00").await;
        let added = h
            .ledger
            .add_shift("t1", "Everett", at("2025-08-04 09:00:00"), at("2025-08-04 12:00:00"))
            .await
            .unwrap();
        assert!(added.sheet.is_synced());
        let sheet_name = "Everett - 2025-08-01 to 2025-08-15";
        assert_eq!(h.sink.sheet("Log", sheet_name).await.unwrap().len(), 3);

        let edited = h
            .ledger
            .edit_event(&added.value.clock_out_id, at("2025-08-04 13:00:00"))
            .await
            .unwrap();
        assert_eq!(edited.value.timestamp, at("2025-08-04 13:00:00"));
        let sheet = h.sink.sheet("Log", sheet_name).await.unwrap();
        assert_eq!(sheet[2][4], "2025-08-04T13:00:00");

        h.ledger.delete_event(&added.value.clock_in_id).await.unwrap();
        assert_eq!(h.sink.sheet("Log", sheet_name).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn add_shift_validates_before_writing() {
        let h = Harness::new("2025-08-04 18:00:00").await;
        assert!(matches!(
            h.ledger
                .add_shift("t1", "Everett", at("2025-08-04 12:00:00"), at("2025-08-04 09:00:00"))
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            h.ledger
                .add_shift("ghost", "Everett", at("2025-08-04 09:00:00"), at("2025-08-04 12:00:00"))
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(h.shifts.all().await.is_empty());
    }

    #[tokio::test]
    async fn zero_length_shift_stays_paired() {
        let day = at("2025-08-04 00:00:00").date();
        let t = at("2025-08-04 09:00:00");
        // ids are random, so repeat to cover both id orders
        for _ in 0..20 {
            let h = Harness::new("2025-08-04 18:00:00").await;
            let added = h.ledger.add_shift("t1", "Everett", t, t).await.unwrap().value;

            let shifts = h.ledger.shifts_on("t1", day).await.unwrap();
            assert_eq!(shifts, vec![added.clone()]);

            h.ledger
                .remove_shift(&added.clock_in_id, &added.clock_out_id)
                .await
                .unwrap();
            assert!(h.shifts.all().await.is_empty());
        }
    }

    #[tokio::test]
    async fn shift_corrections_move_or_remove_both_events() {
        let h = Harness::new("2025-08-04 18:00:00").await;
        let shift = h
            .ledger
            .add_shift("t1", "Everett", at("2025-08-04 09:00:00"), at("2025-08-04 12:00:00"))
            .await
            .unwrap()
            .value;

        let moved = h
            .ledger
            .edit_shift(&shift.clock_in_id, &shift.clock_out_id, at("2025-08-04 10:00:00"), at("2025-08-04 14:00:00"))
            .await
            .unwrap();
        assert_eq!(moved.value.seconds(), 4 * 3600);

        let day = at("2025-08-04 00:00:00").date();
        let shifts = h.ledger.shifts_on("t1", day).await.unwrap();
        assert_eq!(shifts, vec![moved.value.clone()]);

        h.ledger
            .remove_shift(&shift.clock_in_id, &shift.clock_out_id)
            .await
            .unwrap();
        assert!(h.shifts.all().await.is_empty());
        assert!(h.ledger.shifts_on("t1", day).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mismatched_pairs_are_rejected_without_changes() {
        let h = Harness::new("2025-08-04 18:00:00").await;
        let a = h
            .ledger
            .add_shift("t1", "Everett", at("2025-08-04 09:00:00"), at("2025-08-04 10:00:00"))
            .await
            .unwrap()
            .value;
        let b = h
            .ledger
            .add_shift("t2", "Everett", at("2025-08-04 09:00:00"), at("2025-08-04 10:00:00"))
            .await
            .unwrap()
            .value;

        assert!(matches!(
            h.ledger.remove_shift(&a.clock_in_id, &b.clock_out_id).await,
            Err(AppError::State(_))
        ));
        assert!(matches!(
            h.ledger.remove_shift(&a.clock_out_id, &a.clock_in_id).await,
            Err(AppError::State(_))
        ));
        assert!(matches!(
            h.ledger.remove_shift(&a.clock_in_id, "missing").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(h.shifts.all().await.len(), 4);
    }

    #[tokio::test]
    async fn editing_an_old_event_rewrites_its_own_period() {
        let h = Harness::new("2025-08-20 18:00:00").await;
        let shift = h
            .ledger
            .add_shift("t1", "Everett", at("2025-08-04 09:00:00"), at("2025-08-04 10:00:00"))
            .await
            .unwrap()
            .value;
        h.ledger
            .edit_event(&shift.clock_out_id, at("2025-08-04 11:00:00"))
            .await
            .unwrap();

        let old = h.sink.sheet("Log", "Everett - 2025-08-01 to 2025-08-15").await.unwrap();
        assert_eq!(old[2][4], "2025-08-04T11:00:00");
        assert!(h.sink.sheet("Log", "Everett - 2025-08-16 to 2025-08-31").await.is_none());
    }

    #[tokio::test]
    async fn finds_users_by_name_and_lists_staff() {
        let h = Harness::new("2025-08-04 18:00:00").await;
        let user = h.ledger.find_user_by_name("Everett", " ada ", "BYRON").await.unwrap();
        assert_eq!(user.id, "t1");
        assert!(matches!(
            h.ledger.find_user_by_name("Everett", "No", "One").await,
            Err(AppError::NotFound(_))
        ));

        let staff: Vec<String> = h
            .ledger
            .staff_roster("Everett")
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert!(staff.contains(&"t1".to_string()));
        assert!(!staff.iter().any(|id| id.starts_with('s')));
    }
}
