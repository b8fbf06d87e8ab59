use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which half of the month a pay period covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Half {
    /// Days 1 to 15
    First,
    /// Day 16 to the last day of the month
    Second,
}

impl Half {
    fn start_day(self) -> u32 {
        match self {
            Half::First => 1,
            Half::Second => 16,
        }
    }
}

/// A fixed half-month pay period. Periods tile the calendar: every date
/// belongs to exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct PayPeriod {
    #[schema(example = "2025-08-16", value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(example = "2025-08-31", value_type = String, format = "date")]
    pub end: NaiveDate,
    pub half: Half,
}

impl PayPeriod {
    /// The period enclosing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let (year, month) = (date.year(), date.month());
        if date.day() > 15 {
            PayPeriod {
                start: ymd(year, month, 16),
                end: last_day_of_month(year, month),
                half: Half::Second,
            }
        } else {
            PayPeriod {
                start: ymd(year, month, 1),
                end: ymd(year, month, 15),
                half: Half::First,
            }
        }
    }

    /// Stable identifier `"{year}-{month}-{1|16}"`, e.g. `2025-8-16`.
    pub fn id(&self) -> String {
        format!(
            "{}-{}-{}",
            self.start.year(),
            self.start.month(),
            self.half.start_day()
        )
    }

    /// Inverse of [`PayPeriod::id`]. Zero-padded months are accepted too.
    pub fn from_id(id: &str) -> Option<Self> {
        let mut parts = id.trim().split('-');
        let year: i32 = parts.next()?.parse().ok()?;
        let month: u32 = parts.next()?.parse().ok()?;
        let day: u32 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || !(day == 1 || day == 16) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day).map(Self::containing)
    }

    /// Inclusive lower bound for timestamp queries.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// Exclusive upper bound for timestamp queries (midnight after `end`).
    pub fn ends_before(&self) -> NaiveDateTime {
        (self.end + Duration::days(1)).and_time(NaiveTime::MIN)
    }

    pub fn log_sheet_name(&self, location: &str) -> String {
        format!("{} - {} to {}", location, fmt_date(self.start), fmt_date(self.end))
    }

    pub fn summary_sheet_name(&self, location: &str) -> String {
        format!(
            "{} Summary - {} to {}",
            location,
            fmt_date(self.start),
            fmt_date(self.end)
        )
    }

    pub fn payroll_csv_name(&self, location: &str) -> String {
        format!(
            "{}_payroll_{}_to_{}.csv",
            location,
            fmt_date(self.start),
            fmt_date(self.end)
        )
    }
}

pub fn period_for(date: NaiveDate) -> PayPeriod {
    PayPeriod::containing(date)
}

pub fn period_id(date: NaiveDate) -> String {
    PayPeriod::containing(date).id()
}

/// Pulls the start date out of a sheet title such as
/// `"Everett - 2025-08-01 to 2025-08-15"` or
/// `"Everett Summary - 2025-08-01 to 2025-08-15"`.
pub fn sheet_start_date(title: &str) -> Option<NaiveDate> {
    let (_, rest) = title.split_once(" - ")?;
    let start = rest.split(" to ").next()?;
    NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").ok()
}

pub fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    ymd(next_year, next_month, 1) - Duration::days(1)
}

// Callers only pass day 1, 15 or 16 of a valid month.
fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}
