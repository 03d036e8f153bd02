//! Civil day boundary
//!
//! "Daily" means a calendar day in one fixed zone, so every player shares
//! the same cutover regardless of where they are.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for tests and replays
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Maps instants to civil dates in the configured zone
#[derive(Clone)]
pub struct CivilCalendar {
    zone: Tz,
    clock: Arc<dyn Clock>,
}

impl CivilCalendar {
    pub fn new(zone: Tz, clock: Arc<dyn Clock>) -> Self {
        Self { zone, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Today's date in the civil zone
    pub fn today(&self) -> NaiveDate {
        self.date_of(self.clock.now())
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.zone).date_naive()
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}
