//! Local wall-clock access that tests can pin.

use std::sync::RwLock;

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};

/// Source of the current local date and time.
pub trait Clock: Send + Sync {
    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Current instant in the process' timezone.
    fn now_zoned(&self) -> DateTime<Local> {
        resolve_local(&Local, self.now())
    }
}

/// The instant a wall-clock time denotes in `tz`.
///
/// An ambiguous time (clocks going back) resolves to its first occurrence. A
/// time skipped by clocks going forward resolves to the first valid minute
/// after the gap.
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, at: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&at) {
        LocalResult::Single(instant) => instant,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => (1..=24 * 60)
            .find_map(|minutes| {
                tz.from_local_datetime(&(at + TimeDelta::minutes(minutes)))
                    .earliest()
            })
            .unwrap_or_else(|| tz.from_utc_datetime(&at)),
    }
}

/// The system clock in the process' local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn now_zoned(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that returns a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Midday on the given date.
    pub fn on_date(date: NaiveDate) -> Self {
        Self::new(date.and_hms_opt(12, 0, 0).unwrap_or_default())
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.read().map(|guard| *guard).unwrap_or_default()
    }
}
