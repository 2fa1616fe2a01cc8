use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TrackerError};

/// Philippine time. Calendar decisions never use the host's timezone.
pub const LOCAL_OFFSET_SECS: i32 = 8 * 60 * 60;

pub const LOCAL_OFFSET: FixedOffset = match FixedOffset::east_opt(LOCAL_OFFSET_SECS) {
    Some(offset) => offset,
    None => panic!("UTC+8 is in range"),
};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// A calendar date as observed at UTC+8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDay(NaiveDate);

impl LocalDay {
    #[must_use]
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self(instant.with_timezone(&LOCAL_OFFSET).date_naive())
    }

    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    #[must_use]
    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// The following calendar day. Saturates at the last representable date.
    #[must_use]
    pub fn succ(self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    /// The preceding calendar day. Saturates at the first representable date.
    #[must_use]
    pub fn pred(self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }

    /// Whole days from `self` to `later` (negative if `later` is earlier).
    #[must_use]
    pub fn days_until(self, later: LocalDay) -> i64 {
        (later.0 - self.0).num_days()
    }

    #[must_use]
    pub fn is_day_before(self, other: LocalDay) -> bool {
        self.days_until(other) == 1
    }

    /// UTC instant of local midnight at the start of this day.
    #[must_use]
    pub fn start_utc(self) -> DateTime<Utc> {
        let local_midnight = self.0.and_time(chrono::NaiveTime::MIN);
        let utc = local_midnight - TimeDelta::seconds(i64::from(LOCAL_OFFSET_SECS));
        utc.and_utc()
    }

    /// `Monday, November 3, 2025`
    #[must_use]
    pub fn long_format(self) -> String {
        self.0.format("%A, %B %-d, %Y").to_string()
    }
}

impl fmt::Display for LocalDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl FromStr for LocalDay {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
            .map(Self)
            .map_err(|_| {
                TrackerError::InvalidInput(format!("Invalid day '{s}', expected YYYY-MM-DD"))
            })
    }
}

impl Serialize for LocalDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LocalDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalize a UTC instant to its local-day string (`YYYY-MM-DD`).
#[must_use]
pub fn local_day_string(instant: DateTime<Utc>) -> String {
    LocalDay::of(instant).to_string()
}

/// UTC half-open range `[start, end)` covering one local day.
#[must_use]
pub fn local_day_bounds(day: LocalDay) -> (DateTime<Utc>, DateTime<Utc>) {
    (day.start_utc(), day.succ().start_utc())
}

/// The next local midnight strictly after `now`.
#[must_use]
pub fn next_local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = LocalDay::of(now).date();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    LocalDay(tomorrow).start_utc()
}

/// Time left until the next local midnight. Never negative.
#[must_use]
pub fn until_next_midnight(now: DateTime<Utc>) -> std::time::Duration {
    (next_local_midnight(now) - now)
        .to_std()
        .unwrap_or_default()
}

/// Source of the current instant, injectable so day rollovers can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> LocalDay {
        LocalDay::of(self.now())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut guard = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
