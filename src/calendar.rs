//! Business-local calendar arithmetic.
//!
//! Every calendar-day key and pickup-slot comparison goes through
//! [`BusinessCalendar`], never through the server's local clock.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{macros::format_description, Date, Duration, Month, OffsetDateTime, Time, Weekday};

use crate::error::{AppError, AppResult};

/// Length of a pickup slot.
pub const SLOT_MINUTES: i64 = 30;

/// Longest span accepted by range reads.
pub const MAX_RANGE_DAYS: i64 = 366;

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Start of a 30-minute pickup window, written `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot {
    hour: u8,
    minute: u8,
}

impl TimeSlot {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && (minute == 0 || minute == 30)).then_some(Self { hour, minute })
    }

    pub fn as_time(&self) -> Time {
        Time::from_hms(self.hour, self.minute, 0).unwrap_or(Time::MIDNIGHT)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeSlot {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::validation(format!("Invalid time slot: {s}"));
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(h) || !two_digits(m) {
            return Err(invalid());
        }
        let hour = h.parse::<u8>().map_err(|_| invalid())?;
        let minute = m.parse::<u8>().map_err(|_| invalid())?;
        TimeSlot::new(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses, de-duplicates and sorts a list of slots.
pub fn normalize_slots<S: AsRef<str>>(raw: &[S]) -> AppResult<Vec<TimeSlot>> {
    let mut slots = raw
        .iter()
        .map(|s| s.as_ref().trim().parse::<TimeSlot>())
        .collect::<AppResult<Vec<_>>>()?;
    slots.sort();
    slots.dedup();
    Ok(slots)
}

pub fn parse_date(raw: &str) -> AppResult<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::validation(format!("Invalid date format: {raw}")))
}

pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

pub fn weekday_name(date: Date) -> &'static str {
    match date.weekday() {
        Weekday::Monday => WEEKDAY_NAMES[0],
        Weekday::Tuesday => WEEKDAY_NAMES[1],
        Weekday::Wednesday => WEEKDAY_NAMES[2],
        Weekday::Thursday => WEEKDAY_NAMES[3],
        Weekday::Friday => WEEKDAY_NAMES[4],
        Weekday::Saturday => WEEKDAY_NAMES[5],
        Weekday::Sunday => WEEKDAY_NAMES[6],
    }
}

/// Every day in `[start, end]`, rejecting reversed or oversized ranges.
pub fn days_in_range(start: Date, end: Date) -> AppResult<Vec<Date>> {
    if start > end {
        return Err(AppError::validation("start must not be after end"));
    }
    if (end - start).whole_days() >= MAX_RANGE_DAYS {
        return Err(AppError::validation(format!(
            "Range may span at most {MAX_RANGE_DAYS} days"
        )));
    }
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        match day.next_day() {
            Some(next) => day = next,
            None => break,
        }
    }
    Ok(days)
}

#[derive(Debug, Clone, Copy)]
pub struct BusinessCalendar {
    tz: Tz,
    order_window_days: i64,
}

impl BusinessCalendar {
    pub fn new(timezone: &str, order_window_days: i64) -> anyhow::Result<Self> {
        let tz = timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid business timezone {timezone}: {e}"))?;
        anyhow::ensure!(order_window_days > 0, "order window must be positive");
        Ok(Self {
            tz,
            order_window_days,
        })
    }

    /// Business-local calendar day containing `now`.
    pub fn today(&self, now: OffsetDateTime) -> Date {
        let utc = DateTime::from_timestamp(now.unix_timestamp(), now.nanosecond())
            .unwrap_or_default();
        let local = utc.with_timezone(&self.tz).date_naive();
        from_naive(local).unwrap_or_else(|| now.date())
    }

    /// Wall-clock `time` on `date` in the business zone, as an instant.
    pub fn local_instant(&self, date: Date, time: Time) -> OffsetDateTime {
        let fallback = date.with_time(time).assume_utc();
        let Some(naive) = to_naive(date).and_then(|d| {
            d.and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32)
        }) else {
            return fallback;
        };
        let ts = naive
            .and_local_timezone(self.tz)
            .latest()
            .map(|dt| dt.timestamp())
            .unwrap_or_else(|| naive.and_utc().timestamp());
        OffsetDateTime::from_unix_timestamp(ts).unwrap_or(fallback)
    }

    /// Instant at which the pickup window starting at `slot` closes.
    pub fn slot_end(&self, date: Date, slot: TimeSlot) -> OffsetDateTime {
        self.local_instant(date, slot.as_time()) + Duration::minutes(SLOT_MINUTES)
    }

    /// Whether `date` falls inside the rolling orderable window.
    pub fn is_orderable(&self, date: Date, now: OffsetDateTime) -> bool {
        let today = self.today(now);
        let horizon = today
            .checked_add(Duration::days(self.order_window_days))
            .unwrap_or(Date::MAX);
        date >= today && date < horizon
    }
}

fn to_naive(d: Date) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(d.year(), u8::from(d.month()) as u32, d.day() as u32)
}

fn from_naive(d: NaiveDate) -> Option<Date> {
    let month = Month::try_from(d.month() as u8).ok()?;
    Date::from_calendar_date(d.year(), month, d.day() as u8).ok()
}

/// `#[serde(with = "iso_date")]` for `YYYY-MM-DD` dates.
pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }
}
