//! Weekly trigger.

use std::sync::Arc;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc, Weekday,
};

use crate::scheduler::Scheduler;

/// A fixed weekday and wall-clock time at a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    pub weekday: Weekday,
    pub time: NaiveTime,
    pub utc_offset: FixedOffset,
}

impl Default for WeeklySchedule {
    /// Wednesday 14:44 at UTC+09:00.
    fn default() -> Self {
        Self {
            weekday: Weekday::Wed,
            time: NaiveTime::from_hms_opt(14, 44, 0).unwrap_or_default(),
            utc_offset: FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// Calendar date of `now` at `offset`.
pub fn local_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

impl WeeklySchedule {
    fn instant_on(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(self.time);
        let offset = Duration::seconds(i64::from(self.utc_offset.local_minus_utc()));
        (local - offset).and_utc()
    }

    /// The first firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = local_date(now, self.utc_offset);
        let ahead = (i64::from(self.weekday.num_days_from_monday())
            - i64::from(today.weekday().num_days_from_monday()))
        .rem_euclid(7);
        let candidate = self.instant_on(today + Duration::days(ahead));
        if candidate > now {
            candidate
        } else {
            self.instant_on(today + Duration::days(ahead + 7))
        }
    }
}

impl std::fmt::Display for WeeklySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.weekday,
            self.time.format("%H:%M"),
            self.utc_offset
        )
    }
}

pub fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.parse::<Weekday>()
        .map_err(|_| format!("unknown weekday '{s}', expected e.g. 'wed' or 'Wednesday'"))
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{s}', expected HH:MM"))
}

/// `+09:00`, `-05:30`, `Z`.
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, String> {
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }
    let invalid = || format!("invalid UTC offset '{s}', expected e.g. +09:00");
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Sleep until each firing and trigger a cycle. Never returns.
pub async fn run(schedule: WeeklySchedule, scheduler: Arc<Scheduler>) {
    loop {
        let now = Utc::now();
        let next = schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next = %next, "Next rotation cycle scheduled");
        tokio::time::sleep(wait).await;
        scheduler.trigger("timer").await;
    }
}
