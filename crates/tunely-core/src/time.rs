// ── Calendar boundaries ──
//
// Energy meters report "today", "this month" and "this year". Those
// boundaries are local-time midnights converted to UTC for the API's
// `from` parameter.

use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::CoreError;

/// Period start instants, object-safe so one instance can be shared by
/// every device regardless of the configured time zone.
pub trait Calendar: Send + Sync {
    fn start_of_day(&self, now: DateTime<Utc>) -> DateTime<Utc>;
    fn start_of_month(&self, now: DateTime<Utc>) -> DateTime<Utc>;
    fn start_of_year(&self, now: DateTime<Utc>) -> DateTime<Utc>;
}

/// Calendar arithmetic in one time zone.
#[derive(Debug, Clone)]
pub struct TimeSupport<Tz: TimeZone = Local> {
    tz: Tz,
}

impl TimeSupport<Local> {
    /// The system's local time zone.
    pub fn local() -> Self {
        Self { tz: Local }
    }
}

impl TimeSupport<FixedOffset> {
    /// A fixed offset east of UTC, in minutes.
    pub fn fixed(offset_minutes: i32) -> Result<Self, CoreError> {
        let tz = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| CoreError::Config {
                message: format!("timezone offset out of range: {offset_minutes} minutes"),
            })?;
        Ok(Self { tz })
    }
}

impl<Tz: TimeZone> TimeSupport<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    fn day_start_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.midnight(self.local_date(now))
    }

    fn month_start_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = self.local_date(now);
        self.midnight(date.with_day(1).unwrap_or(date))
    }

    fn year_start_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = self.local_date(now);
        self.midnight(NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date))
    }

    /// Local midnight of `date` in UTC. Falls back to UTC midnight when
    /// local midnight does not exist (DST gap).
    fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
            LocalResult::None => self.tz.from_utc_datetime(&naive).with_timezone(&Utc),
        }
    }
}

impl<Tz> Calendar for TimeSupport<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    fn start_of_day(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.day_start_at(now)
    }

    fn start_of_month(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.month_start_at(now)
    }

    fn start_of_year(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.year_start_at(now)
    }
}
