use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};

/// Source of "now". Injected through `AppState` so tests can pin the date.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The clinic's wall clock: a fixed UTC offset plus a clock.
///
/// All "local" conversions in the agenda go through here, so a day boundary
/// means the same thing for the window builder, the bucketing and quick-create.
#[derive(Clone)]
pub struct LocalCalendar {
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl LocalCalendar {
    pub fn new(offset: FixedOffset, clock: Arc<dyn Clock>) -> Self {
        Self { offset, clock }
    }

    /// Builds the calendar from an offset in minutes; out-of-range offsets fall back to UTC.
    pub fn from_offset_minutes(minutes: i32, clock: Arc<dyn Clock>) -> Self {
        let offset = FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix());
        Self::new(offset, clock)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    pub fn local_datetime(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.offset).naive_local()
    }

    /// Converts a local wall-clock time to the instant it denotes.
    /// `None` when the instant falls outside chrono's range.
    pub fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        local
            .checked_sub_signed(shift)
            .map(|utc| DateTime::<Utc>::from_naive_utc_and_offset(utc, Utc))
    }

    pub fn midnight(&self, day: NaiveDate) -> Option<DateTime<Utc>> {
        self.to_utc(day.and_time(NaiveTime::MIN))
    }
}

impl std::fmt::Debug for LocalCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCalendar")
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}
