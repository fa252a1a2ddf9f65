use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::LocalCalendar;
use crate::models::TimeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Day,
    #[default]
    Week,
    Month,
}

/// The requested window does not fit in the supported calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("date {0} is outside the supported calendar range")]
pub struct OutOfRange(pub NaiveDate);

/// The visible slice of the calendar: an inclusive local day list plus the
/// half-open instant range `[start, end)` covering exactly those days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewWindow {
    pub mode: ViewMode,
    /// The date the window was computed for.
    pub reference: NaiveDate,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Monday of the ISO week containing `day` (Sunday closes the week).
pub fn week_start(day: NaiveDate) -> Option<NaiveDate> {
    day.checked_sub_signed(Duration::days(i64::from(
        day.weekday().num_days_from_monday(),
    )))
}

pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

pub fn month_end(day: NaiveDate) -> NaiveDate {
    month_start(day)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Monday on/before the 1st through the Sunday on/after the last day.
pub fn month_grid(day: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first = week_start(month_start(day))?;
    let last_of_month = month_end(day);
    let to_sunday = 6 - i64::from(last_of_month.weekday().num_days_from_monday());
    Some((first, last_of_month.checked_add_signed(Duration::days(to_sunday))?))
}

impl ViewWindow {
    /// First and last visible day for `reference` in `mode`.
    pub fn compute_days(
        reference: NaiveDate,
        mode: ViewMode,
    ) -> Result<(NaiveDate, NaiveDate), OutOfRange> {
        let days = match mode {
            ViewMode::Day => Some((reference, reference)),
            ViewMode::Week => week_start(reference).and_then(|monday| {
                Some((monday, monday.checked_add_signed(Duration::days(6))?))
            }),
            ViewMode::Month => month_grid(reference),
        };
        days.ok_or(OutOfRange(reference))
    }

    pub fn compute(
        reference: NaiveDate,
        mode: ViewMode,
        calendar: &LocalCalendar,
    ) -> Result<Self, OutOfRange> {
        let (first_day, last_day) = Self::compute_days(reference, mode)?;
        let start = calendar.midnight(first_day);
        let end = last_day.succ_opt().and_then(|next| calendar.midnight(next));
        let (Some(start), Some(end)) = (start, end) else {
            return Err(OutOfRange(reference));
        };
        Ok(Self {
            mode,
            reference,
            first_day,
            last_day,
            start,
            end,
        })
    }

    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }

    /// Every local day in the window, in order.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.first_day
            .iter_days()
            .take_while(|d| *d <= self.last_day)
            .collect()
    }

    pub fn len_days(&self) -> i64 {
        (self.last_day - self.first_day).num_days() + 1
    }

    /// Month view greys out days of neighbouring months; other views have none.
    pub fn in_reference_month(&self, day: NaiveDate) -> bool {
        match self.mode {
            ViewMode::Month => {
                day.year() == self.reference.year() && day.month() == self.reference.month()
            }
            ViewMode::Day | ViewMode::Week => true,
        }
    }
}
