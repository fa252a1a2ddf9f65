use chrono::{Duration, Months, NaiveDate};
use serde::Deserialize;

use super::window::{ViewMode, month_start, week_start};
use crate::clock::LocalCalendar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Prev,
    Next,
    Today,
}

/// Prev / next / today over the agenda. The anchor is kept normalized to the
/// first day of its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgendaNavigator {
    mode: ViewMode,
    anchor: NaiveDate,
}

fn normalize(anchor: NaiveDate, mode: ViewMode) -> NaiveDate {
    match mode {
        ViewMode::Day => anchor,
        ViewMode::Week => week_start(anchor).unwrap_or(anchor),
        ViewMode::Month => month_start(anchor),
    }
}

fn shift(anchor: NaiveDate, mode: ViewMode, forward: bool) -> NaiveDate {
    let moved = match (mode, forward) {
        (ViewMode::Day, true) => anchor.checked_add_signed(Duration::days(1)),
        (ViewMode::Day, false) => anchor.checked_sub_signed(Duration::days(1)),
        (ViewMode::Week, true) => anchor.checked_add_signed(Duration::days(7)),
        (ViewMode::Week, false) => anchor.checked_sub_signed(Duration::days(7)),
        (ViewMode::Month, true) => anchor.checked_add_months(Months::new(1)),
        (ViewMode::Month, false) => anchor.checked_sub_months(Months::new(1)),
    };
    moved.unwrap_or(anchor)
}

impl AgendaNavigator {
    pub fn new(anchor: NaiveDate, mode: ViewMode) -> Self {
        Self {
            mode,
            anchor: normalize(anchor, mode),
        }
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn navigate(&mut self, step: Step, calendar: &LocalCalendar) {
        let next = match step {
            Step::Prev => shift(self.anchor, self.mode, false),
            Step::Next => shift(self.anchor, self.mode, true),
            Step::Today => calendar.today(),
        };
        self.anchor = normalize(next, self.mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agenda::window::ViewWindow;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn cal() -> LocalCalendar {
        let now = Utc.with_ymd_and_hms(2024, 6, 5, 15, 0, 0).unwrap();
        LocalCalendar::from_offset_minutes(-180, Arc::new(FixedClock(now)))
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn week_navigation_moves_by_seven_days() {
        let c = cal();
        let mut nav = AgendaNavigator::new(d(2024, 6, 5), ViewMode::Week);
        assert_eq!(nav.anchor(), d(2024, 6, 3));
        nav.navigate(Step::Next, &c);
        assert_eq!(nav.anchor(), d(2024, 6, 10));
        nav.navigate(Step::Prev, &c);
        nav.navigate(Step::Prev, &c);
        assert_eq!(nav.anchor(), d(2024, 5, 27));
    }

    #[test]
    fn month_navigation_never_skips_a_month() {
        let c = cal();
        let mut nav = AgendaNavigator::new(d(2024, 1, 31), ViewMode::Month);
        let mut seen = Vec::new();
        for _ in 0..12 {
            nav.navigate(Step::Next, &c);
            seen.push(nav.anchor());
        }
        let expected: Vec<NaiveDate> = (2..=12)
            .map(|m| d(2024, m, 1))
            .chain(std::iter::once(d(2025, 1, 1)))
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn today_resets_to_local_date() {
        let c = cal();
        let mut nav = AgendaNavigator::new(d(2023, 1, 1), ViewMode::Day);
        nav.navigate(Step::Today, &c);
        assert_eq!(nav.anchor(), d(2024, 6, 5));
        let window = ViewWindow::compute(nav.anchor(), nav.mode(), &c).unwrap();
        assert_eq!(window.days(), vec![d(2024, 6, 5)]);
    }

    #[test]
    fn month_anchor_is_normalized_to_the_first() {
        let nav = AgendaNavigator::new(d(2024, 6, 5), ViewMode::Month);
        assert_eq!(nav.anchor(), d(2024, 6, 1));
        assert_eq!(nav.mode(), ViewMode::Month);
    }

    #[test]
    fn stepping_past_the_calendar_edge_stays_put() {
        let c = cal();
        let mut nav = AgendaNavigator::new(NaiveDate::MAX, ViewMode::Day);
        nav.navigate(Step::Next, &c);
        assert_eq!(nav.anchor(), NaiveDate::MAX);
    }
}
