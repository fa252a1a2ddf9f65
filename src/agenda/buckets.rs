use std::collections::HashMap;

use chrono::{NaiveDate, Timelike};
use serde::Serialize;

use super::names::AgendaEntry;
use super::window::ViewWindow;
use crate::clock::LocalCalendar;
use crate::models::WorkHours;

#[derive(Debug, Clone, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub is_today: bool,
    pub in_month: bool,
    pub items: Vec<AgendaEntry>,
}

/// One bucket per window day, in order, each holding the entries whose local
/// date is that day. Entries keep their incoming order.
pub fn bucket_by_day(
    window: &ViewWindow,
    entries: Vec<AgendaEntry>,
    calendar: &LocalCalendar,
) -> Vec<DayBucket> {
    let today = calendar.today();
    let mut buckets: Vec<DayBucket> = window
        .days()
        .into_iter()
        .map(|date| DayBucket {
            date,
            is_today: date == today,
            in_month: window.in_reference_month(date),
            items: Vec::new(),
        })
        .collect();

    let index: HashMap<NaiveDate, usize> = buckets
        .iter()
        .enumerate()
        .map(|(i, b)| (b.date, i))
        .collect();

    for entry in entries {
        let local = calendar.local_date(entry.at);
        match index.get(&local) {
            Some(&i) => buckets[i].items.push(entry),
            None => tracing::debug!(appointment_id = %entry.id, %local, "appointment outside view window"),
        }
    }

    buckets
}

#[derive(Debug, Clone, Serialize)]
pub struct HourSlot {
    pub hour: u32,
    pub label: String,
    pub appointment: Option<AgendaEntry>,
}

/// Hourly slots over the working hours of a single day.
pub fn hour_slots(bucket: &DayBucket, hours: WorkHours, calendar: &LocalCalendar) -> Vec<HourSlot> {
    let mut by_hour: HashMap<u32, &AgendaEntry> = HashMap::new();
    for entry in &bucket.items {
        // later entries overwrite earlier ones in the same hour
        by_hour.insert(calendar.local_datetime(entry.at).hour(), entry);
    }

    (hours.start..=hours.end)
        .map(|hour| HourSlot {
            hour,
            label: format!("{hour:02}:00"),
            appointment: by_hour.get(&hour).map(|e| (*e).clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agenda::window::ViewMode;
    use crate::clock::FixedClock;
    use crate::models::AppointmentStatus;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use uuid::Uuid;

    fn cal() -> LocalCalendar {
        // 2024-06-05 12:00 local
        let now = Utc.with_ymd_and_hms(2024, 6, 5, 15, 0, 0).unwrap();
        LocalCalendar::from_offset_minutes(-180, Arc::new(FixedClock(now)))
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(c: &LocalCalendar, day: NaiveDate, h: u32, min: u32, name: &str) -> AgendaEntry {
        AgendaEntry {
            id: Uuid::new_v4(),
            at: c.to_utc(day.and_hms_opt(h, min, 0).unwrap()).unwrap(),
            patient_id: Some(Uuid::new_v4()),
            patient_name: name.to_string(),
            kind: None,
            status: AppointmentStatus::Scheduled,
            pain: Some(0),
        }
    }

    #[test]
    fn wednesday_afternoon_lands_in_wednesday() {
        let c = cal();
        let w = ViewWindow::compute(d(2024, 6, 5), ViewMode::Week, &c).unwrap();
        let e = entry(&c, d(2024, 6, 5), 14, 30, "Ana");
        let buckets = bucket_by_day(&w, vec![e.clone()], &c);

        assert_eq!(buckets.len(), 7);
        let wed = &buckets[2];
        assert_eq!(wed.date, d(2024, 6, 5));
        assert!(wed.is_today);
        assert_eq!(wed.items, vec![e]);
        assert_eq!(buckets.iter().map(|b| b.items.len()).sum::<usize>(), 1);
    }

    #[test]
    fn late_evening_local_stays_on_local_day() {
        // 23:30 local is already the next day in UTC.
        let c = cal();
        let w = ViewWindow::compute(d(2024, 6, 5), ViewMode::Week, &c).unwrap();
        let e = entry(&c, d(2024, 6, 4), 23, 30, "Bia");
        let buckets = bucket_by_day(&w, vec![e], &c);
        assert_eq!(buckets[1].items.len(), 1);
        assert!(buckets[2].items.is_empty());
    }

    #[test]
    fn union_of_buckets_is_in_window_entries() {
        let c = cal();
        let w = ViewWindow::compute(d(2024, 6, 12), ViewMode::Month, &c).unwrap();
        let inside: Vec<AgendaEntry> = w
            .days()
            .into_iter()
            .step_by(3)
            .map(|day| entry(&c, day, 10, 0, "X"))
            .collect();
        let outside = entry(&c, d(2024, 8, 1), 10, 0, "Y");

        let mut all = inside.clone();
        all.push(outside);
        let buckets = bucket_by_day(&w, all, &c);

        let got: Vec<AgendaEntry> = buckets.into_iter().flat_map(|b| b.items).collect();
        assert_eq!(got, inside);
    }

    #[test]
    fn month_buckets_flag_neighbouring_days() {
        let c = cal();
        let w = ViewWindow::compute(d(2024, 6, 1), ViewMode::Month, &c).unwrap();
        let buckets = bucket_by_day(&w, Vec::new(), &c);
        assert!(!buckets[0].in_month); // 2024-05-27
        assert!(buckets.iter().any(|b| b.date == d(2024, 6, 30) && b.in_month));
    }

    #[test]
    fn hour_slots_cover_work_hours_and_last_wins() {
        let c = cal();
        let day = d(2024, 6, 5);
        let w = ViewWindow::compute(day, ViewMode::Day, &c).unwrap();
        let first = entry(&c, day, 9, 0, "Primeiro");
        let second = entry(&c, day, 9, 30, "Segundo");
        let buckets = bucket_by_day(&w, vec![first, second.clone()], &c);

        let slots = hour_slots(&buckets[0], WorkHours::default(), &c);
        assert_eq!(slots.len(), 11);
        assert_eq!(slots[0].label, "08:00");
        assert_eq!(slots[10].label, "18:00");
        assert_eq!(slots[1].appointment.as_ref(), Some(&second));
        assert!(slots[2].appointment.is_none());
    }
}
