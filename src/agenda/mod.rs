//! The scheduling view: window computation, name resolution, day bucketing
//! and quick-create, tied together by [`Agenda`].

pub mod buckets;
pub mod names;
pub mod navigator;
pub mod quick_create;
pub mod window;

use chrono::NaiveDate;
use serde::Serialize;

use crate::clock::LocalCalendar;
use crate::models::{AppState, TenantScope, WorkHours};
use crate::store::ClinicStore;

use buckets::{DayBucket, HourSlot, bucket_by_day, hour_slots};
use names::{JoinStrategy, NameResolver};
use quick_create::{QuickCreate, QuickCreateError, QuickCreated};
use window::{OutOfRange, ViewMode, ViewWindow};

#[derive(Debug, Clone, Serialize)]
pub struct AgendaView {
    pub window: ViewWindow,
    pub days: Vec<DayBucket>,
    /// Hourly slots, day view only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<HourSlot>>,
    pub strategy: JoinStrategy,
    /// Store failure message; `days` is empty when set.
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

impl AgendaView {
    pub fn total_items(&self) -> usize {
        self.days.iter().map(|d| d.items.len()).sum()
    }
}

pub struct Agenda<'a> {
    store: &'a dyn ClinicStore,
    names: &'a NameResolver,
    calendar: &'a LocalCalendar,
    work_hours: WorkHours,
}

impl<'a> Agenda<'a> {
    pub fn new(
        store: &'a dyn ClinicStore,
        names: &'a NameResolver,
        calendar: &'a LocalCalendar,
        work_hours: WorkHours,
    ) -> Self {
        Self {
            store,
            names,
            calendar,
            work_hours,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(state.store.as_ref(), &state.names, &state.calendar, state.work_hours)
    }

    /// Loads one window. Store failures are reported in the view, not raised.
    pub async fn load(
        &self,
        scope: &TenantScope,
        reference: NaiveDate,
        mode: ViewMode,
    ) -> Result<AgendaView, OutOfRange> {
        let window = ViewWindow::compute(reference, mode, self.calendar)?;

        let (days, error) = match self.names.fetch(self.store, scope, window.range()).await {
            Ok(entries) => (bucket_by_day(&window, entries, self.calendar), None),
            Err(e) => {
                tracing::warn!(error = %e, %reference, ?mode, "agenda load failed");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let slots = match (mode, days.first()) {
            (ViewMode::Day, Some(bucket)) => Some(hour_slots(bucket, self.work_hours, self.calendar)),
            _ => None,
        };

        tracing::debug!(
            tenant_id = %scope.tenant_id,
            first_day = %window.first_day,
            last_day = %window.last_day,
            "agenda loaded"
        );

        Ok(AgendaView {
            window,
            days,
            slots,
            strategy: self.names.strategy(),
            error,
            generation: None,
        })
    }

    pub async fn quick_create(
        &self,
        scope: &TenantScope,
        req: QuickCreate,
    ) -> Result<QuickCreated, QuickCreateError> {
        quick_create::quick_create(self.store, scope, self.calendar, req).await
    }
}
