//! Attaches patient display names to appointments.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Appointment, AppointmentStatus, TenantScope, TimeRange};
use crate::store::{AppointmentStore, PatientStore};

/// Shown when an appointment points at a patient whose name could not be found.
pub const UNKNOWN_PATIENT: &str = "Paciente";
/// Shown for slots booked without a patient.
pub const UNASSIGNED_PATIENT: &str = "Sem paciente";

/// An appointment as the agenda shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgendaEntry {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub patient_id: Option<Uuid>,
    pub patient_name: String,
    pub kind: Option<String>,
    pub status: AppointmentStatus,
    pub pain: Option<i16>,
}

impl AgendaEntry {
    pub fn new(appointment: Appointment, name: Option<String>) -> Self {
        let patient_name = match (appointment.patient_id, name) {
            (None, _) => UNASSIGNED_PATIENT.to_string(),
            (Some(_), Some(n)) if !n.trim().is_empty() => n,
            (Some(_), _) => UNKNOWN_PATIENT.to_string(),
        };
        Self {
            id: appointment.id,
            at: appointment.at,
            patient_id: appointment.patient_id,
            patient_name,
            kind: appointment.kind,
            status: appointment.status,
            pain: appointment.pain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    /// One read with the name inlined by the store.
    Joined,
    /// Appointments first, then one batched name lookup.
    Batched,
}

#[derive(Debug, Clone)]
pub struct NameResolver {
    strategy: JoinStrategy,
}

impl NameResolver {
    pub fn new(strategy: JoinStrategy) -> Self {
        Self { strategy }
    }

    /// Probes the store once; the answer holds for the life of the process.
    pub async fn detect<S>(store: &S) -> Self
    where
        S: AppointmentStore + ?Sized,
    {
        let strategy = if store.supports_patient_join().await {
            JoinStrategy::Joined
        } else {
            JoinStrategy::Batched
        };
        tracing::info!(?strategy, "patient name resolution strategy");
        Self::new(strategy)
    }

    pub fn strategy(&self) -> JoinStrategy {
        self.strategy
    }

    pub async fn fetch<S>(
        &self,
        store: &S,
        scope: &TenantScope,
        range: TimeRange,
    ) -> Result<Vec<AgendaEntry>, StoreError>
    where
        S: AppointmentStore + PatientStore + ?Sized,
    {
        match self.strategy {
            JoinStrategy::Batched => fetch_batched(store, scope, range).await,
            JoinStrategy::Joined => match store.appointments_in_range_with_names(scope, range).await {
                Ok(rows) => Ok(rows
                    .into_iter()
                    .map(|(a, name)| AgendaEntry::new(a, name))
                    .collect()),
                Err(StoreError::Relationship(msg)) => {
                    tracing::warn!(error = %msg, "joined appointment read failed, using batched lookup");
                    fetch_batched(store, scope, range).await
                }
                Err(e) => Err(e),
            },
        }
    }
}

async fn fetch_batched<S>(
    store: &S,
    scope: &TenantScope,
    range: TimeRange,
) -> Result<Vec<AgendaEntry>, StoreError>
where
    S: AppointmentStore + PatientStore + ?Sized,
{
    let appointments = store.appointments_in_range(scope, range).await?;

    let ids: Vec<Uuid> = appointments
        .iter()
        .filter_map(|a| a.patient_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let names: HashMap<Uuid, String> = if ids.is_empty() {
        HashMap::new()
    } else {
        store.patient_names(scope, &ids).await?.into_iter().collect()
    };

    Ok(appointments
        .into_iter()
        .map(|a| {
            let name = a.patient_id.and_then(|id| names.get(&id).cloned());
            AgendaEntry::new(a, name)
        })
        .collect())
}
