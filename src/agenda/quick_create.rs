//! Resolve-or-create a patient by name, then book the slot.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::LocalCalendar;
use crate::error::StoreError;
use crate::models::{Appointment, AppointmentStatus, NewAppointment, NewPatient, Patient, TenantScope};
use crate::store::{AppointmentStore, PatientStore};

pub const DEFAULT_KIND: &str = "Sessão";

const PLACEHOLDER_TAX_ID_LEN: usize = 11;

#[derive(Debug, Clone, Deserialize)]
pub struct QuickCreate {
    pub date: NaiveDate,
    /// Slot hour from the day grid.
    #[serde(default)]
    pub hour: Option<u32>,
    /// Explicit local time, used instead of `hour`.
    #[serde(default)]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickCreated {
    pub appointment: Appointment,
    pub patient: Option<Patient>,
    pub patient_created: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum QuickCreateError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl QuickCreate {
    /// Local wall-clock start of the requested slot.
    pub fn local_start(&self) -> Result<chrono::NaiveDateTime, QuickCreateError> {
        let time = match (self.hour, self.time) {
            (Some(_), Some(_)) => {
                return Err(QuickCreateError::Invalid(
                    "send either hour or time, not both".into(),
                ));
            }
            (None, None) => return Err(QuickCreateError::Invalid("hour or time is required".into())),
            (Some(h), None) => NaiveTime::from_hms_opt(h, 0, 0)
                .ok_or_else(|| QuickCreateError::Invalid(format!("hour must be 0..=23, got {h}")))?,
            (None, Some(t)) => t,
        };
        Ok(self.date.and_time(time))
    }

    fn kind(&self) -> String {
        non_blank(self.kind.as_deref()).unwrap_or_else(|| DEFAULT_KIND.to_string())
    }
}

/// Eleven characters of a random UUID, stored until the real CPF is filled in.
pub fn placeholder_tax_id() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(PLACEHOLDER_TAX_ID_LEN)
        .collect()
}

pub async fn quick_create<S>(
    store: &S,
    scope: &TenantScope,
    calendar: &LocalCalendar,
    req: QuickCreate,
) -> Result<QuickCreated, QuickCreateError>
where
    S: AppointmentStore + PatientStore + ?Sized,
{
    let local = req.local_start()?;
    let at = calendar
        .to_utc(local)
        .ok_or_else(|| {
            QuickCreateError::Invalid(format!("{local} is outside the supported range"))
        })?;
    let appointment = NewAppointment {
        at,
        patient_id: None,
        kind: Some(req.kind()),
        status: AppointmentStatus::Scheduled,
        pain: 0,
        notes: non_blank(req.notes.as_deref()),
        evolution: None,
    };

    let Some(name) = non_blank(req.patient_name.as_deref()) else {
        let appointment = store.insert_appointment(scope, appointment).await?;
        tracing::info!(appointment_id = %appointment.id, "booked unassigned slot");
        return Ok(QuickCreated {
            appointment,
            patient: None,
            patient_created: false,
        });
    };

    if let Some(patient) = store.find_patient_by_name(scope, &name).await? {
        let appointment = store
            .insert_appointment(
                scope,
                NewAppointment {
                    patient_id: Some(patient.id),
                    ..appointment
                },
            )
            .await?;
        tracing::info!(appointment_id = %appointment.id, patient_id = %patient.id, "booked existing patient");
        return Ok(QuickCreated {
            appointment,
            patient: Some(patient),
            patient_created: false,
        });
    }

    let new_patient = NewPatient {
        name,
        tax_id: placeholder_tax_id(),
        ..Default::default()
    };
    let (patient, appointment) = store
        .insert_patient_with_appointment(scope, new_patient, appointment)
        .await?;
    tracing::info!(appointment_id = %appointment.id, patient_id = %patient.id, "booked new patient");

    Ok(QuickCreated {
        appointment,
        patient: Some(patient),
        patient_created: true,
    })
}
