use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agenda::names::NameResolver;
use crate::clock::LocalCalendar;
use crate::store::ClinicStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ClinicStore>,
    pub calendar: LocalCalendar,
    pub names: NameResolver,
    pub session_ttl_hours: i64,
    pub work_hours: WorkHours,
}

/// Inclusive range of hours shown as slots in the day agenda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkHours {
    pub start: u32,
    pub end: u32,
}

impl Default for WorkHours {
    fn default() -> Self {
        Self { start: 8, end: 18 }
    }
}

/// Tenant every store call is scoped to. Built by the auth extractor, never global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    pub tenant_id: Uuid,
}

/// Half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/* -------------------------
   Accounts
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "fisioterapeuta")]
    Physiotherapist,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Physiotherapist => "fisioterapeuta",
        }
    }

    /// Unknown values are treated as the least privileged role.
    pub fn parse(s: &str) -> Role {
        match s.trim() {
            "admin" => Role::Admin,
            _ => Role::Physiotherapist,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub cnpj: Option<String>,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub cnpj: Option<String>,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionPrincipal {
    pub session_token_id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
        }
    }
}

/* -------------------------
   Patients
--------------------------*/

#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub tax_id: String,
    pub active: bool,
    pub diagnosis: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub name: String,
    pub tax_id: String,
    pub diagnosis: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PatientFilter {
    pub search: Option<String>,
    pub only_active: bool,
}

/// Case-insensitive key used when matching a typed name against patients.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/* -------------------------
   Appointments
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    #[serde(rename = "agendado")]
    Scheduled,
    #[serde(rename = "concluido")]
    Completed,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "agendado",
            AppointmentStatus::Completed => "concluido",
            AppointmentStatus::Cancelled => "cancelado",
        }
    }

    /// Stored status, with an absent or unknown value read as scheduled.
    pub fn from_db(s: Option<&str>) -> AppointmentStatus {
        match s.map(str::trim) {
            Some("concluido") => AppointmentStatus::Completed,
            Some("cancelado") => AppointmentStatus::Cancelled,
            _ => AppointmentStatus::Scheduled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub patient_id: Option<Uuid>,
    pub kind: Option<String>,
    pub status: AppointmentStatus,
    pub pain: Option<i16>,
    pub notes: Option<String>,
    pub evolution: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub at: DateTime<Utc>,
    pub patient_id: Option<Uuid>,
    pub kind: Option<String>,
    pub status: AppointmentStatus,
    pub pain: i16,
    pub notes: Option<String>,
    pub evolution: Option<String>,
}

pub const PAIN_MIN: i16 = 0;
pub const PAIN_MAX: i16 = 10;

/* -------------------------
   Clinical records
--------------------------*/

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Anamnesis {
    pub chief_complaint: Option<String>,
    pub clinical_history: Option<String>,
    pub family_history: Option<String>,
    pub limitations: Option<String>,
    pub medications: Option<String>,
    pub treatment_goals: Option<String>,
}

impl Anamnesis {
    /// Blank answers are stored as null.
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            chief_complaint: clean(self.chief_complaint),
            clinical_history: clean(self.clinical_history),
            family_history: clean(self.family_history),
            limitations: clean(self.limitations),
            medications: clean(self.medications),
            treatment_goals: clean(self.treatment_goals),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Exercise {
    pub id: Uuid,
    /// `None` for the global catalog shared by every tenant.
    pub tenant_id: Option<Uuid>,
    pub category: Option<String>,
    pub name: String,
    pub level: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewExercise {
    pub category: Option<String>,
    pub name: String,
    pub level: Option<String>,
    pub description: Option<String>,
}
