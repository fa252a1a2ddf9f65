//! Persistence boundary.
//!
//! Every call takes the caller's [`TenantScope`] explicitly; backends never read
//! ambient session state. `PgStore` talks to PostgreSQL, `MemoryStore` backs the
//! tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Anamnesis, Appointment, AppointmentStatus, Exercise, NewAppointment, NewExercise,
    NewPatient, NewTenant, NewUser, Patient, PatientFilter, SessionPrincipal, Tenant,
    TenantScope, TimeRange, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates the organization and its first (admin) user together.
    async fn create_tenant_with_admin(
        &self,
        tenant: NewTenant,
        admin: NewUser,
    ) -> Result<(Tenant, User), StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError>;

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionPrincipal, StoreError>;

    /// Active (unrevoked, unexpired) session for a token hash.
    async fn find_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionPrincipal>, StoreError>;

    async fn touch_session(&self, session_token_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError>;

    /// Returns false when the session was already revoked.
    async fn revoke_session(&self, session_token_id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn list_patients(
        &self,
        scope: &TenantScope,
        filter: &PatientFilter,
    ) -> Result<Vec<Patient>, StoreError>;

    async fn get_patient(&self, scope: &TenantScope, patient_id: Uuid) -> Result<Option<Patient>, StoreError>;

    /// Case-insensitive exact match on the trimmed name. Oldest match wins.
    async fn find_patient_by_name(&self, scope: &TenantScope, name: &str) -> Result<Option<Patient>, StoreError>;

    async fn insert_patient(&self, scope: &TenantScope, patient: NewPatient) -> Result<Patient, StoreError>;

    async fn set_patient_active(
        &self,
        scope: &TenantScope,
        patient_id: Uuid,
        active: bool,
    ) -> Result<Option<Patient>, StoreError>;

    /// `(id, name)` pairs for the ids that exist in the tenant.
    async fn patient_names(&self, scope: &TenantScope, ids: &[Uuid]) -> Result<Vec<(Uuid, String)>, StoreError>;

    async fn count_active_patients(&self, scope: &TenantScope) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Whether appointments can be read joined with their patient's name.
    async fn supports_patient_join(&self) -> bool;

    /// Non-cancelled appointments with `range.start <= at < range.end`, ascending.
    async fn appointments_in_range(
        &self,
        scope: &TenantScope,
        range: TimeRange,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Same rows as [`appointments_in_range`](Self::appointments_in_range),
    /// each with the patient's name inlined when the patient row exists.
    async fn appointments_in_range_with_names(
        &self,
        scope: &TenantScope,
        range: TimeRange,
    ) -> Result<Vec<(Appointment, Option<String>)>, StoreError>;

    async fn count_appointments_in_range(&self, scope: &TenantScope, range: TimeRange) -> Result<i64, StoreError>;

    /// Every appointment of a patient regardless of status, ascending.
    async fn appointments_for_patient(
        &self,
        scope: &TenantScope,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn insert_appointment(
        &self,
        scope: &TenantScope,
        appointment: NewAppointment,
    ) -> Result<Appointment, StoreError>;

    /// Inserts a patient and an appointment referencing it as one unit.
    async fn insert_patient_with_appointment(
        &self,
        scope: &TenantScope,
        patient: NewPatient,
        appointment: NewAppointment,
    ) -> Result<(Patient, Appointment), StoreError>;

    async fn set_appointment_status(
        &self,
        scope: &TenantScope,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_anamnesis(&self, scope: &TenantScope, patient_id: Uuid) -> Result<Option<Anamnesis>, StoreError>;

    async fn upsert_anamnesis(
        &self,
        scope: &TenantScope,
        patient_id: Uuid,
        anamnesis: Anamnesis,
    ) -> Result<Anamnesis, StoreError>;

    /// Tenant exercises plus the global catalog, by name.
    async fn list_exercises(&self, scope: &TenantScope) -> Result<Vec<Exercise>, StoreError>;

    async fn insert_exercise(&self, scope: &TenantScope, exercise: NewExercise) -> Result<Exercise, StoreError>;

    async fn count_global_exercises(&self) -> Result<i64, StoreError>;

    /// Inserts into the global catalog, skipping existing `(category, name)` pairs.
    async fn insert_global_exercises(&self, exercises: &[NewExercise]) -> Result<u64, StoreError>;
}

pub trait ClinicStore: AccountStore + PatientStore + AppointmentStore + RecordStore {}

impl<T> ClinicStore for T where T: AccountStore + PatientStore + AppointmentStore + RecordStore {}
