use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{AccountStore, AppointmentStore, PatientStore, RecordStore};
use crate::error::StoreError;
use crate::models::{
    normalize_name, Anamnesis, Appointment, AppointmentStatus, Exercise, NewAppointment,
    NewExercise, NewPatient, NewTenant, NewUser, Patient, PatientFilter, SessionPrincipal,
    Tenant, TenantScope, TimeRange, User,
};

struct SessionRecord {
    principal: SessionPrincipal,
    token_hash: String,
    revoked_at: Option<DateTime<Utc>>,
    last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Tables {
    tenants: Vec<Tenant>,
    users: Vec<User>,
    sessions: Vec<SessionRecord>,
    patients: Vec<(Uuid, Patient)>,
    appointments: Vec<(Uuid, Appointment)>,
    anamneses: HashMap<(Uuid, Uuid), Anamnesis>,
    exercises: Vec<Exercise>,
}

/// In-process store with the same observable semantics as [`super::PgStore`].
///
/// Failure switches let tests drive the error and fallback paths.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    join_available: bool,
    fail_appointment_reads: AtomicBool,
    fail_appointment_writes: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            join_available: true,
            fail_appointment_reads: AtomicBool::new(false),
            fail_appointment_writes: AtomicBool::new(false),
        }
    }

    /// Behaves like a deployment where appointments cannot be joined to patients.
    pub fn without_patient_join(mut self) -> Self {
        self.join_available = false;
        self
    }

    pub fn fail_appointment_reads(&self, fail: bool) {
        self.fail_appointment_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_appointment_writes(&self, fail: bool) {
        self.fail_appointment_writes.store(fail, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_appointment_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("appointments are unavailable".into()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_appointment_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("appointment insert rejected".into()));
        }
        Ok(())
    }
}

fn build_patient(p: NewPatient, now: DateTime<Utc>) -> Patient {
    Patient {
        id: Uuid::new_v4(),
        name: p.name,
        tax_id: p.tax_id,
        active: true,
        diagnosis: p.diagnosis,
        birth_date: p.birth_date,
        phone: p.phone,
        email: p.email,
        notes: None,
        created_at: now,
    }
}

fn build_appointment(a: NewAppointment) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        at: a.at,
        patient_id: a.patient_id,
        kind: a.kind,
        status: a.status,
        pain: Some(a.pain),
        notes: a.notes,
        evolution: a.evolution,
    }
}

/// Keeps appointments in `at` order; equal instants keep insertion order.
fn insert_sorted(rows: &mut Vec<(Uuid, Appointment)>, tenant_id: Uuid, appt: Appointment) {
    let idx = rows.partition_point(|(_, a)| a.at <= appt.at);
    rows.insert(idx, (tenant_id, appt));
}

fn in_window(tables: &Tables, scope: &TenantScope, range: TimeRange) -> Vec<Appointment> {
    tables
        .appointments
        .iter()
        .filter(|(t, a)| {
            *t == scope.tenant_id
                && range.contains(a.at)
                && a.status != AppointmentStatus::Cancelled
        })
        .map(|(_, a)| a.clone())
        .collect()
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_tenant_with_admin(
        &self,
        tenant: NewTenant,
        admin: NewUser,
    ) -> Result<(Tenant, User), StoreError> {
        let mut t = self.tables()?;
        let email_key = admin.email.trim().to_lowercase();
        if t.users.iter().any(|u| u.email.to_lowercase() == email_key) {
            return Err(StoreError::Conflict(format!("usuarios.email {email_key}")));
        }
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: tenant.name,
            cnpj: tenant.cnpj,
            cpf: tenant.cpf,
            phone: tenant.phone,
            email: tenant.email,
            created_at: Utc::now(),
        };
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            name: admin.name,
            email: admin.email,
            role: admin.role,
            password_hash: admin.password_hash,
        };
        t.tenants.push(tenant.clone());
        t.users.push(user.clone());
        Ok((tenant, user))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let key = email.trim().to_lowercase();
        let t = self.tables()?;
        Ok(t.users.iter().find(|u| u.email.to_lowercase() == key).cloned())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let t = self.tables()?;
        Ok(t.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError> {
        let t = self.tables()?;
        Ok(t.tenants.iter().find(|x| x.id == tenant_id).cloned())
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::NotFound("user"))?;
        user.password_hash = Some(password_hash.to_string());
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionPrincipal, StoreError> {
        let mut t = self.tables()?;
        if !t.users.iter().any(|u| u.id == user_id) {
            return Err(StoreError::NotFound("user"));
        }
        let principal = SessionPrincipal {
            session_token_id: Uuid::new_v4(),
            user_id,
            expires_at,
        };
        t.sessions.push(SessionRecord {
            principal,
            token_hash: token_hash.to_string(),
            revoked_at: None,
            last_seen_at: None,
        });
        Ok(principal)
    }

    async fn find_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionPrincipal>, StoreError> {
        let t = self.tables()?;
        Ok(t.sessions
            .iter()
            .find(|s| {
                s.token_hash == token_hash && s.revoked_at.is_none() && s.principal.expires_at > now
            })
            .map(|s| s.principal))
    }

    async fn touch_session(&self, session_token_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if let Some(s) = t
            .sessions
            .iter_mut()
            .find(|s| s.principal.session_token_id == session_token_id)
        {
            s.last_seen_at = Some(now);
        }
        Ok(())
    }

    async fn revoke_session(&self, session_token_id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut t = self.tables()?;
        match t
            .sessions
            .iter_mut()
            .find(|s| s.principal.session_token_id == session_token_id && s.revoked_at.is_none())
        {
            Some(s) => {
                s.revoked_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn list_patients(
        &self,
        scope: &TenantScope,
        filter: &PatientFilter,
    ) -> Result<Vec<Patient>, StoreError> {
        let needle = filter
            .search
            .as_deref()
            .map(normalize_name)
            .unwrap_or_default();
        let t = self.tables()?;
        let mut rows: Vec<Patient> = t
            .patients
            .iter()
            .filter(|(tenant, p)| {
                *tenant == scope.tenant_id
                    && (!filter.only_active || p.active)
                    && p.name.to_lowercase().contains(&needle)
            })
            .map(|(_, p)| p.clone())
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_patient(&self, scope: &TenantScope, patient_id: Uuid) -> Result<Option<Patient>, StoreError> {
        let t = self.tables()?;
        Ok(t.patients
            .iter()
            .find(|(tenant, p)| *tenant == scope.tenant_id && p.id == patient_id)
            .map(|(_, p)| p.clone()))
    }

    async fn find_patient_by_name(&self, scope: &TenantScope, name: &str) -> Result<Option<Patient>, StoreError> {
        let key = normalize_name(name);
        let t = self.tables()?;
        Ok(t.patients
            .iter()
            .filter(|(tenant, p)| *tenant == scope.tenant_id && normalize_name(&p.name) == key)
            .min_by_key(|(_, p)| p.created_at)
            .map(|(_, p)| p.clone()))
    }

    async fn insert_patient(&self, scope: &TenantScope, patient: NewPatient) -> Result<Patient, StoreError> {
        let mut t = self.tables()?;
        let row = build_patient(patient, Utc::now());
        t.patients.push((scope.tenant_id, row.clone()));
        Ok(row)
    }

    async fn set_patient_active(
        &self,
        scope: &TenantScope,
        patient_id: Uuid,
        active: bool,
    ) -> Result<Option<Patient>, StoreError> {
        let mut t = self.tables()?;
        Ok(t.patients
            .iter_mut()
            .find(|(tenant, p)| *tenant == scope.tenant_id && p.id == patient_id)
            .map(|(_, p)| {
                p.active = active;
                p.clone()
            }))
    }

    async fn patient_names(&self, scope: &TenantScope, ids: &[Uuid]) -> Result<Vec<(Uuid, String)>, StoreError> {
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let t = self.tables()?;
        Ok(t.patients
            .iter()
            .filter(|(tenant, p)| *tenant == scope.tenant_id && wanted.contains(&p.id))
            .map(|(_, p)| (p.id, p.name.clone()))
            .collect())
    }

    async fn count_active_patients(&self, scope: &TenantScope) -> Result<i64, StoreError> {
        let t = self.tables()?;
        Ok(t.patients
            .iter()
            .filter(|(tenant, p)| *tenant == scope.tenant_id && p.active)
            .count() as i64)
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn supports_patient_join(&self) -> bool {
        self.join_available
    }

    async fn appointments_in_range(
        &self,
        scope: &TenantScope,
        range: TimeRange,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.check_reads()?;
        let t = self.tables()?;
        Ok(in_window(&t, scope, range))
    }

    async fn appointments_in_range_with_names(
        &self,
        scope: &TenantScope,
        range: TimeRange,
    ) -> Result<Vec<(Appointment, Option<String>)>, StoreError> {
        self.check_reads()?;
        if !self.join_available {
            return Err(StoreError::Relationship(
                "could not find a relationship between 'sessoes' and 'pacientes'".into(),
            ));
        }
        let t = self.tables()?;
        let names: HashMap<Uuid, &str> = t
            .patients
            .iter()
            .filter(|(tenant, _)| *tenant == scope.tenant_id)
            .map(|(_, p)| (p.id, p.name.as_str()))
            .collect();
        Ok(in_window(&t, scope, range)
            .into_iter()
            .map(|a| {
                let name = a
                    .patient_id
                    .and_then(|id| names.get(&id))
                    .map(|n| n.to_string());
                (a, name)
            })
            .collect())
    }

    async fn count_appointments_in_range(&self, scope: &TenantScope, range: TimeRange) -> Result<i64, StoreError> {
        self.check_reads()?;
        let t = self.tables()?;
        Ok(in_window(&t, scope, range).len() as i64)
    }

    async fn appointments_for_patient(
        &self,
        scope: &TenantScope,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.check_reads()?;
        let t = self.tables()?;
        Ok(t.appointments
            .iter()
            .filter(|(tenant, a)| *tenant == scope.tenant_id && a.patient_id == Some(patient_id))
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn insert_appointment(
        &self,
        scope: &TenantScope,
        appointment: NewAppointment,
    ) -> Result<Appointment, StoreError> {
        self.check_writes()?;
        let mut t = self.tables()?;
        if let Some(pid) = appointment.patient_id {
            if !t
                .patients
                .iter()
                .any(|(tenant, p)| *tenant == scope.tenant_id && p.id == pid)
            {
                return Err(StoreError::Database(format!(
                    "insert on sessoes violates foreign key: paciente {pid} does not exist"
                )));
            }
        }
        let row = build_appointment(appointment);
        insert_sorted(&mut t.appointments, scope.tenant_id, row.clone());
        Ok(row)
    }

    async fn insert_patient_with_appointment(
        &self,
        scope: &TenantScope,
        patient: NewPatient,
        appointment: NewAppointment,
    ) -> Result<(Patient, Appointment), StoreError> {
        // Checked before touching the tables so a rejected insert leaves no patient behind.
        self.check_writes()?;
        let mut t = self.tables()?;
        let patient = build_patient(patient, Utc::now());
        let appt = build_appointment(NewAppointment {
            patient_id: Some(patient.id),
            ..appointment
        });
        t.patients.push((scope.tenant_id, patient.clone()));
        insert_sorted(&mut t.appointments, scope.tenant_id, appt.clone());
        Ok((patient, appt))
    }

    async fn set_appointment_status(
        &self,
        scope: &TenantScope,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        self.check_writes()?;
        let mut t = self.tables()?;
        Ok(t.appointments
            .iter_mut()
            .find(|(tenant, a)| *tenant == scope.tenant_id && a.id == appointment_id)
            .map(|(_, a)| {
                a.status = status;
                a.clone()
            }))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_anamnesis(&self, scope: &TenantScope, patient_id: Uuid) -> Result<Option<Anamnesis>, StoreError> {
        let t = self.tables()?;
        Ok(t.anamneses.get(&(scope.tenant_id, patient_id)).cloned())
    }

    async fn upsert_anamnesis(
        &self,
        scope: &TenantScope,
        patient_id: Uuid,
        anamnesis: Anamnesis,
    ) -> Result<Anamnesis, StoreError> {
        let mut t = self.tables()?;
        if !t
            .patients
            .iter()
            .any(|(tenant, p)| *tenant == scope.tenant_id && p.id == patient_id)
        {
            return Err(StoreError::NotFound("patient"));
        }
        t.anamneses.insert((scope.tenant_id, patient_id), anamnesis.clone());
        Ok(anamnesis)
    }

    async fn list_exercises(&self, scope: &TenantScope) -> Result<Vec<Exercise>, StoreError> {
        let t = self.tables()?;
        let mut rows: Vec<Exercise> = t
            .exercises
            .iter()
            .filter(|e| e.tenant_id.is_none() || e.tenant_id == Some(scope.tenant_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn insert_exercise(&self, scope: &TenantScope, exercise: NewExercise) -> Result<Exercise, StoreError> {
        let mut t = self.tables()?;
        let row = Exercise {
            id: Uuid::new_v4(),
            tenant_id: Some(scope.tenant_id),
            category: exercise.category,
            name: exercise.name,
            level: exercise.level,
            description: exercise.description,
        };
        t.exercises.push(row.clone());
        Ok(row)
    }

    async fn count_global_exercises(&self) -> Result<i64, StoreError> {
        let t = self.tables()?;
        Ok(t.exercises.iter().filter(|e| e.tenant_id.is_none()).count() as i64)
    }

    async fn insert_global_exercises(&self, exercises: &[NewExercise]) -> Result<u64, StoreError> {
        let mut t = self.tables()?;
        let mut inserted = 0;
        for e in exercises {
            let exists = t.exercises.iter().any(|x| {
                x.tenant_id.is_none() && x.category == e.category && x.name == e.name
            });
            if exists {
                continue;
            }
            t.exercises.push(Exercise {
                id: Uuid::new_v4(),
                tenant_id: None,
                category: e.category.clone(),
                name: e.name.clone(),
                level: e.level.clone(),
                description: e.description.clone(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn scope() -> TenantScope {
        TenantScope {
            tenant_id: Uuid::new_v4(),
        }
    }

    fn appt_at(at: DateTime<Utc>, status: AppointmentStatus) -> NewAppointment {
        NewAppointment {
            at,
            patient_id: None,
            kind: Some("Sessão".into()),
            status,
            pain: 0,
            notes: None,
            evolution: None,
        }
    }

    #[tokio::test]
    async fn range_reads_are_half_open_and_skip_cancelled() {
        let store = MemoryStore::new();
        let s = scope();
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 3, 0, 0).unwrap();
        let end = start + Duration::days(7);

        store.insert_appointment(&s, appt_at(start, AppointmentStatus::Scheduled)).await.unwrap();
        store.insert_appointment(&s, appt_at(end, AppointmentStatus::Scheduled)).await.unwrap();
        store
            .insert_appointment(&s, appt_at(start + Duration::hours(5), AppointmentStatus::Cancelled))
            .await
            .unwrap();

        let rows = store
            .appointments_in_range(&s, TimeRange { start, end })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].at, start);
    }

    #[tokio::test]
    async fn appointments_come_back_in_time_order() {
        let store = MemoryStore::new();
        let s = scope();
        let base = Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap();
        for h in [5, 1, 3] {
            store
                .insert_appointment(&s, appt_at(base + Duration::hours(h), AppointmentStatus::Scheduled))
                .await
                .unwrap();
        }
        let rows = store
            .appointments_in_range(
                &s,
                TimeRange {
                    start: base,
                    end: base + Duration::days(1),
                },
            )
            .await
            .unwrap();
        let hours: Vec<i64> = rows.iter().map(|a| (a.at - base).num_hours()).collect();
        assert_eq!(hours, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn tenants_do_not_see_each_other() {
        let store = MemoryStore::new();
        let (a, b) = (scope(), scope());
        store
            .insert_patient(
                &a,
                NewPatient {
                    name: "Ana".into(),
                    tax_id: "1".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let seen = store.list_patients(&b, &PatientFilter::default()).await.unwrap();
        assert!(seen.is_empty());
        assert!(store.find_patient_by_name(&b, "ana").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejected_combined_insert_leaves_no_patient() {
        let store = MemoryStore::new();
        let s = scope();
        store.fail_appointment_writes(true);
        let res = store
            .insert_patient_with_appointment(
                &s,
                NewPatient {
                    name: "Novo".into(),
                    tax_id: "x".into(),
                    ..Default::default()
                },
                appt_at(Utc::now(), AppointmentStatus::Scheduled),
            )
            .await;
        assert!(res.is_err());
        assert!(store.list_patients(&s, &PatientFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn join_reports_relationship_error_when_disabled() {
        let store = MemoryStore::new().without_patient_join();
        let s = scope();
        let now = Utc::now();
        let err = store
            .appointments_in_range_with_names(
                &s,
                TimeRange {
                    start: now,
                    end: now + Duration::days(1),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Relationship(_)));
        assert!(!store.supports_patient_join().await);
    }

    #[tokio::test]
    async fn revoked_sessions_are_not_found() {
        let store = MemoryStore::new();
        let (_, user) = store
            .create_tenant_with_admin(
                NewTenant {
                    name: "Clínica".into(),
                    cnpj: None,
                    cpf: None,
                    phone: None,
                    email: None,
                },
                NewUser {
                    name: "Ana".into(),
                    email: "ana@example.com".into(),
                    role: crate::models::Role::Admin,
                    password_hash: None,
                },
            )
            .await
            .unwrap();
        let now = Utc::now();
        let session = store
            .create_session(user.id, "hash", now + Duration::hours(1))
            .await
            .unwrap();
        assert!(store.find_session("hash", now).await.unwrap().is_some());
        assert!(store.revoke_session(session.session_token_id, now).await.unwrap());
        assert!(store.find_session("hash", now).await.unwrap().is_none());
        assert!(!store.revoke_session(session.session_token_id, now).await.unwrap());
    }
}
