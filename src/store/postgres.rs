use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AccountStore, AppointmentStore, PatientStore, RecordStore};
use crate::error::StoreError;
use crate::models::{
    normalize_name, Anamnesis, Appointment, AppointmentStatus, Exercise, NewAppointment,
    NewExercise, NewPatient, NewTenant, NewUser, Patient, PatientFilter, Role, SessionPrincipal,
    Tenant, TenantScope, TimeRange, User,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    nome: String,
    cnpj: Option<String>,
    cpf: Option<String>,
    telefone: Option<String>,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(r: TenantRow) -> Self {
        Tenant {
            id: r.id,
            name: r.nome,
            cnpj: r.cnpj,
            cpf: r.cpf,
            phone: r.telefone,
            email: r.email,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    empresa_id: Uuid,
    nome: String,
    email: String,
    cargo: String,
    password_hash: Option<String>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            tenant_id: r.empresa_id,
            name: r.nome,
            email: r.email,
            role: Role::parse(&r.cargo),
            password_hash: r.password_hash,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    session_token_id: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionPrincipal {
    fn from(r: SessionRow) -> Self {
        SessionPrincipal {
            session_token_id: r.session_token_id,
            user_id: r.user_id,
            expires_at: r.expires_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PatientRow {
    id: Uuid,
    nome: String,
    cpf: String,
    ativo: bool,
    diagnostico: Option<String>,
    data_nascimento: Option<NaiveDate>,
    telefone: Option<String>,
    email: Option<String>,
    observacoes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PatientRow> for Patient {
    fn from(r: PatientRow) -> Self {
        Patient {
            id: r.id,
            name: r.nome,
            tax_id: r.cpf,
            active: r.ativo,
            diagnosis: r.diagnostico,
            birth_date: r.data_nascimento,
            phone: r.telefone,
            email: r.email,
            notes: r.observacoes,
            created_at: r.created_at,
        }
    }
}

const PATIENT_COLUMNS: &str =
    "id, nome, cpf, ativo, diagnostico, data_nascimento, telefone, email, observacoes, created_at";

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    id: Uuid,
    data: DateTime<Utc>,
    paciente_id: Option<Uuid>,
    tipo: Option<String>,
    status: Option<String>,
    dor: Option<i16>,
    observacoes: Option<String>,
    evolucao: Option<String>,
}

impl From<AppointmentRow> for Appointment {
    fn from(r: AppointmentRow) -> Self {
        Appointment {
            id: r.id,
            at: r.data,
            patient_id: r.paciente_id,
            kind: r.tipo,
            status: AppointmentStatus::from_db(r.status.as_deref()),
            pain: r.dor,
            notes: r.observacoes,
            evolution: r.evolucao,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JoinedAppointmentRow {
    #[sqlx(flatten)]
    appointment: AppointmentRow,
    paciente_nome: Option<String>,
}

const APPOINTMENT_COLUMNS: &str =
    "id, data, paciente_id, tipo, status, dor, observacoes, evolucao";

#[derive(Debug, sqlx::FromRow)]
struct AnamnesisRow {
    queixa_principal: Option<String>,
    historico_clinico: Option<String>,
    historico_familiar: Option<String>,
    limitacoes: Option<String>,
    uso_medicacoes: Option<String>,
    objetivos_tratamento: Option<String>,
}

impl From<AnamnesisRow> for Anamnesis {
    fn from(r: AnamnesisRow) -> Self {
        Anamnesis {
            chief_complaint: r.queixa_principal,
            clinical_history: r.historico_clinico,
            family_history: r.historico_familiar,
            limitations: r.limitacoes,
            medications: r.uso_medicacoes,
            treatment_goals: r.objetivos_tratamento,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ExerciseRow {
    id: Uuid,
    empresa_id: Option<Uuid>,
    categoria: Option<String>,
    nome: String,
    nivel: Option<String>,
    descricao: Option<String>,
}

impl From<ExerciseRow> for Exercise {
    fn from(r: ExerciseRow) -> Self {
        Exercise {
            id: r.id,
            tenant_id: r.empresa_id,
            category: r.categoria,
            name: r.nome,
            level: r.nivel,
            description: r.descricao,
        }
    }
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/* -------------------------
   Accounts
--------------------------*/

#[async_trait]
impl AccountStore for PgStore {
    async fn create_tenant_with_admin(
        &self,
        tenant: NewTenant,
        admin: NewUser,
    ) -> Result<(Tenant, User), StoreError> {
        let mut tx = self.pool.begin().await?;

        let tenant: TenantRow = sqlx::query_as::<_, TenantRow>(
            r#"
            INSERT INTO empresas (nome, cnpj, cpf, telefone, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, nome, cnpj, cpf, telefone, email, created_at
            "#,
        )
        .bind(&tenant.name)
        .bind(tenant.cnpj.as_deref())
        .bind(tenant.cpf.as_deref())
        .bind(tenant.phone.as_deref())
        .bind(tenant.email.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let user: UserRow = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO usuarios (empresa_id, nome, email, cargo, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, empresa_id, nome, email, cargo, password_hash
            "#,
        )
        .bind(tenant.id)
        .bind(&admin.name)
        .bind(&admin.email)
        .bind(admin.role.as_str())
        .bind(admin.password_hash.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((tenant.into(), user.into()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, empresa_id, nome, email, cargo, password_hash
            FROM usuarios
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, empresa_id, nome, email, cargo, password_hash
            FROM usuarios
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT id, nome, cnpj, cpf, telefone, email, created_at
            FROM empresas
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE usuarios
            SET password_hash = $2
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionPrincipal, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO session_token (user_id, session_token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING session_token_id, user_id, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionPrincipal>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT st.session_token_id, st.user_id, st.expires_at
            FROM session_token st
            JOIN usuarios u ON u.id = st.user_id
            WHERE st.session_token_hash = $1
              AND st.revoked_at IS NULL
              AND st.expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn touch_session(&self, session_token_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE session_token
            SET last_seen_at = $2
            WHERE session_token_id = $1
            "#,
        )
        .bind(session_token_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_session(&self, session_token_id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = $2
            WHERE session_token_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(session_token_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}

/* -------------------------
   Patients
--------------------------*/

#[async_trait]
impl PatientStore for PgStore {
    async fn list_patients(
        &self,
        scope: &TenantScope,
        filter: &PatientFilter,
    ) -> Result<Vec<Patient>, StoreError> {
        let pattern = like_pattern(filter.search.as_deref().unwrap_or("").trim());
        let sql = format!(
            r#"
            SELECT {PATIENT_COLUMNS}
            FROM pacientes
            WHERE empresa_id = $1
              AND nome ILIKE $2
              AND ($3 = false OR ativo = true)
            ORDER BY nome ASC
            "#
        );
        let rows = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(scope.tenant_id)
            .bind(pattern)
            .bind(filter.only_active)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_patient(&self, scope: &TenantScope, patient_id: Uuid) -> Result<Option<Patient>, StoreError> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM pacientes WHERE empresa_id = $1 AND id = $2");
        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(scope.tenant_id)
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_patient_by_name(&self, scope: &TenantScope, name: &str) -> Result<Option<Patient>, StoreError> {
        let sql = format!(
            r#"
            SELECT {PATIENT_COLUMNS}
            FROM pacientes
            WHERE empresa_id = $1
              AND lower(btrim(nome)) = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(scope.tenant_id)
            .bind(normalize_name(name))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_patient(&self, scope: &TenantScope, patient: NewPatient) -> Result<Patient, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO pacientes (empresa_id, nome, cpf, ativo, diagnostico, data_nascimento, telefone, email)
            VALUES ($1, $2, $3, true, $4, $5, $6, $7)
            RETURNING {PATIENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(scope.tenant_id)
            .bind(&patient.name)
            .bind(&patient.tax_id)
            .bind(patient.diagnosis.as_deref())
            .bind(patient.birth_date)
            .bind(patient.phone.as_deref())
            .bind(patient.email.as_deref())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn set_patient_active(
        &self,
        scope: &TenantScope,
        patient_id: Uuid,
        active: bool,
    ) -> Result<Option<Patient>, StoreError> {
        let sql = format!(
            r#"
            UPDATE pacientes
            SET ativo = $3
            WHERE empresa_id = $1 AND id = $2
            RETURNING {PATIENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(scope.tenant_id)
            .bind(patient_id)
            .bind(active)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn patient_names(&self, scope: &TenantScope, ids: &[Uuid]) -> Result<Vec<(Uuid, String)>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT id, nome
            FROM pacientes
            WHERE empresa_id = $1
              AND id = ANY($2)
            "#,
        )
        .bind(scope.tenant_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_active_patients(&self, scope: &TenantScope) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM pacientes
            WHERE empresa_id = $1 AND ativo = true
            "#,
        )
        .bind(scope.tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }
}

/* -------------------------
   Appointments
--------------------------*/

#[async_trait]
impl AppointmentStore for PgStore {
    async fn supports_patient_join(&self) -> bool {
        let probe = sqlx::query(
            r#"
            SELECT s.id, p.nome
            FROM sessoes s
            LEFT JOIN pacientes p ON p.id = s.paciente_id
            LIMIT 0
            "#,
        )
        .execute(&self.pool)
        .await;
        match probe {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "patient join probe failed");
                false
            }
        }
    }

    async fn appointments_in_range(
        &self,
        scope: &TenantScope,
        range: TimeRange,
    ) -> Result<Vec<Appointment>, StoreError> {
        let sql = format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM sessoes
            WHERE empresa_id = $1
              AND data >= $2
              AND data <  $3
              AND status IS DISTINCT FROM 'cancelado'
            ORDER BY data ASC
            "#
        );
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(scope.tenant_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn appointments_in_range_with_names(
        &self,
        scope: &TenantScope,
        range: TimeRange,
    ) -> Result<Vec<(Appointment, Option<String>)>, StoreError> {
        let rows = sqlx::query_as::<_, JoinedAppointmentRow>(
            r#"
            SELECT
              s.id, s.data, s.paciente_id, s.tipo, s.status, s.dor, s.observacoes, s.evolucao,
              p.nome AS paciente_nome
            FROM sessoes s
            LEFT JOIN pacientes p ON p.id = s.paciente_id AND p.empresa_id = s.empresa_id
            WHERE s.empresa_id = $1
              AND s.data >= $2
              AND s.data <  $3
              AND s.status IS DISTINCT FROM 'cancelado'
            ORDER BY s.data ASC
            "#,
        )
        .bind(scope.tenant_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.appointment.into(), r.paciente_nome))
            .collect())
    }

    async fn count_appointments_in_range(&self, scope: &TenantScope, range: TimeRange) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM sessoes
            WHERE empresa_id = $1
              AND data >= $2
              AND data <  $3
              AND status IS DISTINCT FROM 'cancelado'
            "#,
        )
        .bind(scope.tenant_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    async fn appointments_for_patient(
        &self,
        scope: &TenantScope,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError> {
        let sql = format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM sessoes
            WHERE empresa_id = $1 AND paciente_id = $2
            ORDER BY data ASC
            "#
        );
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(scope.tenant_id)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_appointment(
        &self,
        scope: &TenantScope,
        appointment: NewAppointment,
    ) -> Result<Appointment, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO sessoes (empresa_id, data, paciente_id, tipo, status, dor, observacoes, evolucao)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(scope.tenant_id)
            .bind(appointment.at)
            .bind(appointment.patient_id)
            .bind(appointment.kind.as_deref())
            .bind(appointment.status.as_str())
            .bind(appointment.pain)
            .bind(appointment.notes.as_deref())
            .bind(appointment.evolution.as_deref())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn insert_patient_with_appointment(
        &self,
        scope: &TenantScope,
        patient: NewPatient,
        appointment: NewAppointment,
    ) -> Result<(Patient, Appointment), StoreError> {
        let mut tx = self.pool.begin().await?;

        let patient_sql = format!(
            r#"
            INSERT INTO pacientes (empresa_id, nome, cpf, ativo, diagnostico, data_nascimento, telefone, email)
            VALUES ($1, $2, $3, true, $4, $5, $6, $7)
            RETURNING {PATIENT_COLUMNS}
            "#
        );
        let patient: PatientRow = sqlx::query_as::<_, PatientRow>(&patient_sql)
            .bind(scope.tenant_id)
            .bind(&patient.name)
            .bind(&patient.tax_id)
            .bind(patient.diagnosis.as_deref())
            .bind(patient.birth_date)
            .bind(patient.phone.as_deref())
            .bind(patient.email.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        let appt_sql = format!(
            r#"
            INSERT INTO sessoes (empresa_id, data, paciente_id, tipo, status, dor, observacoes, evolucao)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );
        let appt: AppointmentRow = sqlx::query_as::<_, AppointmentRow>(&appt_sql)
            .bind(scope.tenant_id)
            .bind(appointment.at)
            .bind(patient.id)
            .bind(appointment.kind.as_deref())
            .bind(appointment.status.as_str())
            .bind(appointment.pain)
            .bind(appointment.notes.as_deref())
            .bind(appointment.evolution.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((patient.into(), appt.into()))
    }

    async fn set_appointment_status(
        &self,
        scope: &TenantScope,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        let sql = format!(
            r#"
            UPDATE sessoes
            SET status = $3
            WHERE empresa_id = $1 AND id = $2
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(scope.tenant_id)
            .bind(appointment_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }
}

/* -------------------------
   Clinical records
--------------------------*/

#[async_trait]
impl RecordStore for PgStore {
    async fn get_anamnesis(&self, scope: &TenantScope, patient_id: Uuid) -> Result<Option<Anamnesis>, StoreError> {
        let row = sqlx::query_as::<_, AnamnesisRow>(
            r#"
            SELECT queixa_principal, historico_clinico, historico_familiar,
                   limitacoes, uso_medicacoes, objetivos_tratamento
            FROM anamneses
            WHERE empresa_id = $1 AND paciente_id = $2
            "#,
        )
        .bind(scope.tenant_id)
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn upsert_anamnesis(
        &self,
        scope: &TenantScope,
        patient_id: Uuid,
        anamnesis: Anamnesis,
    ) -> Result<Anamnesis, StoreError> {
        // Upsert only for patients of the caller's tenant.
        let row = sqlx::query_as::<_, AnamnesisRow>(
            r#"
            INSERT INTO anamneses (
              empresa_id, paciente_id, queixa_principal, historico_clinico, historico_familiar,
              limitacoes, uso_medicacoes, objetivos_tratamento
            )
            SELECT $1, p.id, $3, $4, $5, $6, $7, $8
            FROM pacientes p
            WHERE p.empresa_id = $1 AND p.id = $2
            ON CONFLICT (paciente_id) DO UPDATE SET
              queixa_principal     = EXCLUDED.queixa_principal,
              historico_clinico    = EXCLUDED.historico_clinico,
              historico_familiar   = EXCLUDED.historico_familiar,
              limitacoes           = EXCLUDED.limitacoes,
              uso_medicacoes       = EXCLUDED.uso_medicacoes,
              objetivos_tratamento = EXCLUDED.objetivos_tratamento
            RETURNING queixa_principal, historico_clinico, historico_familiar,
                      limitacoes, uso_medicacoes, objetivos_tratamento
            "#,
        )
        .bind(scope.tenant_id)
        .bind(patient_id)
        .bind(anamnesis.chief_complaint.as_deref())
        .bind(anamnesis.clinical_history.as_deref())
        .bind(anamnesis.family_history.as_deref())
        .bind(anamnesis.limitations.as_deref())
        .bind(anamnesis.medications.as_deref())
        .bind(anamnesis.treatment_goals.as_deref())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("patient"))?;
        Ok(row.into())
    }

    async fn list_exercises(&self, scope: &TenantScope) -> Result<Vec<Exercise>, StoreError> {
        let rows = sqlx::query_as::<_, ExerciseRow>(
            r#"
            SELECT id, empresa_id, categoria, nome, nivel, descricao
            FROM exercicios
            WHERE empresa_id = $1 OR empresa_id IS NULL
            ORDER BY nome ASC
            "#,
        )
        .bind(scope.tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_exercise(&self, scope: &TenantScope, exercise: NewExercise) -> Result<Exercise, StoreError> {
        let row = sqlx::query_as::<_, ExerciseRow>(
            r#"
            INSERT INTO exercicios (empresa_id, categoria, nome, nivel, descricao)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, empresa_id, categoria, nome, nivel, descricao
            "#,
        )
        .bind(scope.tenant_id)
        .bind(exercise.category.as_deref())
        .bind(&exercise.name)
        .bind(exercise.level.as_deref())
        .bind(exercise.description.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn count_global_exercises(&self) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM exercicios WHERE empresa_id IS NULL"#)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn insert_global_exercises(&self, exercises: &[NewExercise]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for e in exercises {
            let res = sqlx::query(
                r#"
                INSERT INTO exercicios (empresa_id, categoria, nome, nivel, descricao)
                SELECT NULL::uuid, $1, $2, $3, $4
                WHERE NOT EXISTS (
                  SELECT 1 FROM exercicios
                  WHERE empresa_id IS NULL
                    AND categoria IS NOT DISTINCT FROM $1
                    AND nome = $2
                )
                "#,
            )
            .bind(e.category.as_deref())
            .bind(&e.name)
            .bind(e.level.as_deref())
            .bind(e.description.as_deref())
            .execute(&mut *tx)
            .await?;
            inserted += res.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("ana"), "%ana%");
        assert_eq!(like_pattern("50%_x"), "%50\\%\\_x%");
        assert_eq!(like_pattern(""), "%%");
    }
}
