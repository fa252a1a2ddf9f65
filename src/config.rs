use std::env;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub db_max_connections: u32,
    /// Offset of the clinic's wall clock from UTC, in minutes (São Paulo = -180).
    pub clinic_utc_offset_minutes: i32,
    pub work_day_start_hour: u32,
    pub work_day_end_hour: u32,
}

/// Missing variables take `default`; present but unparseable ones are an error.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env_or("SESSION_TTL_HOURS", 24i64)?;
        let db_max_connections = env_or("DB_MAX_CONNECTIONS", 5u32)?;
        let clinic_utc_offset_minutes = env_or("CLINIC_UTC_OFFSET_MINUTES", -180i32)?;
        let work_day_start_hour = env_or("WORK_DAY_START_HOUR", 8u32)?;
        let work_day_end_hour = env_or("WORK_DAY_END_HOUR", 18u32)?;

        if clinic_utc_offset_minutes.abs() >= 24 * 60 {
            anyhow::bail!("CLINIC_UTC_OFFSET_MINUTES must be within +/- 1439");
        }
        if work_day_start_hour > work_day_end_hour || work_day_end_hour > 23 {
            anyhow::bail!("working hours must satisfy START <= END <= 23");
        }

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            db_max_connections,
            clinic_utc_offset_minutes,
            work_day_start_hour,
            work_day_end_hour,
        })
    }
}
