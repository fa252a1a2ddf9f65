use std::sync::Arc;

use physiopro::{
    agenda::names::NameResolver,
    build_app,
    clock::{LocalCalendar, SystemClock},
    config::Config,
    db,
    models::{AppState, WorkHours},
    store::{ClinicStore, PgStore},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;

    let store: Arc<dyn ClinicStore> = Arc::new(PgStore::new(pool));
    let names = NameResolver::detect(store.as_ref()).await;
    let calendar = LocalCalendar::from_offset_minutes(cfg.clinic_utc_offset_minutes, Arc::new(SystemClock));
    tracing::info!(offset = %calendar.offset(), "clinic calendar");

    let state = AppState {
        store,
        calendar,
        names,
        session_ttl_hours: cfg.session_ttl_hours,
        work_hours: WorkHours {
            start: cfg.work_day_start_hour,
            end: cfg.work_day_end_hour,
        },
    };

    let app = build_app(state);

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
