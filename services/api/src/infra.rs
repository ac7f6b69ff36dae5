use axum::Router;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use ppdb::admissions::{
    admissions_router, AdmissionsState, Clock, FeeCatalogRepository, FeeCatalogService,
    MemoryFeeCatalogRepository, MemoryRegistrationRepository, RegistrationRepository,
    RegistrationService, SqliteStore,
};
use ppdb::config::{StorageBackend, StorageConfig};
use ppdb::error::AppError;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Services bound to whichever store the configuration selected.
pub(crate) enum Stores {
    Memory(AdmissionsState<MemoryRegistrationRepository, MemoryFeeCatalogRepository>),
    Sqlite(AdmissionsState<SqliteStore, SqliteStore>),
}

impl Stores {
    pub(crate) fn open(config: &StorageConfig, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let stores = match &config.backend {
            StorageBackend::Memory => Self::Memory(state(
                Arc::new(MemoryRegistrationRepository::default()),
                Arc::new(MemoryFeeCatalogRepository::default()),
                clock,
                config.page_size,
            )),
            StorageBackend::SqliteInMemory => {
                let store = Arc::new(SqliteStore::open_in_memory()?);
                Self::Sqlite(state(store.clone(), store, clock, config.page_size))
            }
            StorageBackend::SqliteFile(path) => {
                let store = Arc::new(SqliteStore::open(path)?);
                Self::Sqlite(state(store.clone(), store, clock, config.page_size))
            }
        };
        info!(backend = stores.backend_name(), "admissions store opened");
        Ok(stores)
    }

    pub(crate) fn backend_name(&self) -> &'static str {
        match self {
            Stores::Memory(_) => "memory",
            Stores::Sqlite(_) => "sqlite",
        }
    }

    pub(crate) fn router(&self) -> Router {
        match self {
            Stores::Memory(state) => admissions_router(state.clone()),
            Stores::Sqlite(state) => admissions_router(state.clone()),
        }
    }
}

fn state<R, F>(
    registrations: Arc<R>,
    fees: Arc<F>,
    clock: Arc<dyn Clock>,
    page_size: u32,
) -> AdmissionsState<R, F>
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    AdmissionsState {
        registrations: Arc::new(
            RegistrationService::new(registrations, clock.clone()).with_page_size(page_size),
        ),
        fees: Arc::new(FeeCatalogService::new(fees, clock.clone())),
        clock,
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
