use lease_quote::config::{ConfigError, PricingConfig};
use lease_quote::error::AppError;
use lease_quote::pricing::{
    AdminAccess, PersistedSettings, QuoteService, QuoteServiceError, RepositoryError,
    SettingsRepository,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySettingsRepository {
    document: Arc<Mutex<Option<PersistedSettings>>>,
}

impl SettingsRepository for InMemorySettingsRepository {
    fn load(&self) -> Result<Option<PersistedSettings>, RepositoryError> {
        let guard = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn save(&self, settings: &PersistedSettings) -> Result<(), RepositoryError> {
        let mut guard = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(settings.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        let mut guard = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        Ok(())
    }
}

/// Settings kept as one pretty-printed JSON document on disk.
#[derive(Debug, Clone)]
pub(crate) struct JsonFileSettingsRepository {
    path: PathBuf,
}

impl JsonFileSettingsRepository {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

impl SettingsRepository for JsonFileSettingsRepository {
    fn load(&self) -> Result<Option<PersistedSettings>, RepositoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(unavailable(&self.path, err)),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| RepositoryError::Corrupt(format!("{}: {err}", self.path.display())))
    }

    fn save(&self, settings: &PersistedSettings) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| unavailable(parent, err))?;
        }

        let body = serde_json::to_string_pretty(settings)
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
        let staging = self.staging_path();
        fs::write(&staging, body).map_err(|err| unavailable(&staging, err))?;
        fs::rename(&staging, &self.path).map_err(|err| unavailable(&self.path, err))
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(unavailable(&self.path, err)),
        }
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: {err}", path.display()))
}

/// Storage selected at startup.
#[derive(Clone)]
pub(crate) enum SettingsBackend {
    Memory(InMemorySettingsRepository),
    File(JsonFileSettingsRepository),
}

impl SettingsBackend {
    pub(crate) fn from_config(config: &PricingConfig) -> Self {
        match &config.settings_path {
            Some(path) => Self::File(JsonFileSettingsRepository::new(path)),
            None => Self::Memory(InMemorySettingsRepository::default()),
        }
    }

    pub(crate) fn is_persistent(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Memory(_) => "memory".to_string(),
            Self::File(repository) => repository.path().display().to_string(),
        }
    }
}

impl SettingsRepository for SettingsBackend {
    fn load(&self) -> Result<Option<PersistedSettings>, RepositoryError> {
        match self {
            Self::Memory(repository) => repository.load(),
            Self::File(repository) => repository.load(),
        }
    }

    fn save(&self, settings: &PersistedSettings) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(repository) => repository.save(settings),
            Self::File(repository) => repository.save(settings),
        }
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(repository) => repository.clear(),
            Self::File(repository) => repository.clear(),
        }
    }
}

pub(crate) type LeaseQuoteService = QuoteService<SettingsBackend>;

pub(crate) fn build_service(
    config: &PricingConfig,
) -> Result<LeaseQuoteService, QuoteServiceError> {
    let backend = SettingsBackend::from_config(config);
    info!(storage = %backend.describe(), "opening lease settings");
    QuoteService::open(Arc::new(backend), config.price_bounds)
}

/// Opens the service for a one-shot edit, which would vanish with an in-memory store.
pub(crate) fn build_persistent_service(
    config: &PricingConfig,
    command: &'static str,
) -> Result<LeaseQuoteService, AppError> {
    if !SettingsBackend::from_config(config).is_persistent() {
        return Err(ConfigError::SettingsPathRequired { command }.into());
    }
    Ok(build_service(config)?)
}

pub(crate) fn admin_access(config: &PricingConfig) -> AdminAccess {
    match &config.admin_token {
        Some(token) => AdminAccess::with_token(token.clone()),
        None => AdminAccess::disabled(),
    }
}

pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim())
        .map_err(|err| format!("failed to parse '{raw}' as a number ({err})"))
}
