use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tracing::{info, warn};

use super::persisted::{PersistedSettings, Repaired};
use super::settings::{LeaseSettings, SettingsCommand, SettingsError};

/// Storage abstraction for the persisted settings document (file, browser storage, database...).
pub trait SettingsRepository: Send + Sync {
    fn load(&self) -> Result<Option<PersistedSettings>, RepositoryError>;
    fn save(&self, settings: &PersistedSettings) -> Result<(), RepositoryError>;
    fn clear(&self) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("settings storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored settings are unreadable: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Process-wide holder of the current settings.
///
/// Readers get an `Arc` snapshot that never changes underneath them. Writers serialize on the
/// lock, edit a copy, persist it and only then publish it.
pub struct SettingsStore<R> {
    current: RwLock<Arc<LeaseSettings>>,
    repository: Arc<R>,
}

impl<R> SettingsStore<R>
where
    R: SettingsRepository + 'static,
{
    /// Loads persisted settings (repairing gaps) or starts from the defaults.
    pub fn open(repository: Arc<R>) -> Result<Self, RepositoryError> {
        let settings = match repository.load()? {
            Some(persisted) => {
                let Repaired { settings, notes } = persisted.repair();
                for note in &notes {
                    warn!(field = note.field, detail = %note.detail, "repaired stored settings");
                }
                info!(repairs = notes.len(), "loaded stored settings");
                settings
            }
            None => {
                info!("no stored settings found, using defaults");
                LeaseSettings::default()
            }
        };

        Ok(Self::with_settings(repository, settings))
    }

    pub fn with_settings(repository: Arc<R>, settings: LeaseSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
            repository,
        }
    }

    pub fn snapshot(&self) -> Arc<LeaseSettings> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn apply(&self, command: SettingsCommand) -> Result<Arc<LeaseSettings>, StoreError> {
        self.apply_all(vec![command])
    }

    /// Applies every command or none of them.
    pub fn apply_all(
        &self,
        commands: Vec<SettingsCommand>,
    ) -> Result<Arc<LeaseSettings>, StoreError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut draft = LeaseSettings::clone(&guard);

        for command in commands {
            let op = command.label();
            draft.apply(command).map_err(|err| {
                warn!(op, error = %err, "rejected settings change");
                err
            })?;
            info!(op, "settings change accepted");
        }

        self.persist(&draft)?;
        let published = Arc::new(draft);
        *guard = published.clone();
        Ok(published)
    }

    /// Swaps in a whole settings value, e.g. from an import.
    pub fn replace(&self, settings: LeaseSettings) -> Result<Arc<LeaseSettings>, StoreError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        let published = Arc::new(settings);
        *guard = published.clone();
        info!("settings replaced");
        Ok(published)
    }

    /// Back to the defaults; the stored document is removed.
    pub fn reset(&self) -> Result<Arc<LeaseSettings>, StoreError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.repository.clear()?;
        let published = Arc::new(LeaseSettings::default());
        *guard = published.clone();
        info!("settings reset to defaults");
        Ok(published)
    }

    fn persist(&self, settings: &LeaseSettings) -> Result<(), RepositoryError> {
        let document = PersistedSettings::capture(settings, Some(Utc::now()));
        self.repository.save(&document)
    }
}
