use std::io::Read;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use super::engine::{InvalidInput, PriceBounds, QuoteEngine, QuoteError, QuoteInput, QuoteResult};
use super::matrix::{parse_rate_csv, MatrixImportError, RateMatrix};
use super::persisted::{PersistedSettings, RepairNote, Repaired};
use super::settings::{LeaseSettings, SettingsCommand, SettingsError};
use super::store::{RepositoryError, SettingsRepository, SettingsStore, StoreError};

/// Ratio preselected when offering options, if it is on the list.
pub const PREFERRED_RATIO: Decimal = dec!(0.3);

/// Selectable dimensions for one ratio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteOptions {
    pub ratios: Vec<Decimal>,
    pub selected_ratio: Decimal,
    pub terms: Vec<u32>,
}

/// Service composing the settings store and the quote engine.
pub struct QuoteService<R> {
    store: SettingsStore<R>,
    engine: QuoteEngine,
}

impl<R> QuoteService<R>
where
    R: SettingsRepository + 'static,
{
    pub fn new(store: SettingsStore<R>, engine: QuoteEngine) -> Self {
        Self { store, engine }
    }

    pub fn open(repository: Arc<R>, bounds: PriceBounds) -> Result<Self, QuoteServiceError> {
        let store = SettingsStore::open(repository)?;
        Ok(Self::new(store, QuoteEngine::new(bounds)))
    }

    pub fn engine(&self) -> &QuoteEngine {
        &self.engine
    }

    /// Prices one quote against a single settings snapshot.
    pub fn quote(&self, input: QuoteInput) -> Result<QuoteResult, QuoteServiceError> {
        let settings = self.store.snapshot();
        let result = self.engine.compute(input, &settings)?;
        debug!(
            price = %result.price,
            ratio = %result.ratio,
            term = result.term,
            total = %result.total_payable,
            "quote computed"
        );
        Ok(result)
    }

    /// Ratios on offer and the terms allowed for `ratio` (or the preselected ratio).
    pub fn options(&self, ratio: Option<Decimal>) -> Result<QuoteOptions, QuoteServiceError> {
        let settings = self.store.snapshot();
        let ratios = settings.down_payment_ratios().to_vec();

        let selected_ratio = match ratio {
            Some(ratio) if settings.offers_ratio(ratio) => ratio.normalize(),
            Some(ratio) => return Err(QuoteError::from(InvalidInput::UnknownRatio(ratio)).into()),
            None if settings.offers_ratio(PREFERRED_RATIO) => PREFERRED_RATIO,
            None => ratios[0],
        };

        Ok(QuoteOptions {
            terms: settings.allowed_terms(selected_ratio),
            ratios,
            selected_ratio,
        })
    }

    pub fn settings(&self) -> Arc<LeaseSettings> {
        self.store.snapshot()
    }

    pub fn export(&self) -> PersistedSettings {
        PersistedSettings::capture(&self.store.snapshot(), None)
    }

    pub fn rate_matrix(&self) -> RateMatrix {
        RateMatrix::from_settings(&self.store.snapshot())
    }

    pub fn apply(
        &self,
        commands: Vec<SettingsCommand>,
    ) -> Result<Arc<LeaseSettings>, QuoteServiceError> {
        Ok(self.store.apply_all(commands)?)
    }

    pub fn replace(
        &self,
        settings: LeaseSettings,
    ) -> Result<Arc<LeaseSettings>, QuoteServiceError> {
        Ok(self.store.replace(settings)?)
    }

    /// Replaces all settings with an imported document, repairing missing fields.
    pub fn import(&self, document: PersistedSettings) -> Result<Vec<RepairNote>, QuoteServiceError> {
        let Repaired { settings, notes } = document.repair();
        self.replace(settings)?;
        Ok(notes)
    }

    /// Applies a displayed-rate CSV sheet; returns how many cells were written.
    pub fn import_rate_csv<Rd: Read>(&self, reader: Rd) -> Result<usize, QuoteServiceError> {
        let commands = parse_rate_csv(reader)?;
        let count = commands.len();
        self.store.apply_all(commands)?;
        Ok(count)
    }

    pub fn reset(&self) -> Result<Arc<LeaseSettings>, QuoteServiceError> {
        Ok(self.store.reset()?)
    }
}

/// Error raised by the quote service.
#[derive(Debug, thiserror::Error)]
pub enum QuoteServiceError {
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    RateSheet(#[from] MatrixImportError),
}

impl From<StoreError> for QuoteServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Settings(err) => Self::Settings(err),
            StoreError::Repository(err) => Self::Repository(err),
        }
    }
}
