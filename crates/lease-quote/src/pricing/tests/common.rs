use std::sync::{Arc, Mutex};

use axum::response::Response;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::pricing::engine::{PriceBounds, QuoteEngine, QuoteInput};
use crate::pricing::persisted::PersistedSettings;
use crate::pricing::router::{quote_router, AdminAccess};
use crate::pricing::service::QuoteService;
use crate::pricing::settings::LeaseSettings;
use crate::pricing::store::{RepositoryError, SettingsRepository, SettingsStore};

pub(super) const ADMIN_TOKEN: &str = "s3cret-admin";

pub(super) fn scenario_input() -> QuoteInput {
    QuoteInput::new(dec!(5000), dec!(0.3), 10)
}

pub(super) fn shop_bounds() -> PriceBounds {
    PriceBounds::new(Some(dec!(2000)), Some(dec!(1000000)))
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) document: Arc<Mutex<Option<PersistedSettings>>>,
    pub(super) saves: Arc<Mutex<usize>>,
}

impl MemoryRepository {
    pub(super) fn seeded(document: PersistedSettings) -> Self {
        let repository = Self::default();
        *repository.document.lock().expect("repository mutex poisoned") = Some(document);
        repository
    }

    pub(super) fn stored(&self) -> Option<PersistedSettings> {
        self.document
            .lock()
            .expect("repository mutex poisoned")
            .clone()
    }

    pub(super) fn save_count(&self) -> usize {
        *self.saves.lock().expect("repository mutex poisoned")
    }
}

impl SettingsRepository for MemoryRepository {
    fn load(&self) -> Result<Option<PersistedSettings>, RepositoryError> {
        Ok(self.stored())
    }

    fn save(&self, settings: &PersistedSettings) -> Result<(), RepositoryError> {
        *self.document.lock().expect("repository mutex poisoned") = Some(settings.clone());
        *self.saves.lock().expect("repository mutex poisoned") += 1;
        Ok(())
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        *self.document.lock().expect("repository mutex poisoned") = None;
        Ok(())
    }
}

/// Loads fine but refuses every write.
pub(super) struct ReadOnlyRepository;

impl SettingsRepository for ReadOnlyRepository {
    fn load(&self) -> Result<Option<PersistedSettings>, RepositoryError> {
        Ok(None)
    }

    fn save(&self, _settings: &PersistedSettings) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl SettingsRepository for UnavailableRepository {
    fn load(&self) -> Result<Option<PersistedSettings>, RepositoryError> {
        Err(RepositoryError::Unavailable("disk offline".to_string()))
    }

    fn save(&self, _settings: &PersistedSettings) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("disk offline".to_string()))
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("disk offline".to_string()))
    }
}

pub(super) fn build_service() -> (QuoteService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let store = SettingsStore::with_settings(repository.clone(), LeaseSettings::default());
    let service = QuoteService::new(store, QuoteEngine::new(shop_bounds()));
    (service, repository)
}

pub(super) fn read_only_service() -> QuoteService<ReadOnlyRepository> {
    let store = SettingsStore::with_settings(Arc::new(ReadOnlyRepository), LeaseSettings::default());
    QuoteService::new(store, QuoteEngine::new(shop_bounds()))
}

pub(super) fn router_with_service<R>(service: QuoteService<R>) -> axum::Router
where
    R: SettingsRepository + 'static,
{
    quote_router(Arc::new(service), AdminAccess::with_token(ADMIN_TOKEN))
}

/// `left` and `right` agree to well below a cent.
pub(super) fn assert_close(left: Decimal, right: Decimal) {
    let drift = (left - right).abs();
    assert!(
        drift < dec!(0.000001),
        "{left} and {right} differ by {drift}"
    );
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
