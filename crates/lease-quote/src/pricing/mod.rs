//! Lease quote pricing: configurable settings, the quote engine, and the HTTP surface.
//!
//! Settings live in a copy-on-write store so a quote always sees one consistent snapshot,
//! while administrators edit rates, tiers and gates through validated commands.

pub mod engine;
pub mod gating;
pub mod matrix;
pub mod persisted;
pub mod rates;
pub mod router;
pub mod service;
pub mod settings;
pub mod store;
pub mod tiers;

#[cfg(test)]
mod tests;

pub use engine::{
    compute, Installment, InstallmentSchedule, InvalidInput, PriceBounds, QuoteEngine,
    QuoteError, QuoteInput, QuoteResult,
};
pub use gating::TermGates;
pub use matrix::{
    display_rate, parse_rate_csv, ratio_label, MatrixImportError, RateCell, RateMatrix,
    RateMatrixRow,
};
pub use persisted::{PersistedSettings, RepairNote, Repaired};
pub use rates::{offset_from_displayed, resolve_rate, RateKey, RateTable, RATE_BASELINE};
pub use router::{quote_router, AdminAccess, QuoteView};
pub use service::{QuoteOptions, QuoteService, QuoteServiceError, PREFERRED_RATIO};
pub use settings::{
    default_rate_table, LeaseSettings, SettingsCommand, SettingsError, DEFAULT_BASE_RATE,
    DEFAULT_RATIOS, DEFAULT_TERMS, MAX_LEASE_TERM, MIN_LEASE_TERM,
};
pub use store::{RepositoryError, SettingsRepository, SettingsStore, StoreError};
pub use tiers::{BelowFloorPolicy, BelowLowestFloor, ServiceCostTiers, SERVICE_COST_FLOORS};
