use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::gating::TermGates;
use super::rates::RateTable;
use super::settings::{
    default_rate_table, validate_ratio, validate_term, LeaseSettings, DEFAULT_BASE_RATE,
    DEFAULT_RATIOS, DEFAULT_TERMS,
};
use super::tiers::{BelowFloorPolicy, ServiceCostTiers};

/// Stored form of [`LeaseSettings`]. Every field may be missing in older or hand-edited files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_rate: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_payment_ratios: Option<Vec<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_terms: Option<Vec<u32>>,
    /// ratio -> term -> stored offset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_table: Option<BTreeMap<Decimal, BTreeMap<u32, Decimal>>>,
    /// interval floor -> flat fee
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_cost_tiers: Option<BTreeMap<u32, Decimal>>,
    /// term -> minimum down-payment ratio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_gates: Option<BTreeMap<u32, Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below_floor_policy: Option<BelowFloorPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

/// A field that had to be replaced or trimmed while loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairNote {
    pub field: &'static str,
    pub detail: String,
}

impl RepairNote {
    fn new(field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            field,
            detail: detail.into(),
        }
    }
}

/// Settings rebuilt from storage plus the list of repairs applied.
#[derive(Debug, Clone)]
pub struct Repaired {
    pub settings: LeaseSettings,
    pub notes: Vec<RepairNote>,
}

impl PersistedSettings {
    /// Full snapshot of `settings`, stamped with `saved_at`.
    pub fn capture(settings: &LeaseSettings, saved_at: Option<DateTime<Utc>>) -> Self {
        let tiers = settings.service_costs();
        Self {
            base_rate: Some(settings.base_rate()),
            down_payment_ratios: Some(settings.down_payment_ratios().to_vec()),
            lease_terms: Some(settings.lease_terms().to_vec()),
            rate_table: Some(settings.rate_table().to_nested()),
            service_cost_tiers: Some(tiers.fees().clone()),
            term_gates: Some(settings.term_gates().iter().collect()),
            below_floor_policy: Some(tiers.below_floor()),
            saved_at,
        }
    }

    /// Rebuilds settings, filling every missing or unusable field from the defaults.
    pub fn repair(self) -> Repaired {
        let mut notes = Vec::new();

        let base_rate = match self.base_rate {
            Some(rate) if !rate.is_zero() => rate,
            Some(_) => {
                notes.push(RepairNote::new("base_rate", "zero base rate replaced by default"));
                DEFAULT_BASE_RATE
            }
            None => {
                notes.push(RepairNote::new("base_rate", "missing, using default"));
                DEFAULT_BASE_RATE
            }
        };

        let down_payment_ratios = repair_list(
            "down_payment_ratios",
            self.down_payment_ratios,
            validate_ratio,
            || DEFAULT_RATIOS.iter().map(|ratio| ratio.normalize()).collect(),
            &mut notes,
        );

        let lease_terms = repair_list(
            "lease_terms",
            self.lease_terms,
            validate_term,
            || DEFAULT_TERMS.to_vec(),
            &mut notes,
        );

        let rate_table = match self.rate_table {
            Some(nested) => RateTable::from_nested(&nested),
            None => {
                notes.push(RepairNote::new("rate_table", "missing, using default table"));
                default_rate_table()
            }
        };

        let below_floor = self.below_floor_policy.unwrap_or_default();
        let service_costs = repair_tiers(self.service_cost_tiers, below_floor, &mut notes);

        let term_gates = match self.term_gates {
            Some(thresholds) => {
                let mut gates = TermGates::none();
                for (term, min_ratio) in thresholds {
                    if min_ratio < Decimal::ZERO || min_ratio > Decimal::ONE {
                        notes.push(RepairNote::new(
                            "term_gates",
                            format!("dropped threshold {min_ratio} for term {term}"),
                        ));
                        continue;
                    }
                    gates.set(term, min_ratio);
                }
                gates
            }
            None => {
                notes.push(RepairNote::new("term_gates", "missing, using default gates"));
                TermGates::standard()
            }
        };

        Repaired {
            settings: LeaseSettings::from_parts(
                base_rate,
                down_payment_ratios,
                lease_terms,
                rate_table,
                service_costs,
                term_gates,
            ),
            notes,
        }
    }
}

fn repair_list<T, E>(
    field: &'static str,
    stored: Option<Vec<T>>,
    validate: impl Fn(T) -> Result<T, E>,
    defaults: impl FnOnce() -> Vec<T>,
    notes: &mut Vec<RepairNote>,
) -> Vec<T>
where
    T: Copy + PartialEq + std::fmt::Display,
{
    let Some(stored) = stored else {
        notes.push(RepairNote::new(field, "missing, using defaults"));
        return defaults();
    };

    let mut kept: Vec<T> = Vec::with_capacity(stored.len());
    for value in stored {
        match validate(value) {
            Ok(valid) if !kept.contains(&valid) => kept.push(valid),
            Ok(valid) => notes.push(RepairNote::new(field, format!("dropped duplicate {valid}"))),
            Err(_) => notes.push(RepairNote::new(field, format!("dropped invalid {value}"))),
        }
    }

    if kept.is_empty() {
        notes.push(RepairNote::new(field, "empty, using defaults"));
        return defaults();
    }
    kept
}

fn repair_tiers(
    stored: Option<BTreeMap<u32, Decimal>>,
    below_floor: BelowFloorPolicy,
    notes: &mut Vec<RepairNote>,
) -> ServiceCostTiers {
    let mut tiers = ServiceCostTiers::empty(below_floor);
    if let Some(fees) = stored {
        for (floor, fee) in fees {
            if fee.is_sign_negative() && !fee.is_zero() {
                notes.push(RepairNote::new(
                    "service_cost_tiers",
                    format!("negative fee {fee} at floor {floor} replaced by default"),
                ));
                continue;
            }
            tiers.insert(floor, fee);
        }
    }

    for floor in tiers.retain_known_floors() {
        notes.push(RepairNote::new(
            "service_cost_tiers",
            format!("dropped unknown floor {floor}"),
        ));
    }
    for floor in tiers.seed_missing() {
        notes.push(RepairNote::new(
            "service_cost_tiers",
            format!("seeded default fee for floor {floor}"),
        ));
    }
    tiers
}

impl LeaseSettings {
    /// Pretty JSON in the persisted layout.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&PersistedSettings::capture(self, None))
    }

    /// Parses the persisted layout and repairs whatever is missing.
    pub fn from_json(raw: &str) -> Result<Repaired, serde_json::Error> {
        let persisted: PersistedSettings = serde_json::from_str(raw)?;
        Ok(persisted.repair())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::tiers::SERVICE_COST_FLOORS;
    use rust_decimal_macros::dec;

    #[test]
    fn export_then_import_is_lossless() {
        let mut settings = LeaseSettings::default();
        settings.set_base_rate(dec!(2.5)).expect("base rate");
        settings.add_term(24).expect("term");
        settings.set_rate(dec!(0.9), 36, dec!(12.5));
        settings.set_service_cost(4850, dec!(175.25)).expect("fee");
        settings.set_below_floor_policy(BelowFloorPolicy::Reject);
        settings.clear_term_gate(12);

        let json = settings.export_json().expect("export");
        let repaired = LeaseSettings::from_json(&json).expect("import");

        assert!(repaired.notes.is_empty(), "unexpected repairs: {:?}", repaired.notes);
        assert_eq!(repaired.settings, settings);
    }

    #[test]
    fn empty_document_repairs_to_defaults() {
        let repaired = LeaseSettings::from_json("{}").expect("parses");
        assert_eq!(repaired.settings, LeaseSettings::default());
        let fields: Vec<&str> = repaired.notes.iter().map(|note| note.field).collect();
        assert!(fields.contains(&"base_rate"));
        assert!(fields.contains(&"down_payment_ratios"));
        assert!(fields.contains(&"lease_terms"));
        assert!(fields.contains(&"rate_table"));
        assert!(fields.contains(&"term_gates"));
        assert_eq!(
            fields.iter().filter(|field| **field == "service_cost_tiers").count(),
            SERVICE_COST_FLOORS.len()
        );
    }

    #[test]
    fn partial_tiers_keep_saved_fees_and_seed_the_rest() {
        let raw = r#"{
            "service_cost_tiers": { "1000": "300", "1100": "5", "8700": "-3" }
        }"#;
        let repaired = LeaseSettings::from_json(raw).expect("parses");
        let tiers = repaired.settings.service_costs();
        assert_eq!(tiers.fee(1000), dec!(300));
        assert_eq!(tiers.fee(8700), dec!(236));
        assert_eq!(tiers.explicit_fee(1100), None);
        assert!(repaired
            .notes
            .iter()
            .any(|note| note.detail == "dropped unknown floor 1100"));
    }

    #[test]
    fn empty_or_invalid_sets_fall_back_to_defaults() {
        let raw = r#"{ "down_payment_ratios": [], "lease_terms": [1, 6, 6] }"#;
        let repaired = LeaseSettings::from_json(raw).expect("parses");
        assert_eq!(repaired.settings.down_payment_ratios().len(), 6);
        assert_eq!(repaired.settings.lease_terms(), &[6]);
    }

    #[test]
    fn oversized_saved_terms_are_dropped() {
        let raw = r#"{ "lease_terms": [10, 4294967295, 121] }"#;
        let repaired = LeaseSettings::from_json(raw).expect("parses");
        assert_eq!(repaired.settings.lease_terms(), &[10]);
        assert!(repaired.notes.iter().any(|note| note.field == "lease_terms"));
    }

    #[test]
    fn numeric_json_values_are_accepted() {
        let raw = r#"{ "base_rate": 1.5, "down_payment_ratios": [0.25, 0.5] }"#;
        let repaired = LeaseSettings::from_json(raw).expect("parses");
        assert_eq!(repaired.settings.base_rate(), dec!(1.5));
        assert_eq!(repaired.settings.down_payment_ratios(), &[dec!(0.25), dec!(0.5)]);
    }
}
