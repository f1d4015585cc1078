use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::gating::TermGates;
use super::rates::{offset_from_displayed, RateTable};
use super::tiers::{BelowFloorPolicy, ServiceCostTiers};

pub const DEFAULT_BASE_RATE: Decimal = dec!(1.286);

pub const DEFAULT_RATIOS: [Decimal; 6] = [
    dec!(0.2),
    dec!(0.3),
    dec!(0.35),
    dec!(0.4),
    dec!(0.45),
    dec!(0.5),
];

pub const DEFAULT_TERMS: [u32; 3] = [6, 10, 12];

/// Shortest lease that leaves at least one installment after the down payment.
pub const MIN_LEASE_TERM: u32 = 2;

/// Longest lease that can be offered, ten years of monthly periods.
pub const MAX_LEASE_TERM: u32 = 120;

const DEFAULT_RATE_CELLS: [(Decimal, u32, Decimal); 18] = [
    (dec!(0.2), 6, dec!(34.8)),
    (dec!(0.2), 10, dec!(42.6)),
    (dec!(0.2), 12, dec!(17)),
    (dec!(0.3), 6, dec!(32.5)),
    (dec!(0.3), 10, dec!(37.3)),
    (dec!(0.3), 12, dec!(47.3)),
    (dec!(0.35), 6, dec!(31.8)),
    (dec!(0.35), 10, dec!(37.3)),
    (dec!(0.35), 12, dec!(46.8)),
    (dec!(0.4), 6, dec!(31.1)),
    (dec!(0.4), 10, dec!(36.8)),
    (dec!(0.4), 12, dec!(45.7)),
    (dec!(0.45), 6, dec!(29.3)),
    (dec!(0.45), 10, dec!(36)),
    (dec!(0.45), 12, dec!(45.6)),
    (dec!(0.5), 6, dec!(27.2)),
    (dec!(0.5), 10, dec!(32.9)),
    (dec!(0.5), 12, dec!(44.8)),
];

pub fn default_rate_table() -> RateTable {
    DEFAULT_RATE_CELLS.iter().copied().collect()
}

/// Rejected administrative edit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("base rate must be nonzero")]
    ZeroBaseRate,
    #[error("down-payment ratio {0} must be greater than 0 and at most 1")]
    RatioOutOfRange(Decimal),
    #[error("down-payment ratio {0} is already offered")]
    DuplicateRatio(Decimal),
    #[error("down-payment ratio {0} is not offered")]
    UnknownRatio(Decimal),
    #[error("at least one down-payment ratio must remain")]
    LastRatio,
    #[error("lease term {0} must be at least 2 periods")]
    TermTooShort(u32),
    #[error("lease term {0} exceeds the maximum of {max} periods", max = MAX_LEASE_TERM)]
    TermTooLong(u32),
    #[error("lease term {0} is already offered")]
    DuplicateTerm(u32),
    #[error("lease term {0} is not offered")]
    UnknownTerm(u32),
    #[error("at least one lease term must remain")]
    LastTerm,
    #[error("{0} is not a service-cost interval floor")]
    UnknownTierFloor(u32),
    #[error("service cost for floor {floor} must not be negative (got {fee})")]
    NegativeFee { floor: u32, fee: Decimal },
    #[error("minimum ratio {min_ratio} for term {term} must be between 0 and 1")]
    GateOutOfRange { term: u32, min_ratio: Decimal },
}

/// One administrative edit, serializable so it can cross the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SettingsCommand {
    SetBaseRate { rate: Decimal },
    AddRatio { ratio: Decimal },
    RemoveRatio { ratio: Decimal },
    ReplaceRatio { from: Decimal, to: Decimal },
    AddTerm { term: u32 },
    RemoveTerm { term: u32 },
    ReplaceTerm { from: u32, to: u32 },
    /// Stores `offset` as-is.
    SetRate { ratio: Decimal, term: u32, offset: Decimal },
    /// Takes the rate as administrators see it (`offset + 100`).
    SetDisplayedRate {
        ratio: Decimal,
        term: u32,
        displayed: Decimal,
    },
    ClearRate { ratio: Decimal, term: u32 },
    SetServiceCost { floor: u32, fee: Decimal },
    SetBelowFloorPolicy { policy: BelowFloorPolicy },
    SetTermGate { term: u32, min_ratio: Decimal },
    ClearTermGate { term: u32 },
}

impl SettingsCommand {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetBaseRate { .. } => "set_base_rate",
            Self::AddRatio { .. } => "add_ratio",
            Self::RemoveRatio { .. } => "remove_ratio",
            Self::ReplaceRatio { .. } => "replace_ratio",
            Self::AddTerm { .. } => "add_term",
            Self::RemoveTerm { .. } => "remove_term",
            Self::ReplaceTerm { .. } => "replace_term",
            Self::SetRate { .. } => "set_rate",
            Self::SetDisplayedRate { .. } => "set_displayed_rate",
            Self::ClearRate { .. } => "clear_rate",
            Self::SetServiceCost { .. } => "set_service_cost",
            Self::SetBelowFloorPolicy { .. } => "set_below_floor_policy",
            Self::SetTermGate { .. } => "set_term_gate",
            Self::ClearTermGate { .. } => "clear_term_gate",
        }
    }
}

/// Tunable pricing parameters.
///
/// Ratios and terms keep the order administrators gave them. Rate cells for ratios or terms
/// that were later removed are kept; they simply stop being reachable.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseSettings {
    base_rate: Decimal,
    down_payment_ratios: Vec<Decimal>,
    lease_terms: Vec<u32>,
    rate_table: RateTable,
    service_costs: ServiceCostTiers,
    term_gates: TermGates,
}

impl LeaseSettings {
    pub(crate) fn from_parts(
        base_rate: Decimal,
        down_payment_ratios: Vec<Decimal>,
        lease_terms: Vec<u32>,
        rate_table: RateTable,
        service_costs: ServiceCostTiers,
        term_gates: TermGates,
    ) -> Self {
        Self {
            base_rate,
            down_payment_ratios,
            lease_terms,
            rate_table,
            service_costs,
            term_gates,
        }
    }

    pub fn base_rate(&self) -> Decimal {
        self.base_rate
    }

    pub fn down_payment_ratios(&self) -> &[Decimal] {
        &self.down_payment_ratios
    }

    pub fn lease_terms(&self) -> &[u32] {
        &self.lease_terms
    }

    pub fn rate_table(&self) -> &RateTable {
        &self.rate_table
    }

    pub fn service_costs(&self) -> &ServiceCostTiers {
        &self.service_costs
    }

    pub fn term_gates(&self) -> &TermGates {
        &self.term_gates
    }

    pub fn offers_ratio(&self, ratio: Decimal) -> bool {
        self.down_payment_ratios.contains(&ratio.normalize())
    }

    pub fn offers_term(&self, term: u32) -> bool {
        self.lease_terms.contains(&term)
    }

    /// Lease terms selectable together with `ratio`.
    pub fn allowed_terms(&self, ratio: Decimal) -> Vec<u32> {
        self.term_gates.allowed_terms(ratio, &self.lease_terms)
    }

    pub fn set_base_rate(&mut self, rate: Decimal) -> Result<(), SettingsError> {
        if rate.is_zero() {
            return Err(SettingsError::ZeroBaseRate);
        }
        self.base_rate = rate;
        Ok(())
    }

    pub fn add_ratio(&mut self, ratio: Decimal) -> Result<(), SettingsError> {
        let ratio = validate_ratio(ratio)?;
        if self.down_payment_ratios.contains(&ratio) {
            return Err(SettingsError::DuplicateRatio(ratio));
        }
        self.down_payment_ratios.push(ratio);
        Ok(())
    }

    pub fn remove_ratio(&mut self, ratio: Decimal) -> Result<(), SettingsError> {
        let index = self.ratio_index(ratio)?;
        if self.down_payment_ratios.len() == 1 {
            return Err(SettingsError::LastRatio);
        }
        self.down_payment_ratios.remove(index);
        Ok(())
    }

    pub fn replace_ratio(&mut self, from: Decimal, to: Decimal) -> Result<(), SettingsError> {
        let index = self.ratio_index(from)?;
        let to = validate_ratio(to)?;
        if to != self.down_payment_ratios[index] && self.down_payment_ratios.contains(&to) {
            return Err(SettingsError::DuplicateRatio(to));
        }
        self.down_payment_ratios[index] = to;
        Ok(())
    }

    pub fn add_term(&mut self, term: u32) -> Result<(), SettingsError> {
        let term = validate_term(term)?;
        if self.lease_terms.contains(&term) {
            return Err(SettingsError::DuplicateTerm(term));
        }
        self.lease_terms.push(term);
        Ok(())
    }

    pub fn remove_term(&mut self, term: u32) -> Result<(), SettingsError> {
        let index = self.term_index(term)?;
        if self.lease_terms.len() == 1 {
            return Err(SettingsError::LastTerm);
        }
        self.lease_terms.remove(index);
        Ok(())
    }

    pub fn replace_term(&mut self, from: u32, to: u32) -> Result<(), SettingsError> {
        let index = self.term_index(from)?;
        let to = validate_term(to)?;
        if to != from && self.lease_terms.contains(&to) {
            return Err(SettingsError::DuplicateTerm(to));
        }
        self.lease_terms[index] = to;
        Ok(())
    }

    /// Stores a rate offset. Cells for pairs outside the current sets are accepted.
    pub fn set_rate(&mut self, ratio: Decimal, term: u32, offset: Decimal) {
        self.rate_table.set(ratio, term, offset);
    }

    pub fn set_displayed_rate(&mut self, ratio: Decimal, term: u32, displayed: Decimal) {
        self.rate_table
            .set(ratio, term, offset_from_displayed(displayed));
    }

    pub fn clear_rate(&mut self, ratio: Decimal, term: u32) -> Option<Decimal> {
        self.rate_table.clear(ratio, term)
    }

    pub fn set_service_cost(&mut self, floor: u32, fee: Decimal) -> Result<(), SettingsError> {
        if !ServiceCostTiers::is_known_floor(floor) {
            return Err(SettingsError::UnknownTierFloor(floor));
        }
        if fee.is_sign_negative() && !fee.is_zero() {
            return Err(SettingsError::NegativeFee { floor, fee });
        }
        self.service_costs.insert(floor, fee);
        Ok(())
    }

    pub fn set_below_floor_policy(&mut self, policy: BelowFloorPolicy) {
        self.service_costs.set_below_floor(policy);
    }

    pub fn set_term_gate(&mut self, term: u32, min_ratio: Decimal) -> Result<(), SettingsError> {
        if min_ratio < Decimal::ZERO || min_ratio > Decimal::ONE {
            return Err(SettingsError::GateOutOfRange { term, min_ratio });
        }
        self.term_gates.set(term, min_ratio);
        Ok(())
    }

    pub fn clear_term_gate(&mut self, term: u32) -> Option<Decimal> {
        self.term_gates.clear(term)
    }

    pub fn apply(&mut self, command: SettingsCommand) -> Result<(), SettingsError> {
        match command {
            SettingsCommand::SetBaseRate { rate } => self.set_base_rate(rate),
            SettingsCommand::AddRatio { ratio } => self.add_ratio(ratio),
            SettingsCommand::RemoveRatio { ratio } => self.remove_ratio(ratio),
            SettingsCommand::ReplaceRatio { from, to } => self.replace_ratio(from, to),
            SettingsCommand::AddTerm { term } => self.add_term(term),
            SettingsCommand::RemoveTerm { term } => self.remove_term(term),
            SettingsCommand::ReplaceTerm { from, to } => self.replace_term(from, to),
            SettingsCommand::SetRate {
                ratio,
                term,
                offset,
            } => {
                self.set_rate(ratio, term, offset);
                Ok(())
            }
            SettingsCommand::SetDisplayedRate {
                ratio,
                term,
                displayed,
            } => {
                self.set_displayed_rate(ratio, term, displayed);
                Ok(())
            }
            SettingsCommand::ClearRate { ratio, term } => {
                self.clear_rate(ratio, term);
                Ok(())
            }
            SettingsCommand::SetServiceCost { floor, fee } => self.set_service_cost(floor, fee),
            SettingsCommand::SetBelowFloorPolicy { policy } => {
                self.set_below_floor_policy(policy);
                Ok(())
            }
            SettingsCommand::SetTermGate { term, min_ratio } => {
                self.set_term_gate(term, min_ratio)
            }
            SettingsCommand::ClearTermGate { term } => {
                self.clear_term_gate(term);
                Ok(())
            }
        }
    }

    fn ratio_index(&self, ratio: Decimal) -> Result<usize, SettingsError> {
        let ratio = ratio.normalize();
        self.down_payment_ratios
            .iter()
            .position(|existing| *existing == ratio)
            .ok_or(SettingsError::UnknownRatio(ratio))
    }

    fn term_index(&self, term: u32) -> Result<usize, SettingsError> {
        self.lease_terms
            .iter()
            .position(|existing| *existing == term)
            .ok_or(SettingsError::UnknownTerm(term))
    }
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self {
            base_rate: DEFAULT_BASE_RATE,
            down_payment_ratios: DEFAULT_RATIOS.iter().map(|ratio| ratio.normalize()).collect(),
            lease_terms: DEFAULT_TERMS.to_vec(),
            rate_table: default_rate_table(),
            service_costs: ServiceCostTiers::standard(),
            term_gates: TermGates::standard(),
        }
    }
}

pub(crate) fn validate_ratio(ratio: Decimal) -> Result<Decimal, SettingsError> {
    if ratio <= Decimal::ZERO || ratio > Decimal::ONE {
        return Err(SettingsError::RatioOutOfRange(ratio));
    }
    Ok(ratio.normalize())
}

pub(crate) fn validate_term(term: u32) -> Result<u32, SettingsError> {
    if term < MIN_LEASE_TERM {
        return Err(SettingsError::TermTooShort(term));
    }
    if term > MAX_LEASE_TERM {
        return Err(SettingsError::TermTooLong(term));
    }
    Ok(term)
}
