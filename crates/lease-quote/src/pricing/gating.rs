use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Minimum down-payment ratio per lease term. Terms without an entry are always offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermGates {
    thresholds: BTreeMap<u32, Decimal>,
}

impl TermGates {
    /// 12-period leases need at least 35% down.
    pub fn standard() -> Self {
        let mut thresholds = BTreeMap::new();
        thresholds.insert(12, dec!(0.35));
        Self { thresholds }
    }

    pub fn none() -> Self {
        Self {
            thresholds: BTreeMap::new(),
        }
    }

    pub fn threshold(&self, term: u32) -> Option<Decimal> {
        self.thresholds.get(&term).copied()
    }

    pub(crate) fn set(&mut self, term: u32, min_ratio: Decimal) -> Option<Decimal> {
        self.thresholds.insert(term, min_ratio.normalize())
    }

    pub(crate) fn clear(&mut self, term: u32) -> Option<Decimal> {
        self.thresholds.remove(&term)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Decimal)> + '_ {
        self.thresholds.iter().map(|(term, ratio)| (*term, *ratio))
    }

    pub fn allows(&self, ratio: Decimal, term: u32) -> bool {
        self.threshold(term)
            .map(|minimum| ratio >= minimum)
            .unwrap_or(true)
    }

    /// Terms from `all_terms` that may be chosen with `ratio`, order preserved.
    pub fn allowed_terms(&self, ratio: Decimal, all_terms: &[u32]) -> Vec<u32> {
        all_terms
            .iter()
            .copied()
            .filter(|term| self.allows(ratio, *term))
            .collect()
    }
}

impl Default for TermGates {
    fn default() -> Self {
        Self::standard()
    }
}
