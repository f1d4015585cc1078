use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Stored rates are offsets from this baseline; the applied rate is `stored + RATE_BASELINE`.
pub const RATE_BASELINE: Decimal = dec!(100);

/// Composite key of a rate cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RateKey {
    pub ratio: Decimal,
    pub term: u32,
}

impl RateKey {
    pub fn new(ratio: Decimal, term: u32) -> Self {
        Self {
            ratio: ratio.normalize(),
            term,
        }
    }
}

/// Sparse rate table. A missing cell means "use the base rate".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    cells: BTreeMap<RateKey, Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ratio: Decimal, term: u32) -> Option<Decimal> {
        self.cells.get(&RateKey::new(ratio, term)).copied()
    }

    pub fn set(&mut self, ratio: Decimal, term: u32, offset: Decimal) -> Option<Decimal> {
        self.cells.insert(RateKey::new(ratio, term), offset)
    }

    pub fn clear(&mut self, ratio: Decimal, term: u32) -> Option<Decimal> {
        self.cells.remove(&RateKey::new(ratio, term))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RateKey, Decimal)> + '_ {
        self.cells.iter().map(|(key, value)| (*key, *value))
    }

    /// Nested `ratio -> term -> offset` form used by the persisted layout.
    pub fn to_nested(&self) -> BTreeMap<Decimal, BTreeMap<u32, Decimal>> {
        let mut nested: BTreeMap<Decimal, BTreeMap<u32, Decimal>> = BTreeMap::new();
        for (key, value) in &self.cells {
            nested.entry(key.ratio).or_default().insert(key.term, *value);
        }
        nested
    }

    pub fn from_nested(nested: &BTreeMap<Decimal, BTreeMap<u32, Decimal>>) -> Self {
        let mut table = Self::new();
        for (ratio, terms) in nested {
            for (term, offset) in terms {
                table.set(*ratio, *term, *offset);
            }
        }
        table
    }
}

impl FromIterator<(Decimal, u32, Decimal)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (Decimal, u32, Decimal)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (ratio, term, offset) in iter {
            table.set(ratio, term, offset);
        }
        table
    }
}

/// Effective percentage rate for a ratio/term pair.
///
/// A present cell (including zero) wins; otherwise the base rate applies. Both get the baseline added.
pub fn resolve_rate(ratio: Decimal, term: u32, table: &RateTable, base_rate: Decimal) -> Decimal {
    table
        .get(ratio, term)
        .unwrap_or(base_rate)
        .saturating_add(RATE_BASELINE)
}

/// Stored offset for a rate shown to administrators.
pub fn offset_from_displayed(displayed: Decimal) -> Decimal {
    displayed.saturating_sub(RATE_BASELINE)
}
