use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Lower bound (inclusive) of every service-cost interval, ascending.
///
/// Load, seeding and resolution all read this one sequence.
pub const SERVICE_COST_FLOORS: [u32; 23] = [
    1000, 1350, 1700, 2050, 2400, 2750, 3100, 3450, 3800, 4150, 4500, 4850, 5200, 5550, 5900,
    6250, 6600, 6950, 7300, 7650, 8000, 8350, 8700,
];

const DEFAULT_FEES: [Decimal; 23] = [
    dec!(320),
    dec!(290),
    dec!(270),
    dec!(230),
    dec!(250),
    dec!(160),
    dec!(180),
    dec!(170),
    dec!(163),
    dec!(150),
    dec!(170),
    dec!(150),
    dec!(158),
    dec!(130),
    dec!(6),
    dec!(120),
    dec!(150),
    dec!(140),
    dec!(37),
    dec!(150),
    dec!(180),
    dec!(210),
    dec!(236),
];

/// What to do with a price below the first floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BelowFloorPolicy {
    /// Charge the lowest tier's fee.
    #[default]
    Clamp,
    /// Refuse to price the product.
    Reject,
}

/// Flat service fee per price interval floor.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCostTiers {
    fees: BTreeMap<u32, Decimal>,
    below_floor: BelowFloorPolicy,
}

/// Resolution failure: the price sits under the first floor and the policy is `Reject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BelowLowestFloor {
    pub lowest_floor: u32,
}

impl ServiceCostTiers {
    /// Seeded fee table with the clamp policy.
    pub fn standard() -> Self {
        let fees = SERVICE_COST_FLOORS
            .iter()
            .copied()
            .zip(DEFAULT_FEES.iter().copied())
            .collect();
        Self {
            fees,
            below_floor: BelowFloorPolicy::Clamp,
        }
    }

    pub fn empty(below_floor: BelowFloorPolicy) -> Self {
        Self {
            fees: BTreeMap::new(),
            below_floor,
        }
    }

    pub fn is_known_floor(floor: u32) -> bool {
        SERVICE_COST_FLOORS.binary_search(&floor).is_ok()
    }

    /// Seeded fee for a floor, or `None` if the floor is not part of the fixed sequence.
    pub fn default_fee(floor: u32) -> Option<Decimal> {
        SERVICE_COST_FLOORS
            .binary_search(&floor)
            .ok()
            .map(|index| DEFAULT_FEES[index])
    }

    pub fn below_floor(&self) -> BelowFloorPolicy {
        self.below_floor
    }

    pub fn set_below_floor(&mut self, policy: BelowFloorPolicy) {
        self.below_floor = policy;
    }

    /// Fee configured for `floor`, zero when unset.
    pub fn fee(&self, floor: u32) -> Decimal {
        self.fees.get(&floor).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn explicit_fee(&self, floor: u32) -> Option<Decimal> {
        self.fees.get(&floor).copied()
    }

    /// Stores a fee. Callers validate the floor and the sign.
    pub(crate) fn insert(&mut self, floor: u32, fee: Decimal) -> Option<Decimal> {
        self.fees.insert(floor, fee)
    }

    pub(crate) fn retain_known_floors(&mut self) -> Vec<u32> {
        let unknown: Vec<u32> = self
            .fees
            .keys()
            .copied()
            .filter(|floor| !Self::is_known_floor(*floor))
            .collect();
        for floor in &unknown {
            self.fees.remove(floor);
        }
        unknown
    }

    /// Seeds every floor that has no fee yet, returning the floors that were filled.
    pub(crate) fn seed_missing(&mut self) -> Vec<u32> {
        let mut seeded = Vec::new();
        for (floor, fee) in SERVICE_COST_FLOORS.iter().zip(DEFAULT_FEES.iter()) {
            if !self.fees.contains_key(floor) {
                self.fees.insert(*floor, *fee);
                seeded.push(*floor);
            }
        }
        seeded
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Decimal)> + '_ {
        SERVICE_COST_FLOORS
            .iter()
            .map(move |floor| (*floor, self.fee(*floor)))
    }

    pub(crate) fn fees(&self) -> &BTreeMap<u32, Decimal> {
        &self.fees
    }

    /// Resolves the service fee for a price.
    ///
    /// `[f_i, f_i+1)` maps to `f_i`; everything from the last floor upward maps to the last floor.
    pub fn resolve(&self, price: Decimal) -> Result<Decimal, BelowLowestFloor> {
        self.floor_for(price).map(|floor| self.fee(floor))
    }

    /// Interval floor a price falls into under the configured policy.
    pub fn floor_for(&self, price: Decimal) -> Result<u32, BelowLowestFloor> {
        let lowest = SERVICE_COST_FLOORS[0];
        let bucket = SERVICE_COST_FLOORS
            .iter()
            .rev()
            .copied()
            .find(|floor| price >= Decimal::from(*floor));

        match (bucket, self.below_floor) {
            (Some(floor), _) => Ok(floor),
            (None, BelowFloorPolicy::Clamp) => Ok(lowest),
            (None, BelowFloorPolicy::Reject) => Err(BelowLowestFloor {
                lowest_floor: lowest,
            }),
        }
    }
}

impl Default for ServiceCostTiers {
    fn default() -> Self {
        Self::standard()
    }
}
