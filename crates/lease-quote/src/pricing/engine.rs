use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::rates::resolve_rate;
use super::settings::{LeaseSettings, MAX_LEASE_TERM, MIN_LEASE_TERM};

/// Price, down-payment ratio and lease term a customer picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInput {
    pub price: Decimal,
    pub ratio: Decimal,
    pub term: u32,
}

impl QuoteInput {
    pub fn new(price: Decimal, ratio: Decimal, term: u32) -> Self {
        Self { price, ratio, term }
    }

    /// Builds an input from a raw price string as typed by a customer.
    pub fn parse(raw_price: &str, ratio: Decimal, term: u32) -> Result<Self, InvalidInput> {
        let price = Decimal::from_str(raw_price.trim())
            .map_err(|_| InvalidInput::NonNumericPrice(raw_price.to_string()))?;
        Ok(Self::new(price, ratio, term))
    }
}

/// Caller-side input problems.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInput {
    #[error("price '{0}' is not a number")]
    NonNumericPrice(String),
    #[error("price must be greater than zero (got {0})")]
    NonPositivePrice(Decimal),
    #[error("price {price} is below the minimum of {minimum}")]
    PriceBelowMinimum { price: Decimal, minimum: Decimal },
    #[error("price {price} exceeds the maximum of {maximum}")]
    PriceAboveMaximum { price: Decimal, maximum: Decimal },
    #[error("down-payment ratio {0} is not offered")]
    UnknownRatio(Decimal),
    #[error("lease term {0} is not offered")]
    UnknownTerm(u32),
    #[error("lease term {term} exceeds the maximum of {maximum} periods")]
    TermTooLong { term: u32, maximum: u32 },
    #[error("lease term {term} needs at least {min_ratio} down (got {ratio})")]
    TermNotAllowed {
        ratio: Decimal,
        term: u32,
        min_ratio: Decimal,
    },
}

/// Reasons a quote cannot be produced. All are detected before any amount is computed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    #[error("a lease of {term} period(s) leaves nothing to bill after the down payment")]
    DegenerateTerm { term: u32 },
    #[error("price {price} is below the lowest service-cost floor {lowest_floor}")]
    ConfigurationGap { price: Decimal, lowest_floor: u32 },
    #[error("quote amounts exceed the supported decimal range")]
    Overflow,
}

/// Business price limits owned by the caller. `None` leaves a side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl PriceBounds {
    pub fn new(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn check(&self, price: Decimal) -> Result<(), InvalidInput> {
        if let Some(minimum) = self.min {
            if price < minimum {
                return Err(InvalidInput::PriceBelowMinimum { price, minimum });
            }
        }
        if let Some(maximum) = self.max {
            if price > maximum {
                return Err(InvalidInput::PriceAboveMaximum { price, maximum });
            }
        }
        Ok(())
    }
}

/// Billing breakdown for one quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteResult {
    pub price: Decimal,
    pub ratio: Decimal,
    pub term: u32,
    pub down_payment: Decimal,
    pub unpaid_balance: Decimal,
    /// Percentage applied to the unpaid balance, baseline included.
    pub effective_rate: Decimal,
    pub financed_rent: Decimal,
    pub service_cost_floor: u32,
    pub service_cost: Decimal,
    pub total_payable: Decimal,
    pub installment_amount: Decimal,
}

impl QuoteResult {
    /// Periods 2..=term, each billing `installment_amount`. Period 1 is the down payment.
    pub fn schedule(&self) -> InstallmentSchedule {
        InstallmentSchedule {
            next_period: MIN_LEASE_TERM,
            remaining: self.term.saturating_sub(1),
            amount: self.installment_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Installment {
    pub period: u32,
    pub amount: Decimal,
}

/// Finite iterator over the billed periods of a quote; clone it or call
/// [`QuoteResult::schedule`] again to restart.
#[derive(Debug, Clone)]
pub struct InstallmentSchedule {
    next_period: u32,
    remaining: u32,
    amount: Decimal,
}

impl Iterator for InstallmentSchedule {
    type Item = Installment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let period = self.next_period;
        self.remaining -= 1;
        self.next_period = period.saturating_add(1);
        Some(Installment {
            period,
            amount: self.amount,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for InstallmentSchedule {}

/// Inputs that passed every check, with the service-cost bucket already resolved.
#[derive(Debug, Clone, Copy)]
struct ValidatedQuote {
    input: QuoteInput,
    service_cost_floor: u32,
    service_cost: Decimal,
}

/// Stateless calculator applying a settings snapshot to a quote input.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteEngine {
    bounds: PriceBounds,
}

impl QuoteEngine {
    pub fn new(bounds: PriceBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> PriceBounds {
        self.bounds
    }

    pub fn compute(
        &self,
        input: QuoteInput,
        settings: &LeaseSettings,
    ) -> Result<QuoteResult, QuoteError> {
        let validated = self.validate(input, settings)?;
        price_quote(validated, settings).ok_or(QuoteError::Overflow)
    }

    fn validate(
        &self,
        input: QuoteInput,
        settings: &LeaseSettings,
    ) -> Result<ValidatedQuote, QuoteError> {
        let QuoteInput { price, ratio, term } = input;

        if price <= Decimal::ZERO {
            return Err(InvalidInput::NonPositivePrice(price).into());
        }
        self.bounds.check(price)?;

        if term < MIN_LEASE_TERM {
            return Err(QuoteError::DegenerateTerm { term });
        }
        if term > MAX_LEASE_TERM {
            return Err(InvalidInput::TermTooLong {
                term,
                maximum: MAX_LEASE_TERM,
            }
            .into());
        }
        if !settings.offers_ratio(ratio) {
            return Err(InvalidInput::UnknownRatio(ratio).into());
        }
        if !settings.offers_term(term) {
            return Err(InvalidInput::UnknownTerm(term).into());
        }
        if let Some(min_ratio) = settings.term_gates().threshold(term) {
            if ratio < min_ratio {
                return Err(InvalidInput::TermNotAllowed {
                    ratio,
                    term,
                    min_ratio,
                }
                .into());
            }
        }

        let tiers = settings.service_costs();
        let service_cost_floor = tiers
            .floor_for(price)
            .map_err(|gap| QuoteError::ConfigurationGap {
                price,
                lowest_floor: gap.lowest_floor,
            })?;

        Ok(ValidatedQuote {
            input,
            service_cost_floor,
            service_cost: tiers.fee(service_cost_floor),
        })
    }
}

/// Convenience wrapper using an engine without price bounds.
pub fn compute(
    price: Decimal,
    ratio: Decimal,
    term: u32,
    settings: &LeaseSettings,
) -> Result<QuoteResult, QuoteError> {
    QuoteEngine::default().compute(QuoteInput::new(price, ratio, term), settings)
}

fn price_quote(validated: ValidatedQuote, settings: &LeaseSettings) -> Option<QuoteResult> {
    let ValidatedQuote {
        input: QuoteInput { price, ratio, term },
        service_cost_floor,
        service_cost,
    } = validated;

    let down_payment = price.checked_mul(ratio)?;
    let unpaid_balance = price.checked_sub(down_payment)?;
    let effective_rate = resolve_rate(ratio, term, settings.rate_table(), settings.base_rate());
    let financed_rent =
        unpaid_balance.checked_mul(effective_rate.checked_div(Decimal::ONE_HUNDRED)?)?;
    let total_payable = down_payment
        .checked_add(financed_rent)?
        .checked_add(service_cost)?;
    let installment_amount = total_payable
        .checked_sub(down_payment)?
        .checked_div(Decimal::from(term - 1))?;

    Some(QuoteResult {
        price,
        ratio,
        term,
        down_payment,
        unpaid_balance,
        effective_rate,
        financed_rent,
        service_cost_floor,
        service_cost,
        total_payable,
        installment_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn schedule_lists_periods_after_the_down_payment() {
        let quote = compute(dec!(5000), dec!(0.3), 10, &LeaseSettings::default())
            .expect("quote computes");
        let schedule = quote.schedule();
        assert_eq!(schedule.len(), 9);

        let periods: Vec<u32> = schedule.map(|installment| installment.period).collect();
        assert_eq!(periods, (2..=10).collect::<Vec<_>>());
        assert!(quote
            .schedule()
            .all(|installment| installment.amount == quote.installment_amount));
    }

    #[test]
    fn oversized_terms_are_rejected_before_scheduling() {
        let mut settings = LeaseSettings::default();
        settings.add_term(MAX_LEASE_TERM).expect("longest term accepted");
        assert!(settings.add_term(u32::MAX).is_err());

        assert_eq!(
            compute(dec!(5000), dec!(0.5), u32::MAX, &settings),
            Err(QuoteError::InvalidInput(InvalidInput::TermTooLong {
                term: u32::MAX,
                maximum: MAX_LEASE_TERM,
            }))
        );

        let quote =
            compute(dec!(5000), dec!(0.5), MAX_LEASE_TERM, &settings).expect("quote computes");
        let mut schedule = quote.schedule();
        assert_eq!(schedule.len(), (MAX_LEASE_TERM - 1) as usize);
        assert_eq!(schedule.by_ref().last().map(|item| item.period), Some(MAX_LEASE_TERM));
        assert_eq!(schedule.next(), None);
        assert_eq!(schedule.len(), 0);
    }

    #[test]
    fn schedule_counts_down_without_overflowing() {
        let quote = QuoteResult {
            price: dec!(5000),
            ratio: dec!(0.5),
            term: u32::MAX,
            down_payment: dec!(2500),
            unpaid_balance: dec!(2500),
            effective_rate: dec!(100),
            financed_rent: dec!(2500),
            service_cost_floor: 4850,
            service_cost: dec!(150),
            total_payable: dec!(5150),
            installment_amount: dec!(1),
        };
        let mut schedule = quote.schedule();
        assert_eq!(schedule.len(), (u32::MAX - 1) as usize);
        assert_eq!(schedule.next().map(|item| item.period), Some(2));
        assert_eq!(schedule.len(), (u32::MAX - 2) as usize);
    }

    #[test]
    fn bounds_are_inclusive() {
        let bounds = PriceBounds::new(Some(dec!(2000)), Some(dec!(1000000)));
        assert_eq!(bounds.check(dec!(2000)), Ok(()));
        assert_eq!(bounds.check(dec!(1000000)), Ok(()));
        assert_eq!(
            bounds.check(dec!(1999.99)),
            Err(InvalidInput::PriceBelowMinimum {
                price: dec!(1999.99),
                minimum: dec!(2000)
            })
        );
        assert!(matches!(
            bounds.check(dec!(1000000.01)),
            Err(InvalidInput::PriceAboveMaximum { .. })
        ));
    }

    #[test]
    fn parse_rejects_non_numeric_prices() {
        assert_eq!(
            QuoteInput::parse("abc", dec!(0.3), 10),
            Err(InvalidInput::NonNumericPrice("abc".to_string()))
        );
        let input = QuoteInput::parse(" 4999.5 ", dec!(0.3), 10).expect("parses");
        assert_eq!(input.price, dec!(4999.5));
    }

    #[test]
    fn oversized_amounts_report_overflow() {
        let mut settings = LeaseSettings::default();
        settings.set_rate(dec!(0.3), 10, Decimal::MAX - dec!(100));
        assert_eq!(
            compute(dec!(5000), dec!(0.3), 10, &settings),
            Err(QuoteError::Overflow)
        );
    }
}
