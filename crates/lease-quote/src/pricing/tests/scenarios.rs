use super::common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::pricing::engine::{compute, InvalidInput, QuoteError, QuoteInput};
use crate::pricing::settings::{LeaseSettings, DEFAULT_RATIOS};
use crate::pricing::tiers::BelowFloorPolicy;

#[test]
fn ratio_thirty_ten_periods_uses_stored_rate_and_4850_tier() {
    let input = scenario_input();
    let quote = compute(input.price, input.ratio, input.term, &LeaseSettings::default())
        .expect("quote computes");

    assert_eq!(quote.down_payment, dec!(1500));
    assert_eq!(quote.unpaid_balance, dec!(3500));
    assert_eq!(quote.effective_rate, dec!(137.3));
    assert_eq!(quote.financed_rent, dec!(4805.5));
    assert_eq!(quote.service_cost_floor, 4850);
    assert_eq!(quote.service_cost, dec!(150));
    assert_eq!(quote.total_payable, dec!(6455.5));
    assert_close(quote.installment_amount, dec!(4955.5) / dec!(9));
    assert_eq!(quote.schedule().len(), 9);
}

#[test]
fn single_period_lease_is_degenerate() {
    let settings = LeaseSettings::default();
    assert_eq!(
        compute(dec!(5000), dec!(0.3), 1, &settings),
        Err(QuoteError::DegenerateTerm { term: 1 })
    );
    assert_eq!(
        compute(dec!(5000), dec!(0.3), 0, &settings),
        Err(QuoteError::DegenerateTerm { term: 0 })
    );
}

#[test]
fn twelve_periods_need_thirty_five_percent_down() {
    let settings = LeaseSettings::default();
    assert_eq!(settings.allowed_terms(dec!(0.2)), vec![6, 10]);
    assert_eq!(
        compute(dec!(5000), dec!(0.2), 12, &settings),
        Err(QuoteError::InvalidInput(InvalidInput::TermNotAllowed {
            ratio: dec!(0.2),
            term: 12,
            min_ratio: dec!(0.35),
        }))
    );

    let at_threshold = compute(dec!(5000), dec!(0.35), 12, &settings).expect("allowed");
    assert_eq!(at_threshold.effective_rate, dec!(146.8));
}

#[test]
fn totals_reconcile_for_every_offered_combination() {
    let settings = LeaseSettings::default();
    let prices = [dec!(999.99), dec!(1000), dec!(4849.99), dec!(8700), dec!(25000.5)];

    for price in prices {
        for ratio in DEFAULT_RATIOS {
            for term in settings.allowed_terms(ratio) {
                let quote = compute(price, ratio, term, &settings).expect("quote computes");

                assert_eq!(quote.down_payment + quote.unpaid_balance, price);
                assert_eq!(
                    quote.total_payable,
                    quote.down_payment + quote.financed_rent + quote.service_cost
                );

                let billed: Decimal = quote.schedule().map(|installment| installment.amount).sum();
                assert_close(quote.down_payment + billed, quote.total_payable);
                assert_eq!(quote.schedule().len() as u32, term - 1);
            }
        }
    }
}

#[test]
fn missing_rate_cell_falls_back_to_base_rate() {
    let mut settings = LeaseSettings::default();
    settings.clear_rate(dec!(0.3), 10);

    let quote = compute(dec!(5000), dec!(0.3), 10, &settings).expect("quote computes");
    assert_eq!(quote.effective_rate, dec!(101.286));
    assert_eq!(quote.financed_rent, dec!(3545.01));
}

#[test]
fn explicit_zero_rate_is_applied() {
    let mut settings = LeaseSettings::default();
    settings.set_rate(dec!(0.3), 10, Decimal::ZERO);

    let quote = compute(dec!(5000), dec!(0.3), 10, &settings).expect("quote computes");
    assert_eq!(quote.effective_rate, dec!(100));
    assert_eq!(quote.financed_rent, dec!(3500));
}

#[test]
fn interval_edges_pick_the_lower_floor() {
    let settings = LeaseSettings::default();
    let floor = |price| {
        compute(price, dec!(0.3), 10, &settings)
            .expect("quote computes")
            .service_cost_floor
    };

    assert_eq!(floor(dec!(1000)), 1000);
    assert_eq!(floor(dec!(1349.99)), 1000);
    assert_eq!(floor(dec!(1350)), 1350);
    assert_eq!(floor(dec!(8699.99)), 8350);
    assert_eq!(floor(dec!(8700)), 8700);
    assert_eq!(floor(dec!(1000000)), 8700);
}

#[test]
fn prices_under_first_floor_follow_policy() {
    let mut settings = LeaseSettings::default();
    let clamped = compute(dec!(500), dec!(0.3), 10, &settings).expect("clamped");
    assert_eq!(clamped.service_cost_floor, 1000);
    assert_eq!(clamped.service_cost, dec!(320));

    settings.set_below_floor_policy(BelowFloorPolicy::Reject);
    assert_eq!(
        compute(dec!(500), dec!(0.3), 10, &settings),
        Err(QuoteError::ConfigurationGap {
            price: dec!(500),
            lowest_floor: 1000,
        })
    );
}

#[test]
fn invalid_inputs_are_rejected_before_pricing() {
    let settings = LeaseSettings::default();

    assert_eq!(
        compute(Decimal::ZERO, dec!(0.3), 10, &settings),
        Err(QuoteError::InvalidInput(InvalidInput::NonPositivePrice(Decimal::ZERO)))
    );
    assert_eq!(
        compute(dec!(-10), dec!(0.3), 10, &settings),
        Err(QuoteError::InvalidInput(InvalidInput::NonPositivePrice(dec!(-10))))
    );
    assert_eq!(
        compute(dec!(5000), dec!(0.25), 10, &settings),
        Err(QuoteError::InvalidInput(InvalidInput::UnknownRatio(dec!(0.25))))
    );
    assert_eq!(
        compute(dec!(5000), dec!(0.3), 9, &settings),
        Err(QuoteError::InvalidInput(InvalidInput::UnknownTerm(9)))
    );
}

#[test]
fn ratios_match_regardless_of_scale() {
    let settings = LeaseSettings::default();
    let quote = compute(dec!(5000), dec!(0.30), 10, &settings).expect("quote computes");
    assert_eq!(quote.effective_rate, dec!(137.3));
}

#[test]
fn shop_bounds_reject_out_of_range_prices() {
    let (service, _) = build_service();
    let err = service
        .quote(QuoteInput::new(dec!(1999), dec!(0.3), 10))
        .expect_err("below minimum");
    assert!(err.to_string().contains("below the minimum"));
}
