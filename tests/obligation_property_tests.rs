//! Property-based tests for the obligation calculator and the adjustment policy
//!
//! The calculator is pure, so every property here is checked against randomly
//! drawn emissions with up to four decimal places.

use compliance_obligations::{
    obligation::{self, Classification},
    policy::{self, Action, InvoiceState},
    types::{Money, Tonnes},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Tonnes between 0 and 1,000,000 with four decimals
fn tonnes_strategy() -> impl Strategy<Value = Tonnes> {
    (0i64..=10_000_000_000).prop_map(|raw| Tonnes::new(Decimal::new(raw, 4)))
}

fn rate_strategy() -> impl Strategy<Value = Money> {
    (0i64..=200_00).prop_map(|cents| Money::new(Decimal::new(cents, 2)))
}

fn invoice_state_strategy() -> impl Strategy<Value = InvoiceState> {
    prop_oneof![
        Just(InvoiceState::None),
        (1u64..1000).prop_map(|invoice_number| InvoiceState::Issued { invoice_number }),
        (1u64..1000).prop_map(|invoice_number| InvoiceState::Void { invoice_number }),
    ]
}

proptest! {
    /// Property: the calculator is deterministic
    #[test]
    fn prop_compute_is_deterministic(a in tonnes_strategy(), l in tonnes_strategy(), r in rate_strategy()) {
        prop_assert_eq!(obligation::compute(a, l, r).unwrap(), obligation::compute(a, l, r).unwrap());
    }

    /// Property: exactly one classification fits the sign of the excess, and only
    /// obligations carry an amount
    #[test]
    fn prop_classification_partitions(a in tonnes_strategy(), l in tonnes_strategy(), r in rate_strategy()) {
        let result = obligation::compute(a, l, r).unwrap();
        prop_assert_eq!(result.excess_emissions, a - l);

        match result.classification {
            Classification::Obligation => {
                prop_assert!(result.excess_emissions.is_positive());
                prop_assert_eq!(result.credited_emissions, Tonnes::ZERO);
                prop_assert!(!result.obligation_amount.is_negative());
            }
            Classification::EarnedCredits => {
                prop_assert!(result.excess_emissions.is_negative());
                prop_assert_eq!(result.credited_emissions, -result.excess_emissions);
                prop_assert_eq!(result.obligation_amount, Money::ZERO);
            }
            Classification::NoObligationOrCredits => {
                prop_assert!(result.excess_emissions.is_zero());
                prop_assert_eq!(result.obligation_amount, Money::ZERO);
            }
        }
    }

    /// Property: amounts are whole cents within half a cent of the exact product
    #[test]
    fn prop_amount_is_rounded_to_cents(a in tonnes_strategy(), l in tonnes_strategy(), r in rate_strategy()) {
        let result = obligation::compute(a, l, r).unwrap();
        let amount = result.obligation_amount.as_decimal();
        prop_assert!(amount.scale() <= 2);

        if result.classification == Classification::Obligation {
            let exact = result.excess_emissions.as_decimal() * r.as_decimal();
            prop_assert!((exact - amount).abs() <= Decimal::new(5, 3));
        }
    }

    /// Property: the policy picks exactly one action and it matches the rules
    #[test]
    fn prop_policy_follows_rules(
        prior in rate_strategy(),
        incoming in rate_strategy(),
        state in invoice_state_strategy(),
        has_prior in any::<bool>(),
    ) {
        let to_obligation = |m: Money| obligation::compute(
            Tonnes::new(Decimal::from(1000) + m.as_decimal()),
            Tonnes::from(1000),
            Money::from(1),
        ).unwrap();
        let prior_obligation = to_obligation(prior);
        let incoming_obligation = to_obligation(incoming);
        let prior_ref = has_prior.then_some(&prior_obligation);

        let action = policy::decide(prior_ref, &incoming_obligation, state);
        let prior_amount = prior_ref.map(|p| p.obligation_amount).unwrap_or(Money::ZERO);
        let new_amount = incoming_obligation.obligation_amount;

        let expected = match state {
            InvoiceState::None | InvoiceState::Void { .. } => {
                if new_amount.is_positive() { Action::IssueNew } else { Action::NoOp }
            }
            InvoiceState::Issued { .. } => {
                if new_amount < prior_amount {
                    Action::AdjustExistingInvoice { delta: new_amount - prior_amount }
                } else if new_amount > prior_amount {
                    Action::VoidAndReissue
                } else {
                    Action::NoOp
                }
            }
        };
        prop_assert_eq!(action, expected);
    }
}
