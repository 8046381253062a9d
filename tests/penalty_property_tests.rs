//! Property-based tests for penalty and interest accrual
//!
//! Accrual is a pure projection over a balance history, so asking twice for the
//! same day must give the same answer and nothing accrues up to the due date.

use chrono::Days;
use compliance_obligations::{
    penalty::{self, BalanceEvent, PenaltyStatus},
    types::{Date, Money},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn day(offset: u64) -> Date {
    Date::from(Date::new(2025, 1, 1).to_naive() + Days::new(offset))
}

/// Up to ten balance changes over four years, in cents up to $100,000
fn history_strategy() -> impl Strategy<Value = Vec<BalanceEvent>> {
    prop::collection::vec((0u64..1_460, 0i64..=10_000_000), 0..=10).prop_map(|mut raw| {
        raw.sort_by_key(|(offset, _)| *offset);
        raw.dedup_by_key(|(offset, _)| *offset);
        raw.into_iter()
            .map(|(offset, cents)| BalanceEvent {
                date: day(offset),
                balance: Money::new(Decimal::new(cents, 2)),
            })
            .collect()
    })
}

/// Daily rates from 0 to 1%
fn daily_rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=100).prop_map(|raw| Decimal::new(raw, 4))
}

proptest! {
    /// Property: accruing twice for the same day gives the same projection, and
    /// nothing is owed up to and including the due date
    #[test]
    fn prop_overdue_accrual_is_idempotent(
        history in history_strategy(),
        due in 0u64..1_460,
        as_of in 0u64..1_460,
        rate in daily_rate_strategy(),
        paid_cents in 0i64..=1_000_000,
    ) {
        let (due, as_of) = (day(due), day(as_of));
        let paid = Money::new(Decimal::new(paid_cents, 2));

        let first = penalty::accrue_overdue(due, as_of, &history, rate, paid).unwrap();
        let second = penalty::accrue_overdue(due, as_of, &history, rate, paid).unwrap();
        prop_assert_eq!(&first, &second);

        if as_of <= due {
            prop_assert_eq!(first.status, PenaltyStatus::NotApplicable);
            prop_assert_eq!(first.amount, Money::ZERO);
            prop_assert_eq!(first.days, 0);
        } else {
            prop_assert!(first.days <= due.days_until(as_of));
            prop_assert!(!first.amount.is_negative());
        }
    }

    /// Property: late-submission interest is idempotent and only charged for
    /// reports submitted after the deadline
    #[test]
    fn prop_late_interest_is_idempotent(
        deadline in 0u64..1_460,
        submitted in 0u64..1_460,
        obligation_cents in 0i64..=1_000_000_000,
        rate_bps in 0i64..=2_000,
    ) {
        let (deadline, submitted) = (day(deadline), day(submitted));
        let obligation = Money::new(Decimal::new(obligation_cents, 2));
        let rate = Decimal::new(rate_bps, 4);

        let first = penalty::accrue_late_submission(deadline, submitted, obligation, rate, Money::ZERO).unwrap();
        let second = penalty::accrue_late_submission(deadline, submitted, obligation, rate, Money::ZERO).unwrap();
        prop_assert_eq!(&first, &second);

        if submitted <= deadline {
            prop_assert_eq!(first.status, PenaltyStatus::NotApplicable);
            prop_assert_eq!(first.amount, Money::ZERO);
        } else if first.amount.is_positive() {
            prop_assert_eq!(first.days, deadline.days_until(submitted));
            prop_assert_eq!(first.status, PenaltyStatus::NotPaid);
        }
    }
}
