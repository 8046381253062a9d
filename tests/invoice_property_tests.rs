//! Property-based tests for invoice balances and invoice numbering
//!
//! Balances are derived from line items and payments on every read, so any mix of
//! accepted operations must keep them consistent. Numbering is checked against a
//! real sled store since the counter lives there.

use compliance_obligations::{
    clock::FixedClock,
    config::EngineConfig,
    invoice::{Invoice, LineItem, PaymentMethod, VersionRef},
    obligation::EmissionsInput,
    policy::Action,
    service::ComplianceService,
    types::{Date, Money, TimeStamp, Tonnes},
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use tempfile::tempdir;

fn cents(raw: i64) -> Money {
    Money::new(Decimal::new(raw, 2))
}

fn invoice(fee: Money) -> Invoice {
    let now = TimeStamp::new_with(2025, 5, 1, 0, 0, 0);
    Invoice::issue(
        "invoice_prop".to_string(),
        1,
        VersionRef {
            version_id: "version_prop".to_string(),
            operation_id: "operation_prop".to_string(),
            period: 2024,
        },
        Date::new(2025, 11, 30),
        vec![LineItem::fee(fee, "Compliance obligation", now.clone())],
        now,
    )
}

#[derive(Debug, Clone)]
enum Op {
    Pay(i64),
    Adjust(i64),
    Void,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-1_000_00i64..=5_000_00).prop_map(Op::Pay),
        3 => (-5_000_00i64..=1_000_00).prop_map(Op::Adjust),
        1 => Just(Op::Void),
    ]
}

proptest! {
    /// Property: outstanding balance never goes negative and always matches the
    /// line items and payments on record
    #[test]
    fn prop_balance_never_negative(
        fee in 1i64..=10_000_00,
        ops in prop::collection::vec(op_strategy(), 0..=20),
    ) {
        let mut inv = invoice(cents(fee));

        for (i, op) in ops.iter().enumerate() {
            let _ = match op {
                Op::Pay(raw) => inv
                    .record_payment(format!("payment_{i}"), cents(*raw), Date::new(2025, 6, 1), PaymentMethod::Eft)
                    .map(|_| ()),
                Op::Adjust(raw) => inv
                    .apply_adjustment(cents(*raw), "adjustment", TimeStamp::new())
                    .map(|_| ()),
                Op::Void => inv.void(TimeStamp::new()),
            };

            prop_assert!(!inv.outstanding_balance().is_negative());
            prop_assert!(!inv.credit_balance().is_negative());
            prop_assert!(inv.outstanding_balance().is_zero() || inv.credit_balance().is_zero());
            prop_assert_eq!(
                inv.outstanding_balance() - inv.credit_balance(),
                inv.total_fees() + inv.total_adjustments() - inv.total_paid()
            );
        }
    }

    /// Property: once void, nothing about the invoice changes
    #[test]
    fn prop_void_is_immutable(
        fee in 1i64..=10_000_00,
        ops in prop::collection::vec(op_strategy(), 1..=10),
    ) {
        let mut inv = invoice(cents(fee));
        inv.void(TimeStamp::new()).unwrap();
        let frozen = inv.clone();

        for (i, op) in ops.iter().enumerate() {
            let result = match op {
                Op::Pay(raw) => inv
                    .record_payment(format!("payment_{i}"), cents(*raw), Date::new(2025, 6, 1), PaymentMethod::Eft)
                    .map(|_| ()),
                Op::Adjust(raw) => inv
                    .apply_adjustment(cents(*raw), "adjustment", TimeStamp::new())
                    .map(|_| ()),
                Op::Void => inv.void(TimeStamp::new()),
            };
            prop_assert!(result.is_err());
        }
        prop_assert_eq!(&inv, &frozen);
        prop_assert_eq!(inv.display_balance(), Money::ZERO);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: invoice numbers are strictly increasing and never reused, however
    /// submissions are spread across operations
    #[test]
    fn prop_invoice_numbers_strictly_increase(
        submissions in prop::collection::vec((0usize..3, 1_001i64..=1_500), 1..=8),
    ) {
        let temp_dir = tempdir().unwrap();
        let db = Arc::new(sled::open(temp_dir.path().join("numbers.db")).unwrap());
        let clock = Arc::new(FixedClock::new(TimeStamp::new_with(2025, 5, 1, 0, 0, 0)));
        let service = ComplianceService::with_clock(db, EngineConfig::default(), clock);

        let mut numbers: Vec<u64> = vec![];
        for (op, attributable) in submissions {
            let input = EmissionsInput::new(Tonnes::from(attributable), Tonnes::from(1000));
            let (_, outcome) = service.submit_version(&format!("operation_{op}"), 2024, input).unwrap();
            if matches!(outcome.action_taken, Action::IssueNew | Action::VoidAndReissue) {
                numbers.push(outcome.invoice.unwrap().invoice_number);
            }
        }

        for pair in numbers.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        let expected: Vec<u64> = (1..=numbers.len() as u64).collect();
        prop_assert_eq!(numbers, expected);
    }
}
