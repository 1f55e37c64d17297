//! Invoice financial state derived from the payment sum.

use rust_decimal::Decimal;

use crate::entities::invoice::InvoiceStatus;

/// Rounds a monetary amount to two decimal places, keeping the scale at 2.
pub fn money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded
}

/// Status an invoice should hold after its payments change.
///
/// Rules apply in order:
/// 1. `total_paid >= total` is `Paid` (so a zero total is always paid).
/// 2. any positive payment is `PartiallyPaid`.
/// 3. with nothing paid a draft stays a draft, everything else becomes `Sent`.
///
/// Never yields `Overdue`.
pub fn derive_status(total: Decimal, total_paid: Decimal, current: InvoiceStatus) -> InvoiceStatus {
    if total_paid >= total {
        InvoiceStatus::Paid
    } else if total_paid > Decimal::ZERO {
        InvoiceStatus::PartiallyPaid
    } else if current == InvoiceStatus::Draft {
        InvoiceStatus::Draft
    } else {
        InvoiceStatus::Sent
    }
}

/// Outstanding balance, floored at zero.
pub fn remaining_amount(total: Decimal, total_paid: Decimal) -> Decimal {
    money((total - total_paid).max(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn any_status() -> impl Strategy<Value = InvoiceStatus> {
        prop_oneof![
            Just(InvoiceStatus::Draft),
            Just(InvoiceStatus::Sent),
            Just(InvoiceStatus::Paid),
            Just(InvoiceStatus::PartiallyPaid),
            Just(InvoiceStatus::Overdue),
        ]
    }

    // Cents up to 10 million, as two-decimal amounts.
    fn amount() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #[test]
        fn fully_covered_is_paid(total in amount(), extra in amount(), current in any_status()) {
            prop_assert_eq!(derive_status(total, total + extra, current), InvoiceStatus::Paid);
        }

        #[test]
        fn partial_cover_is_partially_paid(
            total in 2i64..1_000_000_000,
            current in any_status(),
            seed in any::<u64>(),
        ) {
            let paid_cents = 1 + (seed % (total as u64 - 1)) as i64;
            let status = derive_status(Decimal::new(total, 2), Decimal::new(paid_cents, 2), current);
            prop_assert_eq!(status, InvoiceStatus::PartiallyPaid);
        }

        #[test]
        fn nothing_paid_keeps_draft_otherwise_sent(total in 1i64..1_000_000_000, current in any_status()) {
            let status = derive_status(Decimal::new(total, 2), Decimal::ZERO, current);
            if current == InvoiceStatus::Draft {
                prop_assert_eq!(status, InvoiceStatus::Draft);
            } else {
                prop_assert_eq!(status, InvoiceStatus::Sent);
            }
        }

        #[test]
        fn never_derives_overdue(total in amount(), paid in amount(), current in any_status()) {
            prop_assert_ne!(derive_status(total, paid, current), InvoiceStatus::Overdue);
        }

        #[test]
        fn remaining_is_never_negative(total in amount(), paid in amount()) {
            let remaining = remaining_amount(total, paid);
            prop_assert!(remaining >= Decimal::ZERO);
            prop_assert_eq!(remaining, money((total - paid).max(Decimal::ZERO)));
        }
    }

    #[rstest]
    #[case::partial(dec!(1000.00), dec!(400.00), InvoiceStatus::Sent, InvoiceStatus::PartiallyPaid, dec!(600.00))]
    #[case::exact(dec!(1000.00), dec!(1000.00), InvoiceStatus::Sent, InvoiceStatus::Paid, dec!(0.00))]
    #[case::overpaid(dec!(1000.00), dec!(1200.00), InvoiceStatus::Sent, InvoiceStatus::Paid, dec!(0.00))]
    #[case::untouched_draft(dec!(1000.00), dec!(0), InvoiceStatus::Draft, InvoiceStatus::Draft, dec!(1000.00))]
    #[case::sole_payment_removed(dec!(1000.00), dec!(0), InvoiceStatus::Paid, InvoiceStatus::Sent, dec!(1000.00))]
    #[case::zero_total(dec!(0), dec!(0), InvoiceStatus::Draft, InvoiceStatus::Paid, dec!(0.00))]
    fn payment_scenarios(
        #[case] total: Decimal,
        #[case] paid: Decimal,
        #[case] current: InvoiceStatus,
        #[case] expected: InvoiceStatus,
        #[case] remaining: Decimal,
    ) {
        assert_eq!(derive_status(total, paid, current), expected);
        assert_eq!(remaining_amount(total, paid), remaining);
    }

    #[test]
    fn money_keeps_two_decimal_scale() {
        assert_eq!(money(dec!(12)).to_string(), "12.00");
        assert_eq!(money(dec!(12.345)).to_string(), "12.34");
        assert_eq!(money(dec!(0.5)).to_string(), "0.50");
    }
}
