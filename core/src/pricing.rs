//! Order total computation.
//!
//! All amounts are integer minor units; every rate (fee percentages, tax) is in
//! basis points and rounds down.

use crate::catalog::{FeeKind, FeeRule, ServiceArea};
use crate::money::Money;
use crate::order::{OrderItem, OrderTotals};

/// Sum of line totals.
#[must_use]
pub fn subtotal(items: &[OrderItem]) -> Money {
    items.iter().map(OrderItem::total).sum()
}

/// Sum of the fee rules that apply to `subtotal`.
///
/// A rule applies when it is active and either has no threshold or the subtotal is
/// strictly below it.
#[must_use]
pub fn fees(rules: &[FeeRule], subtotal: Money) -> Money {
    rules
        .iter()
        .filter(|rule| rule.is_active)
        .filter(|rule| rule.applies_below.is_none_or(|limit| subtotal < limit))
        .map(|rule| match rule.kind {
            FeeKind::Fixed { amount } => amount,
            FeeKind::Percentage { basis_points } => subtotal.basis_points(basis_points),
        })
        .sum()
}

/// Delivery charge for an order whose discounted subtotal is `payable`.
#[must_use]
pub fn delivery_fee(area: &ServiceArea, payable: Money) -> Money {
    match area.free_delivery_above {
        Some(threshold) if payable >= threshold => Money::ZERO,
        _ => area.delivery_charge,
    }
}

/// Compute the immutable totals of an order.
///
/// `discount` comes from the coupon validator and is clamped to the subtotal again
/// here, so `subtotal - discount` is never negative.
#[must_use]
pub fn compute_totals(
    items: &[OrderItem],
    discount: Money,
    fee_rules: &[FeeRule],
    area: &ServiceArea,
    tax_rate_bps: u32,
) -> OrderTotals {
    let subtotal = subtotal(items);
    let discount = discount.max(Money::ZERO).min(subtotal);
    let payable = subtotal - discount;

    let fees = fees(fee_rules, subtotal);
    let tax = payable.basis_points(tax_rate_bps);
    let delivery_fee = delivery_fee(area, payable);

    OrderTotals {
        subtotal,
        discount,
        fees,
        tax,
        delivery_fee,
        total: payable + fees + tax + delivery_fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProductId, ServiceAreaId};
    use proptest::prelude::*;

    fn item(price_cents: i64, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(1),
            name: "Bananas".to_string(),
            quantity,
            unit_price: Money::from_cents(price_cents),
        }
    }

    fn area(free_above: Option<i64>) -> ServiceArea {
        ServiceArea {
            id: ServiceAreaId::new(1),
            name: "Central".to_string(),
            postal_codes: vec!["560001".to_string()],
            delivery_charge: Money::from_major(40),
            free_delivery_above: free_above.map(Money::from_major),
            is_active: true,
        }
    }

    fn small_cart_fee() -> FeeRule {
        FeeRule {
            name: "Small cart fee".to_string(),
            kind: FeeKind::Fixed {
                amount: Money::from_major(25),
            },
            applies_below: Some(Money::from_major(200)),
            is_active: true,
        }
    }

    fn handling_fee() -> FeeRule {
        FeeRule {
            name: "Handling".to_string(),
            kind: FeeKind::Percentage { basis_points: 200 },
            applies_below: None,
            is_active: true,
        }
    }

    #[test]
    fn small_cart_fee_only_below_threshold() {
        let rules = [small_cart_fee()];
        assert_eq!(fees(&rules, Money::from_major(150)), Money::from_major(25));
        assert_eq!(fees(&rules, Money::from_major(200)), Money::ZERO);
    }

    #[test]
    fn inactive_rules_are_ignored() {
        let rules = [FeeRule {
            is_active: false,
            ..handling_fee()
        }];
        assert_eq!(fees(&rules, Money::from_major(1000)), Money::ZERO);
    }

    #[test]
    fn free_delivery_uses_discounted_subtotal() {
        let area = area(Some(500));
        assert_eq!(delivery_fee(&area, Money::from_major(500)), Money::ZERO);
        assert_eq!(delivery_fee(&area, Money::from_major(499)), Money::from_major(40));
    }

    #[test]
    fn computes_full_breakdown() {
        // 2 x 300.00 = 600.00 subtotal, 50.00 off, 2% handling on 600 = 12.00,
        // 5% tax on 550 = 27.50, free delivery above 500.
        let totals = compute_totals(
            &[item(30_000, 2)],
            Money::from_major(50),
            &[small_cart_fee(), handling_fee()],
            &area(Some(500)),
            500,
        );

        assert_eq!(totals.subtotal, Money::from_major(600));
        assert_eq!(totals.discount, Money::from_major(50));
        assert_eq!(totals.fees, Money::from_major(12));
        assert_eq!(totals.tax, Money::from_cents(2_750));
        assert_eq!(totals.delivery_fee, Money::ZERO);
        assert_eq!(totals.total, Money::from_cents(58_950));
    }

    #[test]
    fn oversized_discount_is_clamped() {
        let totals = compute_totals(&[item(1_000, 1)], Money::from_major(50), &[], &area(None), 0);

        assert_eq!(totals.discount, Money::from_cents(1_000));
        assert_eq!(totals.total, Money::from_major(40));
    }

    proptest! {
        #[test]
        fn totals_add_up_and_stay_non_negative(
            price in 0i64..100_000,
            quantity in 1u32..50,
            discount in 0i64..10_000_000,
            tax in 0u32..3_000,
            free_above in proptest::option::of(0i64..5_000),
        ) {
            let totals = compute_totals(
                &[item(price, quantity)],
                Money::from_cents(discount),
                &[small_cart_fee(), handling_fee()],
                &area(free_above),
                tax,
            );

            prop_assert_eq!(
                totals.total,
                totals.subtotal - totals.discount + totals.fees + totals.tax + totals.delivery_fee
            );
            prop_assert!(totals.discount <= totals.subtotal);
            for part in [totals.subtotal, totals.discount, totals.fees, totals.tax, totals.delivery_fee] {
                prop_assert!(!part.is_negative());
            }
        }
    }
}
