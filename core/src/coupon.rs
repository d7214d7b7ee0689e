//! Coupon rules and the pure coupon validator.
//!
//! Validation is a function of `(code, coupon rules, subtotal, now)` only. The caller
//! looks the coupon up (see [`Catalog::coupon_by_code`](crate::catalog::Catalog::coupon_by_code))
//! and hands the result in, so the validator never performs I/O and the same inputs
//! always give the same answer.

use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a coupon computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountKind {
    /// A flat amount off the subtotal
    Fixed {
        /// Amount off
        amount: Money,
    },
    /// A share of the subtotal
    Percentage {
        /// Rate in basis points (1000 = 10%)
        basis_points: u32,
    },
}

/// A promotional coupon. Read-only at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Coupon code, stored upper-case
    pub code: String,
    /// Discount computation
    pub kind: DiscountKind,
    /// Minimum subtotal required to use the coupon
    pub min_order_value: Money,
    /// Cap on the discount (meaningful for percentage coupons)
    pub max_discount_value: Option<Money>,
    /// Start of the validity window (inclusive)
    pub starts_at: DateTime<Utc>,
    /// End of the validity window (inclusive)
    pub ends_at: DateTime<Utc>,
    /// Inactive coupons are rejected
    pub is_active: bool,
}

/// A coupon that passed validation, with the discount it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    /// Normalized code
    pub code: String,
    /// Discount, never above the subtotal or the coupon's cap
    pub discount: Money,
}

/// Why a coupon was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    /// No coupon with this code exists
    #[error("coupon {code} does not exist")]
    NotFound {
        /// Code that was looked up
        code: String,
    },
    /// The coupon has been switched off
    #[error("coupon {code} is not active")]
    Inactive {
        /// Coupon code
        code: String,
    },
    /// The validity window has not started
    #[error("coupon {code} is not valid before {starts_at}")]
    NotYetValid {
        /// Coupon code
        code: String,
        /// Window start
        starts_at: DateTime<Utc>,
    },
    /// The validity window is over
    #[error("coupon {code} expired at {ends_at}")]
    Expired {
        /// Coupon code
        code: String,
        /// Window end
        ends_at: DateTime<Utc>,
    },
    /// The cart subtotal is below the coupon's minimum
    #[error("coupon {code} requires a subtotal of at least {required}")]
    BelowMinimum {
        /// Coupon code
        code: String,
        /// Minimum subtotal
        required: Money,
    },
}

/// Normalize a customer-entered code: trimmed, upper-case.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Stateless coupon validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CouponValidator;

impl CouponValidator {
    /// Creates a new `CouponValidator`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validate `code` against the looked-up coupon, the cart subtotal and the time.
    ///
    /// Checks, in order: the coupon exists (and its code matches), it is active,
    /// `now` lies within `[starts_at, ends_at]`, and `subtotal >= min_order_value`.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRejection`] that applies.
    pub fn validate(
        &self,
        code: &str,
        coupon: Option<&Coupon>,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<AppliedCoupon, CouponRejection> {
        let code = normalize_code(code);

        let Some(coupon) = coupon.filter(|c| normalize_code(&c.code) == code) else {
            return Err(CouponRejection::NotFound { code });
        };

        if !coupon.is_active {
            return Err(CouponRejection::Inactive { code });
        }

        if now < coupon.starts_at {
            return Err(CouponRejection::NotYetValid {
                code,
                starts_at: coupon.starts_at,
            });
        }

        if now > coupon.ends_at {
            return Err(CouponRejection::Expired {
                code,
                ends_at: coupon.ends_at,
            });
        }

        if subtotal < coupon.min_order_value {
            return Err(CouponRejection::BelowMinimum {
                code,
                required: coupon.min_order_value,
            });
        }

        Ok(AppliedCoupon {
            code,
            discount: Self::discount(coupon, subtotal),
        })
    }

    /// Discount granted by `coupon` on `subtotal`, ignoring eligibility.
    ///
    /// Percentage discounts are capped at `max_discount_value`; every discount is
    /// clamped to `[0, subtotal]`.
    #[must_use]
    pub fn discount(coupon: &Coupon, subtotal: Money) -> Money {
        let raw = match coupon.kind {
            DiscountKind::Fixed { amount } => amount,
            DiscountKind::Percentage { basis_points } => subtotal.basis_points(basis_points),
        };

        let capped = coupon
            .max_discount_value
            .map_or(raw, |cap| raw.min(cap));

        capped.max(Money::ZERO).min(subtotal.max(Money::ZERO))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap()
    }

    fn save10() -> Coupon {
        Coupon {
            code: "SAVE10".to_string(),
            kind: DiscountKind::Percentage { basis_points: 1000 },
            min_order_value: Money::from_major(100),
            max_discount_value: Some(Money::from_major(50)),
            starts_at: at(1),
            ends_at: at(31),
            is_active: true,
        }
    }

    #[test]
    fn percentage_discount_is_capped() {
        let applied = CouponValidator::new()
            .validate("SAVE10", Some(&save10()), Money::from_major(1000), at(15))
            .unwrap();

        assert_eq!(applied.discount, Money::from_major(50));
    }

    #[test]
    fn percentage_discount_below_cap() {
        let applied = CouponValidator::new()
            .validate("SAVE10", Some(&save10()), Money::from_major(200), at(15))
            .unwrap();

        assert_eq!(applied.discount, Money::from_major(20));
    }

    #[test]
    fn code_is_case_insensitive() {
        let applied = CouponValidator::new()
            .validate("  save10 ", Some(&save10()), Money::from_major(200), at(15))
            .unwrap();

        assert_eq!(applied.code, "SAVE10");
    }

    #[test]
    fn fixed_discount_is_clamped_to_subtotal() {
        let coupon = Coupon {
            kind: DiscountKind::Fixed {
                amount: Money::from_major(500),
            },
            min_order_value: Money::ZERO,
            max_discount_value: None,
            ..save10()
        };

        let applied = CouponValidator::new()
            .validate("SAVE10", Some(&coupon), Money::from_major(120), at(15))
            .unwrap();

        assert_eq!(applied.discount, Money::from_major(120));
    }

    #[test]
    fn rejects_missing_coupon() {
        let err = CouponValidator::new()
            .validate("NOPE", None, Money::from_major(1000), at(15))
            .unwrap_err();

        assert_eq!(err, CouponRejection::NotFound { code: "NOPE".into() });
    }

    #[test]
    fn rejects_mismatched_lookup() {
        let err = CouponValidator::new()
            .validate("OTHER", Some(&save10()), Money::from_major(1000), at(15))
            .unwrap_err();

        assert!(matches!(err, CouponRejection::NotFound { .. }));
    }

    #[test]
    fn rejects_inactive_coupon() {
        let coupon = Coupon {
            is_active: false,
            ..save10()
        };

        let err = CouponValidator::new()
            .validate("SAVE10", Some(&coupon), Money::from_major(1000), at(15))
            .unwrap_err();

        assert!(matches!(err, CouponRejection::Inactive { .. }));
    }

    #[test]
    fn validity_window_is_inclusive() {
        let validator = CouponValidator::new();
        let coupon = save10();

        assert!(validator
            .validate("SAVE10", Some(&coupon), Money::from_major(1000), coupon.starts_at)
            .is_ok());
        assert!(validator
            .validate("SAVE10", Some(&coupon), Money::from_major(1000), coupon.ends_at)
            .is_ok());
    }

    #[test]
    fn rejects_outside_window() {
        let validator = CouponValidator::new();
        let coupon = Coupon {
            starts_at: at(10),
            ends_at: at(20),
            ..save10()
        };

        let early = validator
            .validate("SAVE10", Some(&coupon), Money::from_major(1000), at(9))
            .unwrap_err();
        let late = validator
            .validate("SAVE10", Some(&coupon), Money::from_major(1000), at(21))
            .unwrap_err();

        assert!(matches!(early, CouponRejection::NotYetValid { .. }));
        assert!(matches!(late, CouponRejection::Expired { .. }));
    }

    #[test]
    fn rejects_subtotal_below_minimum() {
        let err = CouponValidator::new()
            .validate("SAVE10", Some(&save10()), Money::from_cents(9_999), at(15))
            .unwrap_err();

        assert_eq!(
            err,
            CouponRejection::BelowMinimum {
                code: "SAVE10".into(),
                required: Money::from_major(100),
            }
        );
    }

    fn arb_coupon() -> impl Strategy<Value = Coupon> {
        (
            prop_oneof![
                (0i64..1_000_000).prop_map(|c| DiscountKind::Fixed {
                    amount: Money::from_cents(c)
                }),
                (0u32..=10_000).prop_map(|bps| DiscountKind::Percentage { basis_points: bps }),
            ],
            proptest::option::of(0i64..500_000),
        )
            .prop_map(|(kind, cap)| Coupon {
                kind,
                max_discount_value: cap.map(Money::from_cents),
                min_order_value: Money::ZERO,
                ..save10()
            })
    }

    proptest! {
        #[test]
        fn discount_never_exceeds_subtotal_or_cap(
            coupon in arb_coupon(),
            subtotal in 0i64..10_000_000,
        ) {
            let subtotal = Money::from_cents(subtotal);
            let applied = CouponValidator::new()
                .validate("SAVE10", Some(&coupon), subtotal, at(15))
                .unwrap();

            prop_assert!(applied.discount <= subtotal);
            prop_assert!(!applied.discount.is_negative());
            if let Some(cap) = coupon.max_discount_value {
                prop_assert!(applied.discount <= cap);
            }
        }

        #[test]
        fn validation_is_deterministic(
            coupon in arb_coupon(),
            subtotal in 0i64..10_000_000,
            day in 1u32..=28,
        ) {
            let validator = CouponValidator::new();
            let subtotal = Money::from_cents(subtotal);
            let first = validator.validate("save10", Some(&coupon), subtotal, at(day));
            let second = validator.validate("save10", Some(&coupon), subtotal, at(day));
            prop_assert_eq!(first, second);
        }
    }
}
