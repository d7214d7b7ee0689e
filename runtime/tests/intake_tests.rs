//! Order intake tests against the in-memory storefront.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::Duration;
use futures::future::join_all;
use storefront_core::Money;
use storefront_core::anomaly::AnomalyKind;
use storefront_core::coupon::CouponRejection;
use storefront_core::order::{OrderStatus, PaymentStatus};
use storefront_core::schedule::SlotRejection;
use storefront_core::types::{OrderId, ServiceAreaId, SlotId, UserId};
use storefront_runtime::{IntakeError, SlotQuery, ValidationError};
use storefront_testing::TestCheckout;
use storefront_testing::fixtures::{
    BREAD, CENTRAL, CLOSED_ADDRESS, CLOSED_AREA, CLOSED_SLOT, CUSTOMER, DISCONTINUED, EVENING,
    FARAWAY, HOME, MILK, MORNING, NEIGHBOUR, NO_CAPACITY, OTHER_CUSTOMER, RETIRED, RICE, line,
    place_request, today, tomorrow,
};

fn customer() -> UserId {
    UserId::new(CUSTOMER)
}

// ============================================================================
// Placement
// ============================================================================

#[tokio::test]
async fn places_order_with_catalog_prices_and_fees() {
    let checkout = TestCheckout::new();

    let order = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();

    // 2 x 65.00 + 40.00 = 170.00, small-cart fee 25.00, delivery 40.00
    assert_eq!(order.totals.subtotal, Money::from_major(170));
    assert_eq!(order.totals.discount, Money::ZERO);
    assert_eq!(order.totals.fees, Money::from_major(25));
    assert_eq!(order.totals.tax, Money::ZERO);
    assert_eq!(order.totals.delivery_fee, Money::from_major(40));
    assert_eq!(order.totals.total, Money::from_major(235));

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.service_area_id, CENTRAL);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].name, "Milk 1L");

    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);
    assert_eq!(checkout.orders.all(), vec![order]);
}

#[tokio::test]
async fn save10_is_capped_at_fifty() {
    let checkout = TestCheckout::new();
    let mut request = place_request(EVENING, tomorrow());
    request.items = vec![line(RICE, 2)];
    request.coupon_code = Some(" save10 ".to_string());

    let order = checkout.service.place_order(request).await.unwrap();

    // 1100.00 subtotal, 10% would be 110.00, capped at 50.00. Free delivery, no fee.
    assert_eq!(order.totals.subtotal, Money::from_major(1100));
    assert_eq!(order.totals.discount, Money::from_major(50));
    assert_eq!(order.totals.fees, Money::ZERO);
    assert_eq!(order.totals.delivery_fee, Money::ZERO);
    assert_eq!(order.totals.total, Money::from_major(1050));
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
}

#[tokio::test]
async fn tax_applies_to_discounted_subtotal() {
    let mut config = storefront_testing::fixtures::test_config();
    config.tax_rate_bps = 500;
    let checkout = TestCheckout::with_config(config);

    let mut request = place_request(EVENING, tomorrow());
    request.items = vec![line(RICE, 1)];
    request.coupon_code = Some("SAVE10".to_string());

    let order = checkout.service.place_order(request).await.unwrap();

    // 550.00 - 50.00 = 500.00, 5% tax = 25.00, free delivery at 500.00
    assert_eq!(order.totals.tax, Money::from_major(25));
    assert_eq!(order.totals.delivery_fee, Money::ZERO);
    assert_eq!(order.totals.total, Money::from_major(525));
}

#[tokio::test]
async fn three_concurrent_checkouts_for_two_places() {
    let checkout = TestCheckout::new();

    let results = join_all((0..3).map(|_| {
        let service = checkout.service.clone();
        async move { service.place_order(place_request(MORNING, tomorrow())).await }
    }))
    .await;

    let placed = results.iter().filter(|r| r.is_ok()).count();
    let full: Vec<_> = results
        .iter()
        .filter(|r| matches!(r, Err(IntakeError::CapacityExceeded { .. })))
        .collect();

    assert_eq!(placed, 2);
    assert_eq!(full.len(), 1);
    assert_eq!(checkout.orders.len(), 2);
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_never_overbook() {
    let checkout = TestCheckout::new();

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let service = checkout.service.clone();
            tokio::spawn(async move { service.place_order(place_request(EVENING, tomorrow())).await })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(err) => assert_eq!(err.code(), "SLOT_FULL"),
        }
    }

    assert_eq!(placed, 10);
    assert_eq!(checkout.ledger.count(EVENING, tomorrow()), 10);
}

#[tokio::test]
async fn zero_capacity_slot_rejects() {
    let checkout = TestCheckout::new();

    let err = checkout
        .service
        .place_order(place_request(NO_CAPACITY, tomorrow()))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        IntakeError::CapacityExceeded {
            slot_id: NO_CAPACITY,
            date: tomorrow(),
        }
    );
    assert!(checkout.orders.is_empty());
}

// ============================================================================
// Preconditions: nothing is reserved when they fail
// ============================================================================

#[tokio::test]
async fn cart_validation_errors() {
    let checkout = TestCheckout::new();
    let cases = [
        (vec![], ValidationError::EmptyCart),
        (
            vec![line(MILK, 0)],
            ValidationError::InvalidQuantity {
                product_id: MILK,
                quantity: 0,
                max: 50,
            },
        ),
        (
            vec![line(DISCONTINUED, 1)],
            ValidationError::ProductUnavailable(DISCONTINUED),
        ),
        (
            vec![line(RICE, 2), line(RICE, 2)],
            ValidationError::InsufficientStock {
                product_id: RICE,
                requested: 4,
                available: 3,
            },
        ),
    ];

    for (items, expected) in cases {
        let mut request = place_request(MORNING, tomorrow());
        request.items = items;

        let err = checkout.service.place_order(request).await.unwrap_err();
        assert_eq!(err, IntakeError::Validation(expected));
    }

    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 0);
}

#[tokio::test]
async fn address_must_be_owned_and_serviceable() {
    let checkout = TestCheckout::new();

    let mut foreign = place_request(MORNING, tomorrow());
    foreign.address_id = NEIGHBOUR;
    assert_eq!(
        checkout.service.place_order(foreign).await.unwrap_err(),
        IntakeError::AddressNotFound(NEIGHBOUR)
    );

    for address_id in [FARAWAY, CLOSED_ADDRESS] {
        let mut request = place_request(MORNING, tomorrow());
        request.address_id = address_id;
        assert_eq!(
            checkout.service.place_order(request).await.unwrap_err(),
            IntakeError::AddressUnserviceable { address_id }
        );
    }

    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 0);
}

#[tokio::test]
async fn slot_must_be_bookable() {
    let checkout = TestCheckout::new();
    let unknown = SlotId::new(404);
    let cases = [
        (MORNING, today() - Duration::days(1), SlotRejection::DateInPast {
            date: today() - Duration::days(1),
        }),
        (MORNING, today() + Duration::days(8), SlotRejection::BeyondHorizon {
            date: today() + Duration::days(8),
            last_bookable: today() + Duration::days(7),
        }),
        (RETIRED, tomorrow(), SlotRejection::Inactive),
        (CLOSED_SLOT, tomorrow(), SlotRejection::WrongServiceArea {
            service_area_id: CENTRAL,
        }),
        (unknown, tomorrow(), SlotRejection::NotFound),
    ];

    for (slot_id, date, reason) in cases {
        let err = checkout
            .service
            .place_order(place_request(slot_id, date))
            .await
            .unwrap_err();
        assert_eq!(err, IntakeError::SlotUnavailable { slot_id, reason });
        assert_eq!(err.code(), "SLOT_UNAVAILABLE");
    }

    assert!(checkout.orders.is_empty());
}

#[tokio::test]
async fn invalid_coupon_rejects_before_reserving() {
    let checkout = TestCheckout::new();
    let mut request = place_request(MORNING, tomorrow());
    request.coupon_code = Some("SPRING5".to_string());

    let err = checkout.service.place_order(request).await.unwrap_err();

    assert!(matches!(
        err,
        IntakeError::CouponInvalid(CouponRejection::Expired { .. })
    ));
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 0);
}

#[tokio::test]
async fn blank_coupon_code_is_ignored() {
    let checkout = TestCheckout::new();
    let mut request = place_request(MORNING, tomorrow());
    request.coupon_code = Some("   ".to_string());

    let order = checkout.service.place_order(request).await.unwrap();
    assert_eq!(order.coupon_code, None);
}

// ============================================================================
// Transient failures and compensation
// ============================================================================

#[tokio::test]
async fn transient_reserve_failures_are_retried() {
    let checkout = TestCheckout::new();
    checkout.ledger.fail_next_reserves(2);

    let order = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await;

    assert!(order.is_ok());
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);
}

#[tokio::test]
async fn persistent_contention_surfaces_as_transient() {
    let checkout = TestCheckout::new();
    checkout.ledger.fail_next_reserves(10);

    let err = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap_err();

    assert!(matches!(err, IntakeError::Transient(_)));
    assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 0);
    assert!(checkout.orders.is_empty());
}

#[tokio::test]
async fn failed_persist_releases_reservation_and_records_anomaly() {
    let checkout = TestCheckout::new();
    checkout.orders.fail_inserts(true);

    let err = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap_err();

    assert!(matches!(err, IntakeError::InvariantViolation { .. }));
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 0);
    assert!(checkout.orders.is_empty());

    let anomalies = checkout.anomalies.records();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind, AnomalyKind::OrderPersistFailed);
    assert!(anomalies[0].compensated);
    assert_eq!(anomalies[0].slot_id, MORNING);
    assert_eq!(anomalies[0].delivery_date, tomorrow());
}

#[tokio::test]
async fn failed_compensation_is_recorded_as_leak() {
    let checkout = TestCheckout::new();
    checkout.orders.fail_inserts(true);
    checkout.ledger.fail_next_releases(10);

    let err = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVARIANT_VIOLATION");
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);

    let anomalies = checkout.anomalies.records();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind, AnomalyKind::CompensationFailed);
    assert!(!anomalies[0].compensated);
}

#[tokio::test]
async fn anomaly_log_failure_does_not_change_outcome() {
    let checkout = TestCheckout::new();
    checkout.orders.fail_inserts(true);
    checkout.anomalies.fail_writes(true);

    let err = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap_err();

    assert!(matches!(err, IntakeError::InvariantViolation { .. }));
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 0);
}

#[tokio::test]
async fn lost_reserve_reply_is_not_retried() {
    let checkout = TestCheckout::new();
    checkout.ledger.lose_next_reserve_replies(1);

    let err = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap_err();

    assert!(matches!(err, IntakeError::Store(ref cause) if cause.is_indeterminate()));
    assert_eq!(err.code(), "STORE_ERROR");
    // The lost reservation was applied once and never repeated or released.
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);
    assert!(checkout.orders.is_empty());

    let anomalies = checkout.anomalies.records();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind, AnomalyKind::ReservationUnconfirmed);
    assert!(!anomalies[0].compensated);
    assert_eq!(anomalies[0].slot_id, MORNING);
}

#[tokio::test]
async fn lost_compensation_reply_releases_once() {
    let checkout = TestCheckout::new();
    checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();
    checkout.orders.fail_inserts(true);
    checkout.ledger.lose_next_release_replies(1);

    let err = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVARIANT_VIOLATION");
    // The first order still holds its unit.
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);

    let anomalies = checkout.anomalies.records();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind, AnomalyKind::CompensationFailed);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn cancelling_releases_exactly_one_booking() {
    let checkout = TestCheckout::new();
    let first = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();
    checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 2);

    let cancelled = checkout
        .service
        .cancel_order(first.id, &customer())
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.totals, first.totals);
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);

    let again = checkout
        .service
        .cancel_order(first.id, &customer())
        .await
        .unwrap_err();
    assert_eq!(
        again,
        IntakeError::InvalidTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Cancelled,
        }
    );
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);

    // The freed place can be booked again.
    assert!(
        checkout
            .service
            .place_order(place_request(MORNING, tomorrow()))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn concurrent_cancellations_release_once() {
    let checkout = TestCheckout::new();
    let order = checkout
        .service
        .place_order(place_request(EVENING, tomorrow()))
        .await
        .unwrap();

    let results = join_all((0..4).map(|_| {
        let service = checkout.service.clone();
        async move { service.cancel_order(order.id, &customer()).await }
    }))
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(checkout.ledger.count(EVENING, tomorrow()), 0);
}

#[tokio::test]
async fn customers_cannot_touch_other_orders() {
    let checkout = TestCheckout::new();
    let order = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();
    let stranger = UserId::new(OTHER_CUSTOMER);

    assert_eq!(
        checkout.service.get_order(order.id, &stranger).await.unwrap_err(),
        IntakeError::OrderNotFound(order.id)
    );
    assert_eq!(
        checkout.service.cancel_order(order.id, &stranger).await.unwrap_err(),
        IntakeError::OrderNotFound(order.id)
    );
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);
}

#[tokio::test]
async fn admin_moves_order_through_lifecycle() {
    let checkout = TestCheckout::new();
    let order = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ] {
        let updated = checkout.service.update_status(order.id, status).await.unwrap();
        assert_eq!(updated.status, status);
        assert_eq!(updated.totals, order.totals);
    }

    let err = checkout
        .service
        .update_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSITION");
    // Delivered orders keep their booking.
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);
}

#[tokio::test]
async fn admin_cancel_while_processing_releases_but_customer_cannot() {
    let checkout = TestCheckout::new();
    let order = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();
    checkout.service.update_status(order.id, OrderStatus::Confirmed).await.unwrap();
    checkout.service.update_status(order.id, OrderStatus::Processing).await.unwrap();

    let err = checkout
        .service
        .cancel_order(order.id, &customer())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        IntakeError::InvalidTransition {
            from: OrderStatus::Processing,
            to: OrderStatus::Cancelled,
        }
    );

    checkout
        .service
        .update_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 0);
}

#[tokio::test]
async fn admin_skipping_states_is_rejected() {
    let checkout = TestCheckout::new();
    let order = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();

    let err = checkout
        .service
        .update_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        IntakeError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        }
    );
    assert_eq!(
        checkout
            .service
            .update_status(OrderId::new(), OrderStatus::Confirmed)
            .await
            .unwrap_err()
            .code(),
        "ORDER_NOT_FOUND"
    );
}

#[tokio::test]
async fn failed_release_on_cancel_still_cancels_and_records_anomaly() {
    let checkout = TestCheckout::new();
    let order = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();
    checkout.ledger.fail_next_releases(10);

    let cancelled = checkout
        .service
        .cancel_order(order.id, &customer())
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let anomalies = checkout.anomalies.records();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind, AnomalyKind::ReleaseFailed);
    assert_eq!(anomalies[0].order_id, order.id);
}

#[tokio::test]
async fn lost_release_reply_on_cancel_does_not_overbook() {
    let checkout = TestCheckout::new();
    let first = checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();
    checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();
    checkout.ledger.lose_next_release_replies(1);

    let cancelled = checkout
        .service
        .cancel_order(first.id, &customer())
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);
    assert_eq!(checkout.anomalies.records()[0].kind, AnomalyKind::ReleaseFailed);

    // One place is free again, not two.
    let results = join_all((0..2).map(|_| {
        checkout
            .service
            .place_order(place_request(MORNING, tomorrow()))
    }))
    .await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 2);
}

#[tokio::test]
async fn lists_own_orders_newest_first() {
    let checkout = TestCheckout::new();
    checkout
        .service
        .place_order(place_request(MORNING, tomorrow()))
        .await
        .unwrap();
    checkout
        .service
        .place_order(place_request(EVENING, tomorrow()))
        .await
        .unwrap();

    let mine = checkout.service.list_orders(&customer(), 10).await.unwrap();
    let theirs = checkout
        .service
        .list_orders(&UserId::new(OTHER_CUSTOMER), 10)
        .await
        .unwrap();
    let one = checkout.service.list_orders(&customer(), 0).await.unwrap();

    assert_eq!(mine.len(), 2);
    assert!(theirs.is_empty());
    assert_eq!(one.len(), 1);
}

// ============================================================================
// Slot listing and coupon preview
// ============================================================================

#[tokio::test]
async fn lists_bookable_slots_with_capacity() {
    let checkout = TestCheckout::new();

    let slots = checkout
        .service
        .available_slots(&customer(), SlotQuery::Address(HOME), tomorrow())
        .await
        .unwrap();
    let ids: Vec<SlotId> = slots.iter().map(|a| a.slot.id).collect();
    assert_eq!(ids, vec![MORNING, EVENING]);

    for _ in 0..2 {
        checkout
            .service
            .place_order(place_request(MORNING, tomorrow()))
            .await
            .unwrap();
    }

    let slots = checkout
        .service
        .available_slots(&customer(), SlotQuery::ServiceArea(CENTRAL), tomorrow())
        .await
        .unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].slot.id, EVENING);
    assert_eq!(slots[0].remaining, 10);
}

#[tokio::test]
async fn slot_listing_respects_booking_window() {
    let checkout = TestCheckout::new();

    let past = checkout
        .service
        .available_slots(&customer(), SlotQuery::Address(HOME), today() - Duration::days(1))
        .await
        .unwrap();
    let far = checkout
        .service
        .available_slots(&customer(), SlotQuery::Address(HOME), today() + Duration::days(30))
        .await
        .unwrap();

    assert!(past.is_empty());
    assert!(far.is_empty());
}

#[tokio::test]
async fn slot_listing_area_errors() {
    let checkout = TestCheckout::new();

    let closed = checkout
        .service
        .available_slots(&customer(), SlotQuery::ServiceArea(CLOSED_AREA), tomorrow())
        .await
        .unwrap();
    assert!(closed.is_empty());

    let missing = checkout
        .service
        .available_slots(&customer(), SlotQuery::ServiceArea(ServiceAreaId::new(77)), tomorrow())
        .await
        .unwrap_err();
    assert_eq!(missing, IntakeError::ServiceAreaNotFound(ServiceAreaId::new(77)));

    let unserviceable = checkout
        .service
        .available_slots(&customer(), SlotQuery::Address(FARAWAY), tomorrow())
        .await
        .unwrap_err();
    assert_eq!(unserviceable.code(), "ADDRESS_UNSERVICEABLE");
}

#[tokio::test]
async fn previews_coupon_without_reserving() {
    let checkout = TestCheckout::new();

    let preview = checkout
        .service
        .preview_coupon("save10", &[line(MILK, 2), line(BREAD, 1)])
        .await
        .unwrap();

    assert_eq!(preview.code, "SAVE10");
    assert_eq!(preview.subtotal, Money::from_major(170));
    assert_eq!(preview.discount, Money::from_major(17));

    let below_minimum = checkout
        .service
        .preview_coupon("SAVE10", &[line(BREAD, 1)])
        .await
        .unwrap_err();
    assert!(matches!(
        below_minimum,
        IntakeError::CouponInvalid(CouponRejection::BelowMinimum { .. })
    ));

    let unknown = checkout
        .service
        .preview_coupon("NOPE", &[line(BREAD, 1)])
        .await
        .unwrap_err();
    assert_eq!(unknown.code(), "COUPON_INVALID");

    assert!(checkout.orders.is_empty());
}
