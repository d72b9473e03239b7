//! Integration tests for the payment bridge and draw rollover
//!
//! Run against PostgreSQL with the mock PIX provider; the provider network
//! protocol itself is covered by unit tests in `provider`.

use super::provider::MockPixProvider;
use super::service::PaymentService;
use crate::config::RaffleConfig;
use crate::db::Database;
use crate::draw::service::DrawService;
use crate::payment::error::PaymentError;
use crate::reservation::service::ReservationService;
use crate::testkit;
use std::sync::Arc;

struct TestHarness {
    pool: sqlx::PgPool,
    reservations: Arc<ReservationService>,
    draws: Arc<DrawService>,
    payments: PaymentService,
    provider: Arc<MockPixProvider>,
    draw_id: i64,
    user_id: i64,
}

impl TestHarness {
    async fn new(draw_size: i32) -> Self {
        let pool = testkit::create_test_pool().await;
        let draw_id = testkit::reset_raffle(&pool, draw_size).await;
        let user_id = testkit::create_test_user(&pool, "payer").await;

        let cfg = RaffleConfig {
            draw_size,
            ..RaffleConfig::default()
        };
        let db = Arc::new(Database::from_pool(pool.clone()));
        let reservations = Arc::new(ReservationService::new(db.clone(), cfg.clone()));
        let draws = Arc::new(DrawService::new(db.clone(), cfg.clone()));
        let provider = Arc::new(MockPixProvider::new());
        let payments = PaymentService::new(db, provider.clone(), draws.clone(), cfg);

        Self {
            pool,
            reservations,
            draws,
            payments,
            provider,
            draw_id,
            user_id,
        }
    }

    async fn reservation_status(&self, id: uuid::Uuid) -> String {
        sqlx::query_scalar("SELECT status FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_charge_creation_moves_reservation_to_pending() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(100).await;

    let reservation = h.reservations.reserve_numbers(h.user_id, &[10]).await.unwrap();
    let charge = h
        .payments
        .create_pix_charge(h.user_id, reservation.id)
        .await
        .unwrap();

    assert_eq!(charge.status, "pending");
    assert!(charge.qr_code.is_some());
    assert_eq!(h.reservation_status(reservation.id).await, "pending_payment");

    let amount: i64 = sqlx::query_scalar("SELECT amount_cents FROM payments WHERE id = $1")
        .bind(&charge.payment_id)
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(amount, 5500);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_charge_rejected_for_foreign_reservation() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(100).await;
    let stranger = testkit::create_test_user(&h.pool, "stranger").await;

    let reservation = h.reservations.reserve_numbers(h.user_id, &[11]).await.unwrap();
    let result = h.payments.create_pix_charge(stranger, reservation.id).await;
    assert!(matches!(result, Err(PaymentError::Forbidden)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_charge_rejected_for_stale_reservation() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(100).await;

    let reservation = h.reservations.reserve_numbers(h.user_id, &[12]).await.unwrap();
    sqlx::query("UPDATE reservations SET expires_at = now() - interval '1 minute' WHERE id = $1")
        .bind(reservation.id)
        .execute(&h.pool)
        .await
        .unwrap();

    let result = h.payments.create_pix_charge(h.user_id, reservation.id).await;
    assert!(matches!(result, Err(PaymentError::ReservationExpired)));
}

/// Approval marks the reservation paid and the slots sold.
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_approval_sells_slots() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(100).await;

    let reservation = h.reservations.reserve_numbers(h.user_id, &[10]).await.unwrap();
    let charge = h
        .payments
        .create_pix_charge(h.user_id, reservation.id)
        .await
        .unwrap();

    h.provider.set_status(&charge.payment_id, "approved");
    h.payments.refresh_status(&charge.payment_id).await.unwrap();

    assert_eq!(h.reservation_status(reservation.id).await, "paid");
    assert_eq!(testkit::slot_status(&h.pool, h.draw_id, 10).await, "sold");

    let paid_at: Option<chrono::DateTime<chrono::Utc>> =
        sqlx::query_scalar("SELECT paid_at FROM payments WHERE id = $1")
            .bind(&charge.payment_id)
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert!(paid_at.is_some());
}

/// Webhook redelivery: applying the same approval twice ends in the same
/// state as applying it once, with no duplicate rollover.
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_approval_is_idempotent() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(100).await;

    let reservation = h.reservations.reserve_numbers(h.user_id, &[10]).await.unwrap();
    let charge = h
        .payments
        .create_pix_charge(h.user_id, reservation.id)
        .await
        .unwrap();
    h.provider.set_status(&charge.payment_id, "approved");

    h.payments.refresh_status(&charge.payment_id).await.unwrap();
    h.payments.refresh_status(&charge.payment_id).await.unwrap();

    assert_eq!(h.reservation_status(reservation.id).await, "paid");
    assert_eq!(testkit::slot_status(&h.pool, h.draw_id, 10).await, "sold");

    let open_draws: i64 =
        sqlx::query_scalar("SELECT count(*) FROM draws WHERE status = 'open'")
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert_eq!(open_draws, 1);
}

/// Terminal provider failure releases the numbers.
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_rejection_releases_numbers() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(100).await;

    let reservation = h.reservations.reserve_numbers(h.user_id, &[20, 21]).await.unwrap();
    let charge = h
        .payments
        .create_pix_charge(h.user_id, reservation.id)
        .await
        .unwrap();

    h.provider.set_status(&charge.payment_id, "rejected");
    h.payments.refresh_status(&charge.payment_id).await.unwrap();

    assert_eq!(h.reservation_status(reservation.id).await, "cancelled");
    assert_eq!(testkit::slot_status(&h.pool, h.draw_id, 20).await, "available");
    assert_eq!(testkit::slot_status(&h.pool, h.draw_id, 21).await, "available");
}

/// Paid is terminal: a failure arriving after an approval changes nothing.
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_paid_wins_over_late_failure() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(100).await;

    let reservation = h.reservations.reserve_numbers(h.user_id, &[22]).await.unwrap();
    let charge = h
        .payments
        .create_pix_charge(h.user_id, reservation.id)
        .await
        .unwrap();

    h.provider.set_status(&charge.payment_id, "approved");
    h.payments.refresh_status(&charge.payment_id).await.unwrap();

    h.provider.set_status(&charge.payment_id, "expired");
    h.payments.refresh_status(&charge.payment_id).await.unwrap();

    assert_eq!(h.reservation_status(reservation.id).await, "paid");
    assert_eq!(testkit::slot_status(&h.pool, h.draw_id, 22).await, "sold");
}

/// A late approval must not sell a slot the reservation no longer owns.
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_late_approval_does_not_steal_reclaimed_slot() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(100).await;
    let rival = testkit::create_test_user(&h.pool, "rival").await;

    let reservation = h.reservations.reserve_numbers(h.user_id, &[33]).await.unwrap();
    let charge = h
        .payments
        .create_pix_charge(h.user_id, reservation.id)
        .await
        .unwrap();

    // Emulate the expiry racing the approval: the slot is released and
    // immediately re-reserved by someone else.
    sqlx::query(
        "UPDATE slots SET status = 'available', reservation_id = NULL
          WHERE draw_id = $1 AND n = 33",
    )
    .bind(h.draw_id)
    .execute(&h.pool)
    .await
    .unwrap();
    let rival_reservation = h.reservations.reserve_numbers(rival, &[33]).await.unwrap();

    h.provider.set_status(&charge.payment_id, "approved");
    h.payments.refresh_status(&charge.payment_id).await.unwrap();

    // Money changed hands, so the reservation reads paid; the slot stays
    // with its new owner.
    assert_eq!(h.reservation_status(reservation.id).await, "paid");
    assert_eq!(testkit::slot_status(&h.pool, h.draw_id, 33).await, "reserved");

    let owner: Option<uuid::Uuid> =
        sqlx::query_scalar("SELECT reservation_id FROM slots WHERE draw_id = $1 AND n = 33")
            .bind(h.draw_id)
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert_eq!(owner, Some(rival_reservation.id));
}

/// Selling the last slot closes the draw and opens a fresh one with a full
/// available inventory.
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_rollover_on_last_sale() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(4).await;

    let reservation = h
        .reservations
        .reserve_numbers(h.user_id, &[0, 1, 2, 3])
        .await
        .unwrap();
    let charge = h
        .payments
        .create_pix_charge(h.user_id, reservation.id)
        .await
        .unwrap();

    h.provider.set_status(&charge.payment_id, "approved");
    h.payments.refresh_status(&charge.payment_id).await.unwrap();

    let old_status: String = sqlx::query_scalar("SELECT status FROM draws WHERE id = $1")
        .bind(h.draw_id)
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(old_status, "closed");

    let new_draw: i64 = sqlx::query_scalar(
        "SELECT id FROM draws WHERE status = 'open' ORDER BY id DESC LIMIT 1",
    )
    .fetch_one(&h.pool)
    .await
    .unwrap();
    assert_ne!(new_draw, h.draw_id);

    let available: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM slots WHERE draw_id = $1 AND status = 'available'",
    )
    .bind(new_draw)
    .fetch_one(&h.pool)
    .await
    .unwrap();
    assert_eq!(available, 4);
}

/// Two concurrent rollover triggers create exactly one successor draw.
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_concurrent_rollover_single_successor() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(4).await;

    // Force the draw fully sold without going through payments.
    sqlx::query("UPDATE slots SET status = 'sold', reservation_id = NULL WHERE draw_id = $1")
        .bind(h.draw_id)
        .execute(&h.pool)
        .await
        .unwrap();

    let d1 = h.draws.clone();
    let d2 = h.draws.clone();
    let (r1, r2) = tokio::join!(
        d1.rollover_if_sold_out(h.draw_id),
        d2.rollover_if_sold_out(h.draw_id),
    );

    let created = [r1.unwrap(), r2.unwrap()]
        .iter()
        .filter(|r| r.is_some())
        .count();
    assert_eq!(created, 1, "only one trigger may create the successor");

    let open_draws: i64 =
        sqlx::query_scalar("SELECT count(*) FROM draws WHERE status = 'open'")
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert_eq!(open_draws, 1);
}

/// A provider outage surfaces as a provider error, not as a silent state
/// change.
#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_provider_failure_leaves_reservation_untouched() {
    let _guard = testkit::db_guard().await;
    let h = TestHarness::new(100).await;

    let reservation = h.reservations.reserve_numbers(h.user_id, &[40]).await.unwrap();
    h.provider.set_fail_create(true);

    let result = h.payments.create_pix_charge(h.user_id, reservation.id).await;
    assert!(matches!(result, Err(PaymentError::Provider(_))));

    assert_eq!(h.reservation_status(reservation.id).await, "active");
    assert_eq!(testkit::slot_status(&h.pool, h.draw_id, 40).await, "reserved");
}
