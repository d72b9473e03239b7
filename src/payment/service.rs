//! Payment bridge
//!
//! Translates provider payment status into reservation-state transitions.
//! Every transition is a conditional write, so webhook redelivery and
//! poll/webhook races converge on the same end state. `paid` wins any race
//! against expiry or cancellation.

use super::error::PaymentError;
use super::provider::{ChargeRequest, PixCharge, PixProvider};
use crate::config::RaffleConfig;
use crate::db::Database;
use crate::draw::service::DrawService;
use crate::reservation::service::Reservation;
use crate::reservation::state::ReservationStatus;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

/// Provider statuses that definitively end a payment attempt.
fn is_terminal_failure(status: &str) -> bool {
    matches!(status, "rejected" | "cancelled" | "expired")
}

pub struct PaymentService {
    db: Arc<Database>,
    provider: Arc<dyn PixProvider>,
    draws: Arc<DrawService>,
    cfg: RaffleConfig,
}

impl PaymentService {
    pub fn new(
        db: Arc<Database>,
        provider: Arc<dyn PixProvider>,
        draws: Arc<DrawService>,
        cfg: RaffleConfig,
    ) -> Self {
        Self {
            db,
            provider,
            draws,
            cfg,
        }
    }

    /// Create a PIX charge for a reservation owned by `user_id`.
    pub async fn create_pix_charge(
        &self,
        user_id: i64,
        reservation_id: Uuid,
    ) -> Result<PixCharge, PaymentError> {
        let reservation = self
            .load_reservation(reservation_id)
            .await?
            .ok_or(PaymentError::ReservationNotFound)?;

        if reservation.user_id != user_id {
            return Err(PaymentError::Forbidden);
        }
        match reservation.status() {
            Some(s) if s.is_claiming() => {}
            _ => return Err(PaymentError::WrongReservationStatus(reservation.status.clone())),
        }
        // The sweep is lazy; a stale-but-unswept reservation must not reach
        // the provider.
        if reservation.status() == Some(ReservationStatus::Active)
            && reservation.expires_at < Utc::now()
        {
            return Err(PaymentError::ReservationExpired);
        }

        let payer = sqlx::query(r#"SELECT name, email FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(PaymentError::Forbidden)?;

        let amount_cents = reservation.numbers.len() as i64 * self.cfg.price_cents;
        let req = ChargeRequest {
            amount_cents,
            description: format!("Reserva {}", reservation_id),
            reservation_id,
            payer_email: payer.get("email"),
            payer_name: payer.get("name"),
        };

        let charge = self.provider.create_charge(&req).await?;

        sqlx::query(
            r#"INSERT INTO payments (id, reservation_id, status, amount_cents, payload)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (id) DO UPDATE
                  SET status = EXCLUDED.status, payload = EXCLUDED.payload"#,
        )
        .bind(&charge.payment_id)
        .bind(reservation_id)
        .bind(&charge.status)
        .bind(amount_cents)
        .bind(&charge.raw)
        .execute(self.db.pool())
        .await?;

        sqlx::query(
            r#"UPDATE reservations
                  SET status = 'pending_payment', payment_id = $2
                WHERE id = $1 AND status IN ('active', 'pending_payment')"#,
        )
        .bind(reservation_id)
        .bind(&charge.payment_id)
        .execute(self.db.pool())
        .await?;

        tracing::info!(
            reservation_id = %reservation_id,
            payment_id = %charge.payment_id,
            amount_cents,
            "PIX charge created"
        );

        Ok(charge)
    }

    /// Poll the provider for the current payment status, cache it, and apply
    /// the bridge transition.
    pub async fn refresh_status(&self, payment_id: &str) -> Result<PixCharge, PaymentError> {
        let charge = self.provider.get_payment(payment_id).await?;

        let updated = sqlx::query(
            r#"UPDATE payments SET status = $2, payload = $3 WHERE id = $1"#,
        )
        .bind(payment_id)
        .bind(&charge.status)
        .bind(&charge.raw)
        .execute(self.db.pool())
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(PaymentError::PaymentNotFound(payment_id.to_string()));
        }

        self.apply_update(payment_id, &charge.status).await?;
        Ok(charge)
    }

    /// The bridge transition proper. Idempotent: safe to invoke any number of
    /// times with the same `(payment_id, status)` pair.
    pub async fn apply_update(&self, payment_id: &str, status: &str) -> Result<(), PaymentError> {
        let row = sqlx::query(r#"SELECT reservation_id FROM payments WHERE id = $1"#)
            .bind(payment_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound(payment_id.to_string()))?;
        let reservation_id: Uuid = row.get("reservation_id");

        let reservation = self
            .load_reservation(reservation_id)
            .await?
            .ok_or(PaymentError::ReservationNotFound)?;

        if status == "approved" {
            self.apply_approved(payment_id, &reservation).await?;
        } else if is_terminal_failure(status) {
            self.apply_failure(payment_id, &reservation, status).await?;
        }
        // Non-terminal statuses (pending, in_process) were cached by the
        // caller; nothing to transition.

        Ok(())
    }

    async fn apply_approved(
        &self,
        payment_id: &str,
        reservation: &Reservation,
    ) -> Result<(), PaymentError> {
        let mut tx = self.db.pool().begin().await?;

        let marked_paid = sqlx::query(
            r#"UPDATE reservations
                  SET status = 'paid'
                WHERE id = $1 AND status IN ('active', 'pending_payment')"#,
        )
        .bind(reservation.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Sell only the slots this reservation still owns. A slot released by
        // the sweep and re-reserved by someone else is not stolen by a late
        // approval.
        let sold = sqlx::query(
            r#"UPDATE slots
                  SET status = 'sold', reservation_id = NULL
                WHERE draw_id = $1 AND n = ANY($2)
                  AND status = 'reserved' AND reservation_id = $3"#,
        )
        .bind(reservation.draw_id)
        .bind(&reservation.numbers)
        .bind(reservation.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"UPDATE payments
                  SET status = 'approved', paid_at = COALESCE(paid_at, now())
                WHERE id = $1"#,
        )
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if marked_paid == 1 {
            tracing::info!(
                reservation_id = %reservation.id,
                payment_id,
                sold,
                "payment approved, reservation paid"
            );

            if sold < reservation.numbers.len() as u64 {
                // Late approval raced an expiry: some numbers were already
                // released and possibly re-sold. Paid stands; flag for
                // reconciliation.
                let missing = sqlx::query(
                    r#"SELECT n FROM slots
                        WHERE draw_id = $1 AND n = ANY($2) AND status <> 'sold'"#,
                )
                .bind(reservation.draw_id)
                .bind(&reservation.numbers)
                .fetch_all(self.db.pool())
                .await?;
                let missing: Vec<i32> =
                    missing.iter().map(|r| r.get::<i16, _>("n") as i32).collect();
                tracing::warn!(
                    reservation_id = %reservation.id,
                    payment_id,
                    ?missing,
                    "approved reservation no longer owned all its numbers"
                );
            }
        }

        // Every sale may have completed the draw.
        self.draws
            .rollover_if_sold_out(reservation.draw_id)
            .await
            .map_err(|e| match e {
                crate::draw::service::DrawError::Database(e) => PaymentError::Database(e),
            })?;

        Ok(())
    }

    async fn apply_failure(
        &self,
        payment_id: &str,
        reservation: &Reservation,
        status: &str,
    ) -> Result<(), PaymentError> {
        // Provider 'expired' mirrors TTL expiry; rejections read as cancelled.
        let new_status = if status == "expired" { "expired" } else { "cancelled" };

        let mut tx = self.db.pool().begin().await?;

        let transitioned = sqlx::query(
            r#"UPDATE reservations
                  SET status = $2
                WHERE id = $1 AND status IN ('active', 'pending_payment')"#,
        )
        .bind(reservation.id)
        .bind(new_status)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if transitioned == 1 {
            sqlx::query(
                r#"UPDATE slots
                      SET status = 'available', reservation_id = NULL
                    WHERE draw_id = $1 AND n = ANY($2)
                      AND status = 'reserved' AND reservation_id = $3"#,
            )
            .bind(reservation.draw_id)
            .bind(&reservation.numbers)
            .bind(reservation.id)
            .execute(&mut *tx)
            .await?;

            tracing::info!(
                reservation_id = %reservation.id,
                payment_id,
                provider_status = status,
                "payment failed, numbers released"
            );
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_reservation(&self, id: Uuid) -> Result<Option<Reservation>, PaymentError> {
        let row = sqlx::query_as::<_, Reservation>(
            r#"SELECT id, user_id, draw_id, numbers, status, expires_at, payment_id, created_at
                 FROM reservations WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_failure_classification() {
        assert!(is_terminal_failure("rejected"));
        assert!(is_terminal_failure("cancelled"));
        assert!(is_terminal_failure("expired"));

        assert!(!is_terminal_failure("pending"));
        assert!(!is_terminal_failure("in_process"));
        assert!(!is_terminal_failure("approved"));
    }
}
