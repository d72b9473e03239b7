//! Reservation lifecycle service
//!
//! Guarantees at-most-one active claim per number within a draw without any
//! in-process lock: the claim is a single conditional bulk UPDATE whose
//! predicate (`status = 'available'`) is evaluated by PostgreSQL at write
//! time. The advisory pre-check only exists to give callers a precise
//! conflict message; the UPDATE's affected-row count is the arbiter.

use super::error::ReservationError;
use super::state::{ReservationStatus, SlotStatus};
use crate::config::RaffleConfig;
use crate::db::Database;
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: i64,
    pub draw_id: i64,
    pub numbers: Vec<i32>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn status(&self) -> Option<ReservationStatus> {
        ReservationStatus::from_str(&self.status)
    }
}

pub struct ReservationService {
    db: Arc<Database>,
    cfg: RaffleConfig,
}

impl ReservationService {
    pub fn new(db: Arc<Database>, cfg: RaffleConfig) -> Self {
        Self { db, cfg }
    }

    /// Reserve a set of numbers in the open draw for `user_id`.
    ///
    /// Runs the lazy expiry sweep first, then claims all requested numbers
    /// in one transaction. Either every number transitions
    /// `available → reserved` under the new reservation, or none do.
    pub async fn reserve_numbers(
        &self,
        user_id: i64,
        requested: &[i32],
    ) -> Result<Reservation, ReservationError> {
        let numbers = self.validate_numbers(requested)?;

        // Lazy sweep bounds the staleness window before we look at the board.
        self.expire_stale().await?;

        let draw_id = self.open_draw_id().await?.ok_or(ReservationError::NoOpenDraw)?;

        // Advisory pre-check so conflicts name the offending number. Two
        // racing requests can both pass this; the claim below settles it.
        let rows = sqlx::query(
            r#"SELECT n, status FROM slots WHERE draw_id = $1 AND n = ANY($2)"#,
        )
        .bind(draw_id)
        .bind(&numbers)
        .fetch_all(self.db.pool())
        .await?;

        for row in &rows {
            let status: String = row.get("status");
            if status != SlotStatus::Available.as_str() {
                let n: i16 = row.get("n");
                return Err(ReservationError::NumberUnavailable(n as i32));
            }
        }

        let id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::minutes(self.cfg.reservation_ttl_min);

        let mut tx = self.db.pool().begin().await?;

        // The claim. Evaluated against current slot state at write time; a
        // losing race shows up as a short row count, never a double claim.
        let claimed = sqlx::query(
            r#"UPDATE slots
                  SET status = 'reserved', reservation_id = $3
                WHERE draw_id = $1 AND n = ANY($2) AND status = 'available'"#,
        )
        .bind(draw_id)
        .bind(&numbers)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed != numbers.len() as u64 {
            // Lost the race on at least one number. Roll back so the rows we
            // did claim revert, then report which number was taken.
            tx.rollback().await?;

            let taken = sqlx::query(
                r#"SELECT n FROM slots
                    WHERE draw_id = $1 AND n = ANY($2) AND status <> 'available'
                    ORDER BY n LIMIT 1"#,
            )
            .bind(draw_id)
            .bind(&numbers)
            .fetch_optional(self.db.pool())
            .await?;

            let n = taken
                .map(|r| r.get::<i16, _>("n") as i32)
                .unwrap_or(numbers[0]);
            tracing::info!(draw_id, n, "reservation lost claim race");
            return Err(ReservationError::NumberUnavailable(n));
        }

        sqlx::query(
            r#"INSERT INTO reservations (id, user_id, draw_id, numbers, status, expires_at)
               VALUES ($1, $2, $3, $4, 'active', $5)"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(draw_id)
        .bind(&numbers)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            reservation_id = %id,
            user_id,
            draw_id,
            count = numbers.len(),
            "reservation created"
        );

        Ok(Reservation {
            id,
            user_id,
            draw_id,
            numbers,
            status: ReservationStatus::Active.as_str().to_string(),
            expires_at,
            payment_id: None,
            created_at: Utc::now(),
        })
    }

    /// Expire every `active` reservation whose TTL has passed and release the
    /// slots it still owns.
    ///
    /// Safe to run concurrently from any number of callers: both statements
    /// are conditioned on current state, so a second sweep (or a concurrent
    /// sale) makes each of them a no-op for the rows that already moved on.
    pub async fn expire_stale(&self) -> Result<u64, ReservationError> {
        // One transaction: a crash must not leave a reservation expired while
        // its slots stay claimed.
        let mut tx = self.db.pool().begin().await?;

        let expired = sqlx::query(
            r#"UPDATE reservations
                  SET status = 'expired'
                WHERE status = 'active' AND expires_at < now()
            RETURNING id, draw_id, numbers"#,
        )
        .fetch_all(&mut *tx)
        .await?;

        for row in &expired {
            let id: Uuid = row.get("id");
            let draw_id: i64 = row.get("draw_id");
            let numbers: Vec<i32> = row.get("numbers");

            let released = sqlx::query(
                r#"UPDATE slots
                      SET status = 'available', reservation_id = NULL
                    WHERE draw_id = $1 AND n = ANY($2)
                      AND status = 'reserved' AND reservation_id = $3"#,
            )
            .bind(draw_id)
            .bind(&numbers)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            tracing::debug!(reservation_id = %id, draw_id, released, "expired reservation swept");
        }

        tx.commit().await?;
        Ok(expired.len() as u64)
    }

    /// Cancel a reservation and release its numbers.
    ///
    /// Only the owner may cancel, and only while the reservation is still
    /// claiming (`active`/`pending_payment`). A paid reservation is final.
    pub async fn cancel(&self, id: Uuid, user_id: i64) -> Result<(), ReservationError> {
        let reservation = self.get(id).await?.ok_or(ReservationError::NotFound)?;
        if reservation.user_id != user_id {
            return Err(ReservationError::Forbidden);
        }
        if reservation.status() == Some(ReservationStatus::Paid) {
            return Err(ReservationError::AlreadyPaid);
        }

        let mut tx = self.db.pool().begin().await?;

        let cancelled = sqlx::query(
            r#"UPDATE reservations
                  SET status = 'cancelled'
                WHERE id = $1 AND status IN ('active', 'pending_payment')"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if cancelled == 1 {
            sqlx::query(
                r#"UPDATE slots
                      SET status = 'available', reservation_id = NULL
                    WHERE draw_id = $1 AND n = ANY($2)
                      AND status = 'reserved' AND reservation_id = $3"#,
            )
            .bind(reservation.draw_id)
            .bind(&reservation.numbers)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if cancelled == 1 {
            tracing::info!(reservation_id = %id, user_id, "reservation cancelled");
        }
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Reservation>, ReservationError> {
        let row = sqlx::query_as::<_, Reservation>(
            r#"SELECT id, user_id, draw_id, numbers, status, expires_at, payment_id, created_at
                 FROM reservations WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row)
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Reservation>, ReservationError> {
        let rows = sqlx::query_as::<_, Reservation>(
            r#"SELECT id, user_id, draw_id, numbers, status, expires_at, payment_id, created_at
                 FROM reservations
                WHERE user_id = $1
             ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows)
    }

    pub fn price_cents(&self, numbers: usize) -> i64 {
        numbers as i64 * self.cfg.price_cents
    }

    async fn open_draw_id(&self) -> Result<Option<i64>, ReservationError> {
        let row = sqlx::query(
            r#"SELECT id FROM draws WHERE status = 'open' ORDER BY id DESC LIMIT 1"#,
        )
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|r| r.get("id")))
    }

    fn validate_numbers(&self, requested: &[i32]) -> Result<Vec<i32>, ReservationError> {
        if requested.is_empty() {
            return Err(ReservationError::NoNumbers);
        }

        let mut seen = HashSet::new();
        let mut numbers = Vec::with_capacity(requested.len());
        for &n in requested {
            if n < 0 || n >= self.cfg.draw_size {
                return Err(ReservationError::NumberOutOfRange(n));
            }
            if seen.insert(n) {
                numbers.push(n);
            }
        }
        // Ascending claim order keeps concurrent multi-number claims from
        // locking slot rows in opposite orders.
        numbers.sort_unstable();

        Ok(numbers)
    }
}
