//! Draw lifecycle: open-draw resolution, the numbers board, and rollover.

use crate::config::RaffleConfig;
use crate::db::Database;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum DrawError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct Draw {
    pub id: i64,
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// One entry of the numbers board
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NumberEntry {
    pub n: i32,
    pub status: String,
}

pub struct DrawService {
    db: Arc<Database>,
    cfg: RaffleConfig,
}

impl DrawService {
    pub fn new(db: Arc<Database>, cfg: RaffleConfig) -> Self {
        Self { db, cfg }
    }

    /// Newest open draw, if any. The single-open invariant is maintained by
    /// rollover, not by a storage constraint, so newest wins.
    pub async fn current(&self) -> Result<Option<Draw>, DrawError> {
        let row = sqlx::query_as::<_, Draw>(
            r#"SELECT id, status, opened_at, closed_at
                 FROM draws WHERE status = 'open'
             ORDER BY id DESC LIMIT 1"#,
        )
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row)
    }

    /// Numbers board for one draw, ordered by number.
    pub async fn numbers(&self, draw_id: i64) -> Result<Vec<NumberEntry>, DrawError> {
        let rows = sqlx::query(
            r#"SELECT n, status FROM slots WHERE draw_id = $1 ORDER BY n ASC"#,
        )
        .bind(draw_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| NumberEntry {
                n: r.get::<i16, _>("n") as i32,
                status: r.get("status"),
            })
            .collect())
    }

    /// Bootstrap: make sure one open draw with full inventory exists.
    /// Returns the open draw id.
    pub async fn ensure_open_draw(&self) -> Result<i64, DrawError> {
        if let Some(draw) = self.current().await? {
            // Top up a partially seeded inventory (interrupted bootstrap).
            let count: i64 =
                sqlx::query_scalar(r#"SELECT count(*) FROM slots WHERE draw_id = $1"#)
                    .bind(draw.id)
                    .fetch_one(self.db.pool())
                    .await?;
            if count < self.cfg.draw_size as i64 {
                self.populate_slots(draw.id).await?;
            }
            return Ok(draw.id);
        }

        let mut tx = self.db.pool().begin().await?;
        let draw_id: i64 =
            sqlx::query_scalar(r#"INSERT INTO draws (status) VALUES ('open') RETURNING id"#)
                .fetch_one(&mut *tx)
                .await?;
        sqlx::query(
            r#"INSERT INTO slots (draw_id, n, status)
               SELECT $1, gs, 'available' FROM generate_series(0, $2 - 1) AS gs"#,
        )
        .bind(draw_id)
        .bind(self.cfg.draw_size)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(draw_id, size = self.cfg.draw_size, "opened first draw");
        Ok(draw_id)
    }

    /// Close the draw and open its successor once every slot is sold.
    ///
    /// Two callers can observe "all sold" at the same time; only the one whose
    /// conditional close flips the row creates the successor, so exactly one
    /// new draw appears. Returns the successor draw id when this caller won.
    pub async fn rollover_if_sold_out(&self, draw_id: i64) -> Result<Option<i64>, DrawError> {
        let sold: i64 = sqlx::query_scalar(
            r#"SELECT count(*) FROM slots WHERE draw_id = $1 AND status = 'sold'"#,
        )
        .bind(draw_id)
        .fetch_one(self.db.pool())
        .await?;

        if sold < self.cfg.draw_size as i64 {
            return Ok(None);
        }

        let closed = sqlx::query(
            r#"UPDATE draws SET status = 'closed', closed_at = now()
                WHERE id = $1 AND status = 'open'"#,
        )
        .bind(draw_id)
        .execute(self.db.pool())
        .await?
        .rows_affected();

        if closed != 1 {
            // Another caller won the close; it will create the successor.
            return Ok(None);
        }

        let mut tx = self.db.pool().begin().await?;
        let new_id: i64 =
            sqlx::query_scalar(r#"INSERT INTO draws (status) VALUES ('open') RETURNING id"#)
                .fetch_one(&mut *tx)
                .await?;
        sqlx::query(
            r#"INSERT INTO slots (draw_id, n, status)
               SELECT $1, gs, 'available' FROM generate_series(0, $2 - 1) AS gs"#,
        )
        .bind(new_id)
        .bind(self.cfg.draw_size)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(closed_draw = draw_id, new_draw = new_id, "draw rolled over");
        Ok(Some(new_id))
    }

    async fn populate_slots(&self, draw_id: i64) -> Result<(), DrawError> {
        sqlx::query(r#"DELETE FROM slots WHERE draw_id = $1"#)
            .bind(draw_id)
            .execute(self.db.pool())
            .await?;
        sqlx::query(
            r#"INSERT INTO slots (draw_id, n, status)
               SELECT $1, gs, 'available' FROM generate_series(0, $2 - 1) AS gs"#,
        )
        .bind(draw_id)
        .bind(self.cfg.draw_size)
        .execute(self.db.pool())
        .await?;

        tracing::warn!(draw_id, "reseeded incomplete slot inventory");
        Ok(())
    }
}
