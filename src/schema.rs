//! Schema bootstrap
//!
//! Creates the tables on startup when they do not exist yet. The first open
//! draw and its slot inventory are seeded by `DrawService::ensure_open_draw`.

use sqlx::PgPool;

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id            BIGSERIAL PRIMARY KEY,
            name          TEXT NOT NULL,
            email         TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            is_admin      BOOLEAN NOT NULL DEFAULT FALSE,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS draws (
            id        BIGSERIAL PRIMARY KEY,
            status    TEXT NOT NULL DEFAULT 'open',
            opened_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            closed_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS slots (
            draw_id        BIGINT NOT NULL REFERENCES draws(id) ON DELETE CASCADE,
            n              SMALLINT NOT NULL,
            status         TEXT NOT NULL DEFAULT 'available',
            reservation_id UUID,
            PRIMARY KEY (draw_id, n)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reservations (
            id         UUID PRIMARY KEY,
            user_id    BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            draw_id    BIGINT NOT NULL REFERENCES draws(id) ON DELETE CASCADE,
            numbers    INT[] NOT NULL,
            status     TEXT NOT NULL DEFAULT 'active',
            expires_at TIMESTAMPTZ NOT NULL,
            payment_id TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payments (
            id             TEXT PRIMARY KEY,
            reservation_id UUID NOT NULL REFERENCES reservations(id) ON DELETE CASCADE,
            status         TEXT NOT NULL,
            amount_cents   BIGINT NOT NULL,
            payload        JSONB,
            created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
            paid_at        TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_reservations_status_expiry
           ON reservations (status, expires_at)"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_reservations_user
           ON reservations (user_id, created_at DESC)"#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database schema ensured");
    Ok(())
}
