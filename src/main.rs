//! Rifa PIX - service entry point
//!
//! Bootstrap order: config → logging → database (schema + first draw) →
//! services → background sweep → HTTP gateway.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use rifa_pix::config::AppConfig;
use rifa_pix::db::Database;
use rifa_pix::draw::DrawService;
use rifa_pix::gateway::{self, state::AppState};
use rifa_pix::payment::{MercadoPagoClient, PaymentService};
use rifa_pix::reservation::ReservationService;
use rifa_pix::user_auth::UserAuthService;
use rifa_pix::{logging, schema};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = logging::init_logging(&config);

    tracing::info!("Starting rifa_pix in {} mode", env);

    let database_url = config
        .database_url()
        .context("postgres_url missing from config and DATABASE_URL not set")?;
    let db = Arc::new(
        Database::connect(&database_url)
            .await
            .context("Failed to connect to PostgreSQL")?,
    );
    schema::ensure_schema(db.pool())
        .await
        .context("Failed to ensure database schema")?;

    let draws = Arc::new(DrawService::new(db.clone(), config.raffle.clone()));
    let draw_id = draws.ensure_open_draw().await?;
    tracing::info!(draw_id, "open draw ready");

    let reservations = Arc::new(ReservationService::new(db.clone(), config.raffle.clone()));
    let user_auth = Arc::new(UserAuthService::new(
        db.pool().clone(),
        config.jwt_secret(),
    ));

    if let (Ok(email), Ok(password)) = (
        std::env::var("SEED_ADMIN_EMAIL"),
        std::env::var("SEED_ADMIN_PASSWORD"),
    ) {
        user_auth.ensure_admin("Admin", &email, &password).await?;
    }

    let payments = match config.pix_access_token() {
        Some(token) => {
            let provider = Arc::new(MercadoPagoClient::new(&config.payment, token)?);
            Some(Arc::new(PaymentService::new(
                db.clone(),
                provider,
                draws.clone(),
                config.raffle.clone(),
            )))
        }
        None => {
            tracing::warn!("PIX_ACCESS_TOKEN not set, payment routes disabled");
            None
        }
    };

    // Periodic sweep so stale reservations are released even when no one is
    // reserving. The lazy sweep at the head of each reservation attempt is
    // what bounds correctness; this tick only bounds board staleness.
    let sweeper = reservations.clone();
    let sweep_interval = config.raffle.sweep_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(sweep_interval));
        loop {
            interval.tick().await;
            match sweeper.expire_stale().await {
                Ok(0) => {}
                Ok(n) => tracing::info!(expired = n, "background sweep"),
                Err(e) => tracing::warn!("background sweep failed: {}", e),
            }
        }
    });

    let state = Arc::new(AppState::new(
        db,
        reservations,
        draws,
        payments,
        user_auth,
        config.gateway.cors_origin.clone(),
    ));

    let port = get_port_override().unwrap_or(config.gateway.port);
    gateway::run_server(state, &config.gateway.host, port).await;

    Ok(())
}
