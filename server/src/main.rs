//! Tourbook booking API server.
//!
//! Wires the `PostgreSQL` ports, the booking service and the HTTP router,
//! then serves until SIGINT/SIGTERM.

mod config;

use anyhow::Context;
use config::{Config, DEFAULT_LOG_FILTER};
use sqlx::postgres::PgPoolOptions;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tourbook_core::environment::{Notifier, RandomReferences, SystemClock};
use tourbook_postgres::{PostgresBookingStore, PostgresCustomerDirectory, PostgresListingCatalog};
use tourbook_runtime::metrics::MetricsExporter;
use tourbook_runtime::notify::{LogNotifier, WebhookNotifier};
use tourbook_runtime::{BookingEnvironment, BookingService};
use tourbook_web::{AppState, router};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.server.log_filter)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env file");
    }
    info!(
        address = %config.bind_address(),
        max_connections = config.database.max_connections,
        lock_timeout_ms = config.database.lock_timeout_ms,
        webhook = config.notify.webhook_url.is_some(),
        "Starting Tourbook server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    tourbook_postgres::migrate(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Database ready");

    let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
        Some(url) => {
            info!(%url, "Booking notifications go to webhook");
            Arc::new(
                WebhookNotifier::new(url.clone(), Duration::from_millis(config.notify.timeout_ms))
                    .context("Failed to build webhook client")?,
            )
        }
        None => Arc::new(LogNotifier),
    };

    let env = BookingEnvironment {
        store: Arc::new(
            PostgresBookingStore::new(pool.clone())
                .with_lock_timeout(Duration::from_millis(config.database.lock_timeout_ms)),
        ),
        catalog: Arc::new(PostgresListingCatalog::new(pool.clone())),
        customers: Arc::new(PostgresCustomerDirectory::new(pool.clone())),
        notifier,
        clock: Arc::new(SystemClock),
        references: Arc::new(RandomReferences),
    };
    let service = BookingService::new(env, config.booking.booking_config());
    let metrics = MetricsExporter::install().context("Failed to install metrics recorder")?;

    let app = router(AppState::new(service, metrics));

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    info!(address = %config.bind_address(), "Server listening");

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .into_future(),
    );

    tokio::select! {
        result = &mut server => {
            result.context("Server task panicked")?.context("Server error")?;
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    let _ = stop_tx.send(true);
    let grace = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.context("Server task panicked")?.context("Server error")?,
        Err(_) => warn!(grace_secs = grace.as_secs(), "In-flight requests did not finish in time"),
    }

    pool.close().await;
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
