//! Flare server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{Router, middleware, routing::get};
use flare_api::{AppState, healthz, metrics_middleware, router as api_router};
use flare_common::Config;
use flare_core::{
    DbReportStore, InMemoryChildRegistry, InMemoryReportStore, LoggingGateway,
    NotificationGatewayRef, ReportService, ReportStoreRef, SystemClock,
};
use flare_db::repositories::{ReportRepository, TipRepository};
use flare_queue::{
    Dispatcher, RedisFeedGateway, RoutingGateway, TickScheduler, WebhookGateway,
    run_lifecycle_worker,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TICK_QUEUE_CAPACITY: usize = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_BYTES: usize = 64 * 1024;
const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "flare=debug,tower_http=debug".into());

    // FLARE_LOG_FORMAT=json switches to structured output.
    let json = std::env::var("FLARE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }
}

async fn build_store(config: &Config) -> anyhow::Result<ReportStoreRef> {
    let Some(database) = &config.database else {
        warn!("No database configured, reports are kept in memory only");
        return Ok(Arc::new(InMemoryReportStore::new()));
    };

    let db = flare_db::init(database)
        .await
        .context("connecting to database")?;
    info!("Connected to database");

    info!("Running database migrations...");
    flare_db::migrate(&db).await.context("running migrations")?;
    info!("Migrations completed");

    let db = Arc::new(db);
    Ok(Arc::new(DbReportStore::new(
        ReportRepository::new(Arc::clone(&db)),
        TipRepository::new(db),
    )))
}

async fn build_gateway(config: &Config) -> anyhow::Result<NotificationGatewayRef> {
    let webhooks = WebhookGateway::new(&config.gateway).context("configuring partner webhooks")?;
    let partners: NotificationGatewayRef = if webhooks.has_endpoints() {
        info!("Partner webhooks configured");
        Arc::new(webhooks)
    } else {
        info!("No partner webhooks configured, partner notices are logged");
        Arc::new(LoggingGateway)
    };

    let public_feed: NotificationGatewayRef = match &config.redis {
        Some(redis) => Arc::new(
            RedisFeedGateway::connect(&redis.url, &redis.prefix)
                .await
                .context("connecting to Redis")?,
        ),
        None => Arc::new(LoggingGateway),
    };

    Ok(Arc::new(RoutingGateway::new(partners, public_feed)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting flare server...");

    // Load configuration
    let config = Config::load().context("loading configuration")?;

    let store = build_store(&config).await?;
    let registry = Arc::new(InMemoryChildRegistry::new());

    // Background work
    let (scheduler, ticks) = TickScheduler::new(TICK_QUEUE_CAPACITY);
    let dispatcher = Dispatcher::new(&config.gateway);
    let dispatch = Arc::new(dispatcher.handle());
    let gateway = build_gateway(&config).await?;

    let report_service = ReportService::new(
        store,
        registry.clone(),
        Arc::new(SystemClock),
        config.alerts.clone(),
    )
    .with_scheduler(scheduler)
    .with_dispatch(dispatch);

    let dispatcher_task = dispatcher.start(gateway);
    let lifecycle_task = tokio::spawn(run_lifecycle_worker(ticks, report_service.clone()));

    let resumed = report_service
        .resume_schedules()
        .await
        .context("resuming report schedules")?;
    info!(
        active = resumed.active,
        pending = resumed.pending,
        "Report schedules resumed"
    );

    let state = AppState::new(report_service, registry);

    // Build router
    let app = Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_router())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing listen address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Timers keep tick senders alive, so the lifecycle worker is stopped
    // explicitly. The dispatcher drains once the engine is gone.
    lifecycle_task.abort();
    if tokio::time::timeout(DISPATCH_DRAIN_TIMEOUT, dispatcher_task)
        .await
        .is_err()
    {
        warn!("Notification dispatcher did not drain in time");
    }

    info!("Server shutdown complete");
    Ok(())
}
