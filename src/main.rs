//! cohort-gateway server entry point.
//!
//! Wires the store, the admission service and the notification dispatcher,
//! then serves the REST API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cohort_gateway::api;
use cohort_gateway::app_state::{AdminSecret, AppState};
use cohort_gateway::config::{GatewayConfig, LogFormat};
use cohort_gateway::notify::{
    self, NotificationChannel, NotificationDispatcher, ResendEmailChannel, SheetsSyncChannel,
};
use cohort_gateway::persistence::{MemoryStore, PostgresStore, RegistrationStore};
use cohort_gateway::service::{CapacityAllocator, RegistrationService};

/// How long shutdown waits for in-flight notifications.
const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("invalid configuration")?;

    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting cohort-gateway");

    // Build persistence layer
    let store = build_store(&config).await?;

    // Build notification pipeline
    let channels = build_channels(&config)?;
    let (queue, dispatcher) =
        NotificationDispatcher::channel(config.notification_queue_capacity, channels);
    let dispatcher = dispatcher.with_max_in_flight(config.notification_max_in_flight);
    tracing::info!(channels = ?dispatcher.channel_names(), "notification dispatcher starting");
    let dispatcher = dispatcher.spawn();

    // Build service layer
    let allocator = CapacityAllocator::new(Arc::clone(&store), config.admission_timeout());
    let registration = Arc::new(RegistrationService::new(allocator, store, queue));

    // Build application state
    let app_state = AppState {
        registration,
        admin_secret: AdminSecret::new(config.admin_secret.as_deref()),
    };
    if !app_state.admin_secret.is_configured() {
        tracing::warn!("ADMIN_SECRET is not set; admin endpoints will refuse every request");
    }

    let app = api::build_app(app_state, config.request_timeout());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // The router, and with it the last queue handle, is gone: the
    // dispatcher drains what is left and stops.
    match tokio::time::timeout(DISPATCH_DRAIN_TIMEOUT, dispatcher).await {
        Ok(Ok(())) => tracing::info!("notification dispatcher drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "notification dispatcher failed"),
        Err(_) => tracing::warn!("notification dispatcher did not drain in time"),
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn build_store(config: &GatewayConfig) -> anyhow::Result<Arc<dyn RegistrationStore>> {
    if !config.persistence_enabled {
        let pools = config.seeded_pools();
        tracing::warn!(
            pools = pools.len(),
            "persistence disabled; admissions are kept in memory and lost on restart"
        );
        return Ok(Arc::new(MemoryStore::new(pools)));
    }

    let store = PostgresStore::connect(config)
        .await
        .context("failed to connect to database")?;
    store.migrate().await.context("failed to run migrations")?;
    let seeded = store
        .seed_pools_if_empty(&config.pool_seed)
        .await
        .context("failed to seed pools")?;
    if seeded > 0 {
        tracing::info!(pools = seeded, "seeded empty pools table");
    }
    tracing::info!("database ready");
    Ok(Arc::new(store))
}

fn build_channels(config: &GatewayConfig) -> anyhow::Result<Vec<Arc<dyn NotificationChannel>>> {
    let client = notify::http_client(config.notification_http_timeout())
        .context("failed to build notification http client")?;
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    match &config.resend_api_key {
        Some(api_key) => channels.push(Arc::new(ResendEmailChannel::new(
            client.clone(),
            &config.resend_api_url,
            api_key.as_str(),
            config.email_from.as_str(),
            config.email_subject.as_str(),
        ))),
        None => tracing::warn!("RESEND_API_KEY is not set; confirmation emails are disabled"),
    }

    match &config.sheets_webhook_url {
        Some(url) => channels.push(Arc::new(SheetsSyncChannel::new(client, url.as_str()))),
        None => tracing::warn!("SHEETS_WEBHOOK_URL is not set; spreadsheet sync is disabled"),
    }

    Ok(channels)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
