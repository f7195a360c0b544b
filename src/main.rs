use airtime_topup::api::handlers::{AppState, api_routes};
use airtime_topup::api::openapi::ApiDoc;
use airtime_topup::config::CONFIG;
use airtime_topup::core::reconciliation::{ReconciliationEngine, Timeouts};
use airtime_topup::core::ussd::{AmountPolicy, UssdMenu};
use airtime_topup::infrastructure::logging::in_memory::InMemoryLogging;
use airtime_topup::infrastructure::providers::africastalking::{AfricasTalkingClient, AfricasTalkingConfig};
use airtime_topup::infrastructure::providers::daraja::{DarajaClient, DarajaConfig};
use airtime_topup::infrastructure::storage::in_memory::InMemoryStorage;
use http::header;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&CONFIG.log_level)),
        )
        .init();
    info!(config = ?*CONFIG, "starting airtime top-up service");

    let timeouts = Timeouts {
        store: CONFIG.store_timeout,
        provider: CONFIG.provider_timeout,
        claim_ttl: CONFIG.claim_ttl,
    };

    let storage = InMemoryStorage::new();
    let logging = InMemoryLogging::new();

    let daraja = Arc::new(DarajaClient::new(DarajaConfig {
        base_url: CONFIG.daraja_base_url.clone(),
        consumer_key: CONFIG.daraja_consumer_key.clone(),
        consumer_secret: CONFIG.daraja_consumer_secret.clone(),
        shortcode: CONFIG.daraja_shortcode.clone(),
        passkey: CONFIG.daraja_passkey.clone(),
        callback_base_url: CONFIG.callback_base_url.clone(),
        timeout: CONFIG.provider_timeout,
    })?);
    let africastalking = Arc::new(AfricasTalkingClient::new(AfricasTalkingConfig {
        base_url: CONFIG.at_base_url.clone(),
        username: CONFIG.at_username.clone(),
        api_key: CONFIG.at_api_key.clone(),
        sender_id: CONFIG.at_sender_id.clone(),
        currency: CONFIG.currency.clone(),
        timeout: CONFIG.provider_timeout,
    })?);

    let engine = ReconciliationEngine::new(
        storage.clone(),
        logging.clone(),
        africastalking.clone(),
        africastalking,
        CONFIG.currency.clone(),
        timeouts,
    );
    let ussd = UssdMenu::new(
        storage,
        logging,
        daraja,
        AmountPolicy {
            currency: CONFIG.currency.clone(),
            min: CONFIG.ussd_min_amount,
            max: CONFIG.ussd_max_amount,
        },
        timeouts,
    );

    let state = AppState {
        engine: Arc::new(engine),
        ussd: Arc::new(ussd),
        started_at: Instant::now(),
    };

    let app = api_routes(state, Duration::from_secs(30))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([http::Method::GET, http::Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], CONFIG.port));
    info!("Server running at http://{}", addr);
    info!("Health check: http://{}/health", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal. Closing server...");
}
