use crate::{
    api::models::*,
    core::{
        constants::{CALLBACK_ACK, CALLBACK_BODY_LIMIT},
        errors::TopupError,
        models::{AppLog, CallbackEnvelope, Transaction},
        reconciliation::{ReconcileOutcome, ReconciliationEngine},
        ussd::UssdMenu,
    },
    infrastructure::{
        logging::{LoggingService, in_memory::InMemoryLogging},
        storage::{TransactionStore, in_memory::InMemoryStorage},
    },
};
use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Form, Path, Query, State, rejection::FormRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, error, warn};

pub type Engine = ReconciliationEngine<InMemoryStorage, InMemoryLogging>;
pub type Menu = UssdMenu<InMemoryStorage, InMemoryLogging>;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub ussd: Arc<Menu>,
    pub started_at: Instant,
}

// Define API routes
pub fn api_routes(state: AppState, request_timeout: Duration) -> Router {
    // The callback route stays outside the timeout layer.
    let bounded_routes = Router::new()
        .route("/ussd", post(handle_ussd))
        .route("/transactions", get(list_transactions))
        .route("/transactions/{correlation_id}", get(get_transaction))
        .route("/logs", get(get_app_logs))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/payment-callback", post(handle_payment_callback))
        .merge(bounded_routes)
        .with_state(state)
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

#[utoipa::path(
    post,
    path = "/payment-callback",
    request_body = CallbackEnvelope,
    responses(
        (status = 200, description = "Callback acknowledged, whatever the internal outcome", body = String)
    )
)]
pub(crate) async fn handle_payment_callback(State(state): State<AppState>, body: Body) -> Response {
    match to_bytes(body, CALLBACK_BODY_LIMIT).await {
        Ok(bytes) => {
            // Detached so a dropped gateway connection cannot stop a reconcile halfway.
            let engine = state.engine.clone();
            let task = tokio::spawn(async move { engine.reconcile(&bytes).await });
            match task.await {
                Ok(Ok(outcome)) => debug!(?outcome, "payment callback reconciled"),
                Ok(Err(e)) => error!(error = %e, "error processing payment callback"),
                Err(e) if e.is_panic() => error!("panic while processing payment callback"),
                Err(e) => error!(error = %e, "payment callback task did not finish"),
            }
        }
        Err(e) => warn!(
            error = %e,
            limit = CALLBACK_BODY_LIMIT,
            outcome = ?ReconcileOutcome::Malformed,
            "unreadable payment callback body"
        ),
    }
    // Never anything but 200 to the gateway.
    plain_text(StatusCode::OK, CALLBACK_ACK.to_string())
}

#[utoipa::path(
    post,
    path = "/ussd",
    request_body(content = UssdRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Menu text starting with CON or END", body = String),
        (status = 400, description = "Missing session or phone number", body = String),
        (status = 500, description = "Unexpected failure", body = String)
    )
)]
pub(crate) async fn handle_ussd(
    State(state): State<AppState>,
    form: Result<Form<UssdRequest>, FormRejection>,
) -> Response {
    let missing = || {
        plain_text(
            StatusCode::BAD_REQUEST,
            "END Missing session or phone number".to_string(),
        )
    };
    let req = match form {
        Ok(Form(req)) => req,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable USSD request");
            return missing();
        }
    };
    let (Some(session_id), Some(phone_number)) = (
        req.session_id.filter(|s| !s.is_empty()),
        req.phone_number.filter(|s| !s.is_empty()),
    ) else {
        return missing();
    };

    match AssertUnwindSafe(state.ussd.handle(&session_id, &phone_number, &req.text))
        .catch_unwind()
        .await
    {
        Ok(reply) => plain_text(StatusCode::OK, reply.to_string()),
        Err(_) => {
            error!(session_id = %session_id, "panic in USSD handler");
            plain_text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "END Service temporarily unavailable. Try again later.".to_string(),
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process status", body = HealthResponse))
)]
pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        message: "USSD Airtime App is running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_seconds: state.started_at.elapsed().as_secs_f64(),
    })
}

async fn root() -> &'static str {
    "USSD Airtime Top-Up Service with M-Pesa STK Push\nVisit /health for status."
}

#[utoipa::path(
    get,
    path = "/transactions/{correlation_id}",
    params(
        ("correlation_id" = String, Path, description = "Gateway correlation id (CheckoutRequestID)")
    ),
    responses(
        (status = 200, description = "Transaction retrieved successfully", body = Transaction),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_transaction(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let transaction = state
        .engine
        .storage()
        .get_transaction(&correlation_id)
        .await?
        .ok_or(TopupError::TransactionNotFound(correlation_id))?;
    Ok(Json(transaction))
}

#[utoipa::path(
    get,
    path = "/transactions",
    params(ListTransactionsQuery),
    responses(
        (status = 200, description = "Transactions, oldest first", body = [Transaction])
    )
)]
pub(crate) async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let transactions = state
        .engine
        .storage()
        .list_transactions(query.disbursement_status)
        .await?;
    Ok(Json(transactions))
}

#[utoipa::path(
    get,
    path = "/logs",
    params(LogsQuery),
    responses(
        (status = 200, description = "Audit log, oldest first", body = [AppLog])
    )
)]
pub(crate) async fn get_app_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<AppLog>>, ApiError> {
    let logging = state.engine.logging();
    let logs = match query.correlation_id.as_deref() {
        Some(correlation_id) => logging.logs_for(correlation_id).await?,
        None => logging.get_logs().await?,
    };
    Ok(Json(logs))
}
