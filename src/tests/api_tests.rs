use crate::api::handlers::{
    AppState, api_routes, get_app_logs, get_transaction, handle_payment_callback, handle_ussd, health,
    list_transactions,
};
use crate::api::models::{ApiError, ListTransactionsQuery, LogsQuery, UssdRequest};
use crate::core::constants::CALLBACK_BODY_LIMIT;
use crate::core::errors::TopupError;
use crate::core::models::{DisbursementStatus, PaymentStatus};
use crate::core::ussd::{AmountPolicy, UssdMenu};
use crate::infrastructure::storage::TransactionStore;
use crate::infrastructure::storage::in_memory::InMemoryStorage;
use crate::tests::{
    AirtimeBehavior, FakeInitiator, PAYER, create_test_engine, failure_callback, seed_pending,
    success_callback, test_timeouts,
};
use axum::{
    body::{Body, to_bytes},
    extract::{Form, FromRequest, Path, Query, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

fn app_state(airtime: AirtimeBehavior) -> (AppState, InMemoryStorage) {
    let harness = create_test_engine(airtime, false);
    let storage = harness.storage.clone();
    let ussd = UssdMenu::new(
        storage.clone(),
        harness.logging.clone(),
        FakeInitiator::returning("ABC123"),
        AmountPolicy::default(),
        test_timeouts(),
    );
    let state = AppState {
        engine: Arc::new(harness.engine),
        ussd: Arc::new(ussd),
        started_at: Instant::now(),
    };
    (state, storage)
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_callback_always_acknowledged() {
    let (state, storage) = app_state(AirtimeBehavior::Sent);
    seed_pending(&storage, "ABC123", dec!(50)).await;

    for body in [
        Body::from("garbage"),
        Body::from("{}"),
        Body::from(success_callback("UNKNOWN", json!(50), "RCT0", json!(254712345678u64))),
        Body::from(success_callback("ABC123", json!(40), "RCT1", json!(254712345678u64))),
    ] {
        let response = handle_payment_callback(State(state.clone()), body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    let tx = storage.get_transaction("ABC123").await.unwrap().unwrap();
    assert_eq!(tx.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn test_callback_acknowledged_when_airtime_fails() {
    let (state, storage) = app_state(AirtimeBehavior::Error);
    seed_pending(&storage, "ABC123", dec!(50)).await;

    let response = handle_payment_callback(
        State(state),
        Body::from(success_callback("ABC123", json!(50), "RCT1", json!(254712345678u64))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let tx = storage.get_transaction("ABC123").await.unwrap().unwrap();
    assert_eq!(tx.status, PaymentStatus::Success);
    assert_eq!(tx.disbursement_status, DisbursementStatus::Failed);
}

#[tokio::test]
async fn test_ussd_requires_session_and_phone() {
    let (state, _storage) = app_state(AirtimeBehavior::Sent);

    let response = handle_ussd(
        State(state),
        Ok(Form(UssdRequest {
            session_id: Some("ATUid_1".to_string()),
            phone_number: None,
            service_code: Some("*384*123#".to_string()),
            text: String::new(),
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "END Missing session or phone number");
}

#[tokio::test]
async fn test_ussd_replies_with_plain_text() {
    let (state, storage) = app_state(AirtimeBehavior::Sent);

    let response = handle_ussd(
        State(state.clone()),
        Ok(Form(UssdRequest {
            session_id: Some("ATUid_1".to_string()),
            phone_number: Some(PAYER.to_string()),
            service_code: None,
            text: String::new(),
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.starts_with("CON Welcome"));

    let response = handle_ussd(
        State(state),
        Ok(Form(UssdRequest {
            session_id: Some("ATUid_1".to_string()),
            phone_number: Some(PAYER.to_string()),
            service_code: None,
            text: "1*50".to_string(),
        })),
    )
    .await;
    assert!(body_text(response).await.starts_with("END Payment request sent!"));
    assert!(storage.get_transaction("ABC123").await.unwrap().is_some());
}

#[tokio::test]
async fn test_health() {
    let (state, _storage) = app_state(AirtimeBehavior::Sent);
    let response = health(State(state)).await;
    assert_eq!(response.0.status, "OK");
    assert!(response.0.uptime_seconds >= 0.0);
}

#[tokio::test]
async fn test_transaction_lookup() {
    let (state, storage) = app_state(AirtimeBehavior::Sent);
    seed_pending(&storage, "ABC123", dec!(50)).await;

    let found = get_transaction(State(state.clone()), Path("ABC123".to_string()))
        .await
        .unwrap_or_else(|_| panic!("transaction should be found"));
    assert_eq!(found.0.requested_amount, dec!(50));

    let missing = get_transaction(State(state), Path("missing".to_string())).await;
    let Err(err) = missing else {
        panic!("missing transaction should error");
    };
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_disbursements_listed_for_follow_up() {
    let (state, storage) = app_state(AirtimeBehavior::Rejected);
    seed_pending(&storage, "ABC123", dec!(50)).await;
    seed_pending(&storage, "DEF456", dec!(80)).await;

    handle_payment_callback(
        State(state.clone()),
        Body::from(success_callback("ABC123", json!(50), "RCT1", json!(254712345678u64))),
    )
    .await;

    let listed = list_transactions(
        State(state.clone()),
        Query(ListTransactionsQuery {
            disbursement_status: Some(DisbursementStatus::Failed),
        }),
    )
    .await
    .unwrap_or_else(|_| panic!("listing should succeed"));
    assert_eq!(listed.0.len(), 1);
    assert_eq!(listed.0[0].correlation_id, "ABC123");

    let logs = get_app_logs(State(state), Query(LogsQuery { correlation_id: None }))
        .await
        .unwrap_or_else(|_| panic!("logs should be readable"));
    assert!(!logs.0.is_empty());
}

#[tokio::test]
async fn test_oversized_callback_is_acknowledged() {
    let (state, storage) = app_state(AirtimeBehavior::Sent);
    seed_pending(&storage, "ABC123", dec!(50)).await;

    let response = handle_payment_callback(
        State(state),
        Body::from(vec![b' '; CALLBACK_BODY_LIMIT + 1]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    let tx = storage.get_transaction("ABC123").await.unwrap().unwrap();
    assert_eq!(tx.status, PaymentStatus::Pending);
    assert_eq!(tx.callback_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_callback_completes_after_gateway_disconnects() {
    let (state, storage) = app_state(AirtimeBehavior::Hang);
    seed_pending(&storage, "ABC123", dec!(50)).await;

    // the request future is dropped while airtime is in flight
    let dropped = tokio::time::timeout(
        Duration::from_millis(50),
        handle_payment_callback(
            State(state),
            Body::from(success_callback("ABC123", json!(50), "RCT1", json!(254712345678u64))),
        ),
    )
    .await;
    assert!(dropped.is_err());

    tokio::time::sleep(Duration::from_secs(2)).await;

    let tx = storage.get_transaction("ABC123").await.unwrap().unwrap();
    assert_eq!(tx.status, PaymentStatus::Success);
    assert_eq!(tx.disbursement_status, DisbursementStatus::Failed);
    assert!(tx.disbursement_error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_ussd_unreadable_body_ends_session() {
    let (state, storage) = app_state(AirtimeBehavior::Sent);

    let request = Request::builder()
        .method("POST")
        .uri("/ussd")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"sessionId":"ATUid_1","phoneNumber":"+254712345678","text":"1*50"}"#))
        .unwrap();
    let form = Form::<UssdRequest>::from_request(request, &()).await;
    assert!(form.is_err());

    let response = handle_ussd(State(state), form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "END Missing session or phone number");
    assert!(storage.list_transactions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_logs_filtered_by_correlation_id() {
    let (state, storage) = app_state(AirtimeBehavior::Sent);
    seed_pending(&storage, "ABC123", dec!(50)).await;
    seed_pending(&storage, "DEF456", dec!(80)).await;

    for body in [
        success_callback("ABC123", json!(50), "RCT1", json!(254712345678u64)),
        failure_callback("DEF456", 1032, "Request cancelled by user"),
    ] {
        handle_payment_callback(State(state.clone()), Body::from(body)).await;
    }

    let logs = get_app_logs(
        State(state.clone()),
        Query(LogsQuery {
            correlation_id: Some("DEF456".to_string()),
        }),
    )
    .await
    .unwrap_or_else(|_| panic!("logs should be readable"));
    assert_eq!(logs.0.len(), 2);
    assert!(logs.0.iter().all(|l| l.correlation_id.as_deref() == Some("DEF456")));

    let all = get_app_logs(State(state), Query(LogsQuery { correlation_id: None }))
        .await
        .unwrap_or_else(|_| panic!("logs should be readable"));
    assert!(all.0.len() > logs.0.len());
}

#[tokio::test]
async fn test_router_acknowledges_callback_over_default_body_limit() {
    let (state, _storage) = app_state(AirtimeBehavior::Sent);
    let app = api_routes(state, Duration::from_secs(30));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payment-callback")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(vec![b' '; 3 * 1024 * 1024]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn test_router_ussd_routes() {
    let (state, storage) = app_state(AirtimeBehavior::Sent);
    let app = api_routes(state, Duration::from_secs(30));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ussd")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("sessionId=ATUid_1"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "END Missing session or phone number");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ussd")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("sessionId=ATUid_1&phoneNumber=%2B254712345678&serviceCode=%2A384%23&text=1%2A50"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.starts_with("END Payment request sent!"));
    assert!(storage.get_transaction("ABC123").await.unwrap().is_some());
}

#[test]
fn test_api_error_status_mapping() {
    let cases = [
        (TopupError::TransactionNotFound("x".into()), StatusCode::NOT_FOUND),
        (TopupError::DuplicateCorrelationId("x".into()), StatusCode::CONFLICT),
        (TopupError::InvalidAmount("x".into()), StatusCode::BAD_REQUEST),
        (TopupError::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
        (TopupError::HttpError("x".into()), StatusCode::BAD_GATEWAY),
        (TopupError::StorageError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
        assert_eq!(ApiError(err).into_response().status(), status);
    }
}
