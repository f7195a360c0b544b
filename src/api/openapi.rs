use utoipa::OpenApi;

use crate::{
    api::models::{ErrorResponse, HealthResponse, UssdRequest},
    core::models::{
        AppLog, CallbackEnvelope, DisbursementStatus, PaymentStatus, Transaction,
        callback::{CallbackBody, CallbackMetadata, MetadataItem, StkCallback},
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::handlers::handle_payment_callback,
        super::handlers::handle_ussd,
        super::handlers::health,
        super::handlers::get_transaction,
        super::handlers::list_transactions,
        super::handlers::get_app_logs
    ),
    components(schemas(
        CallbackEnvelope,
        CallbackBody,
        StkCallback,
        CallbackMetadata,
        MetadataItem,
        UssdRequest,
        HealthResponse,
        ErrorResponse,
        Transaction,
        PaymentStatus,
        DisbursementStatus,
        AppLog
    )),
    info(
        title = "Airtime Top-Up API",
        description = "USSD airtime purchases paid by M-Pesa STK push, reconciled from payment callbacks",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;
