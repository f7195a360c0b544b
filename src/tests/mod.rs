mod api_tests;

use crate::core::errors::TopupError;
use crate::core::models::{PhoneNumber, Transaction};
use crate::core::reconciliation::{ReconciliationEngine, Timeouts};
use crate::core::ussd::{AmountPolicy, UssdMenu};
use crate::infrastructure::logging::in_memory::InMemoryLogging;
use crate::infrastructure::providers::{
    AirtimeDisburser, DisbursementResponse, Notifier, PaymentInitiator, RecipientStatus,
};
use crate::infrastructure::storage::TransactionStore;
use crate::infrastructure::storage::in_memory::InMemoryStorage;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

pub const PAYER: &str = "+254712345678";

#[derive(Clone, Copy)]
pub enum AirtimeBehavior {
    Sent,
    Rejected,
    Error,
    Hang,
}

pub struct FakeDisburser {
    behavior: AirtimeBehavior,
    pub calls: Mutex<Vec<(PhoneNumber, Decimal)>>,
}

impl FakeDisburser {
    pub fn new(behavior: AirtimeBehavior) -> Arc<Self> {
        Arc::new(FakeDisburser {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl AirtimeDisburser for FakeDisburser {
    async fn disburse(&self, phone: &PhoneNumber, amount: Decimal) -> Result<DisbursementResponse, TopupError> {
        self.calls.lock().await.push((phone.clone(), amount));
        // yield so concurrent callbacks interleave around the provider call
        tokio::task::yield_now().await;
        let status = |status: &str, error: Option<&str>| DisbursementResponse {
            responses: vec![RecipientStatus {
                phone_number: phone.e164().to_string(),
                amount: Some(format!("KES {}", amount)),
                status: status.to_string(),
                error_message: error.map(String::from),
                request_id: Some("ATQid_test".to_string()),
            }],
        };
        match self.behavior {
            AirtimeBehavior::Sent => Ok(status("Sent", None)),
            AirtimeBehavior::Rejected => Ok(status("Failed", Some("InsufficientCredit"))),
            AirtimeBehavior::Error => Err(TopupError::DisbursementError("connection reset".to_string())),
            AirtimeBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(status("Sent", None))
            }
        }
    }
}

pub struct FakeNotifier {
    fail: bool,
    pub messages: Mutex<Vec<(PhoneNumber, String)>>,
}

impl FakeNotifier {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(FakeNotifier {
            fail,
            messages: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, phone: &PhoneNumber, message: &str) -> Result<(), TopupError> {
        self.messages.lock().await.push((phone.clone(), message.to_string()));
        if self.fail {
            return Err(TopupError::NotificationError("SMS gateway down".to_string()));
        }
        Ok(())
    }
}

pub struct FakeInitiator {
    result: Result<String, String>,
    pub calls: AtomicUsize,
}

impl FakeInitiator {
    pub fn returning(correlation_id: &str) -> Arc<Self> {
        Arc::new(FakeInitiator {
            result: Ok(correlation_id.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(FakeInitiator {
            result: Err("HTTP 503".to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentInitiator for FakeInitiator {
    async fn initiate_payment(&self, _phone: &PhoneNumber, _amount: Decimal) -> Result<String, TopupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(TopupError::PaymentInitiationError)
    }
}

pub struct TestHarness {
    pub engine: ReconciliationEngine<InMemoryStorage, InMemoryLogging>,
    pub storage: InMemoryStorage,
    pub logging: InMemoryLogging,
    pub disburser: Arc<FakeDisburser>,
    pub notifier: Arc<FakeNotifier>,
}

pub fn test_timeouts() -> Timeouts {
    Timeouts {
        store: Duration::from_secs(1),
        provider: Duration::from_millis(500),
        claim_ttl: Duration::from_secs(5),
    }
}

pub fn create_test_engine(airtime: AirtimeBehavior, notification_fails: bool) -> TestHarness {
    create_test_engine_with(airtime, notification_fails, test_timeouts())
}

pub fn create_test_engine_with(
    airtime: AirtimeBehavior,
    notification_fails: bool,
    timeouts: Timeouts,
) -> TestHarness {
    let storage = InMemoryStorage::new();
    let logging = InMemoryLogging::new();
    let disburser = FakeDisburser::new(airtime);
    let notifier = FakeNotifier::new(notification_fails);
    let engine = ReconciliationEngine::new(
        storage.clone(),
        logging.clone(),
        disburser.clone(),
        notifier.clone(),
        "KES".to_string(),
        timeouts,
    );
    TestHarness {
        engine,
        storage,
        logging,
        disburser,
        notifier,
    }
}

pub fn create_test_menu(
    initiator: Arc<FakeInitiator>,
) -> (UssdMenu<InMemoryStorage, InMemoryLogging>, InMemoryStorage) {
    let storage = InMemoryStorage::new();
    let menu = UssdMenu::new(
        storage.clone(),
        InMemoryLogging::new(),
        initiator,
        AmountPolicy::default(),
        test_timeouts(),
    );
    (menu, storage)
}

pub async fn seed_pending(storage: &InMemoryStorage, correlation_id: &str, amount: Decimal) -> Transaction {
    let phone = PhoneNumber::parse(PAYER).unwrap();
    storage
        .create_transaction(Transaction::pending(
            correlation_id.to_string(),
            Some("ATUid_session".to_string()),
            phone,
            amount,
        ))
        .await
        .unwrap()
}

pub fn success_callback(correlation_id: &str, amount: Value, receipt: &str, phone: Value) -> Vec<u8> {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": correlation_id,
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": amount },
                        { "Name": "MpesaReceiptNumber", "Value": receipt },
                        { "Name": "Balance" },
                        { "Name": "TransactionDate", "Value": 20191219102115u64 },
                        { "Name": "PhoneNumber", "Value": phone }
                    ]
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

pub fn failure_callback(correlation_id: &str, code: i64, desc: &str) -> Vec<u8> {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": correlation_id,
                "ResultCode": code,
                "ResultDesc": desc
            }
        }
    })
    .to_string()
    .into_bytes()
}
