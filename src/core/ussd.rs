use crate::core::constants::PAYMENT_INITIATED;
use crate::core::errors::TopupError;
use crate::core::models::{PhoneNumber, Transaction};
use crate::core::reconciliation::{Timeouts, bounded};
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::providers::PaymentInitiator;
use crate::infrastructure::storage::TransactionStore;
use rust_decimal::Decimal;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A USSD gateway reply: `CON` keeps the session open, `END` closes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UssdReply {
    Continue(String),
    End(String),
}

impl UssdReply {
    pub fn is_end(&self) -> bool {
        matches!(self, UssdReply::End(_))
    }

    pub fn text(&self) -> &str {
        match self {
            UssdReply::Continue(t) | UssdReply::End(t) => t,
        }
    }
}

impl fmt::Display for UssdReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UssdReply::Continue(t) => write!(f, "CON {}", t),
            UssdReply::End(t) => write!(f, "END {}", t),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AmountPolicy {
    pub currency: String,
    pub min: u32,
    pub max: u32,
}

impl Default for AmountPolicy {
    fn default() -> Self {
        AmountPolicy {
            currency: "KES".to_string(),
            min: 20,
            max: 1000,
        }
    }
}

impl AmountPolicy {
    /// Whole currency units within the inclusive bounds.
    pub fn parse(&self, input: &str) -> Option<u32> {
        let amount: u32 = input.trim().parse().ok()?;
        (self.min..=self.max).contains(&amount).then_some(amount)
    }
}

/// Three-stage airtime menu: welcome, amount prompt, confirmation. Only a valid amount at the
/// last stage touches the outside world (payment prompt plus a pending transaction).
pub struct UssdMenu<S: TransactionStore, L: LoggingService> {
    storage: S,
    logging: L,
    initiator: Arc<dyn PaymentInitiator>,
    policy: AmountPolicy,
    timeouts: Timeouts,
}

impl<S: TransactionStore, L: LoggingService> UssdMenu<S, L> {
    pub fn new(
        storage: S,
        logging: L,
        initiator: Arc<dyn PaymentInitiator>,
        policy: AmountPolicy,
        timeouts: Timeouts,
    ) -> Self {
        UssdMenu {
            storage,
            logging,
            initiator,
            policy,
            timeouts,
        }
    }

    /// `text` is the accumulated `*`-separated input for the session.
    pub async fn handle(&self, session_id: &str, raw_phone: &str, text: &str) -> UssdReply {
        let inputs: Vec<&str> = text.trim().split('*').filter(|s| !s.is_empty()).collect();

        match inputs.as_slice() {
            [] => UssdReply::Continue("Welcome to Quick Airtime Top-Up\n1. Buy Airtime\n0. Exit".to_string()),
            ["1"] => UssdReply::Continue(format!(
                "Enter amount in {}\n(Min: {}, Max: {})",
                self.policy.currency, self.policy.min, self.policy.max
            )),
            ["0"] => UssdReply::End("Thank you for using Quick Airtime! Goodbye".to_string()),
            ["1", amount] => match self.policy.parse(amount) {
                Some(amount) => self.buy_airtime(session_id, raw_phone, amount).await,
                None => UssdReply::End(format!(
                    "Invalid amount.\nPlease enter between {} {} and {}.",
                    self.policy.currency, self.policy.min, self.policy.max
                )),
            },
            [_] | [_, _] => UssdReply::End("Invalid option. Dial again to restart.".to_string()),
            _ => UssdReply::End("Session ended. Too many inputs.\nDial again to start over.".to_string()),
        }
    }

    async fn buy_airtime(&self, session_id: &str, raw_phone: &str, amount: u32) -> UssdReply {
        match self.start_payment(session_id, raw_phone, amount).await {
            Ok(transaction) => {
                info!(
                    correlation_id = %transaction.correlation_id,
                    phone = %transaction.payer_phone,
                    amount,
                    "STK push initiated"
                );
                UssdReply::End(format!(
                    "Payment request sent!\nCheck your phone and approve {} {} to receive airtime instantly.",
                    self.policy.currency, amount
                ))
            }
            Err(e) => {
                error!(session_id, phone = raw_phone, amount, error = %e, "STK push initiation failed");
                UssdReply::End(
                    "Sorry, we couldn't process your request right now.\nPlease try again in a few minutes."
                        .to_string(),
                )
            }
        }
    }

    async fn start_payment(&self, session_id: &str, raw_phone: &str, amount: u32) -> Result<Transaction, TopupError> {
        let phone = PhoneNumber::parse(raw_phone)?;
        let amount = Decimal::from(amount);

        let correlation_id = match tokio::time::timeout(
            self.timeouts.provider,
            self.initiator.initiate_payment(&phone, amount),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(TopupError::Timeout(format!(
                    "payment initiation exceeded {}ms",
                    self.timeouts.provider.as_millis()
                )));
            }
        };

        let pending = Transaction::pending(correlation_id.clone(), Some(session_id.to_string()), phone, amount);
        let transaction = bounded(
            self.timeouts.store,
            "create transaction",
            self.storage.create_transaction(pending),
        )
        .await
        .inspect_err(|e| {
            // The payer has already been prompted; the callback for this id will not match.
            error!(correlation_id = %correlation_id, error = %e, "payment prompted but transaction not stored");
        })?;

        if let Err(e) = self
            .logging
            .log_action(
                PAYMENT_INITIATED,
                json!({
                    "session_id": session_id,
                    "phone": transaction.payer_phone,
                    "amount": amount.to_string(),
                }),
                Some(&correlation_id),
            )
            .await
        {
            warn!(error = %e, "failed to write audit log");
        }

        Ok(transaction)
    }
}
