use crate::core::errors::TopupError;
use crate::core::models::PhoneNumber;
use crate::infrastructure::providers::{AirtimeDisburser, DisbursementResponse, Notifier, RecipientStatus};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const SMS_SUCCESS_STATUS: &str = "Success";

#[derive(Clone)]
pub struct AfricasTalkingConfig {
    pub base_url: String,
    pub username: String,
    pub api_key: String,
    pub sender_id: Option<String>,
    pub currency: String,
    pub timeout: Duration,
}

/// Airtime and SMS over one authenticated HTTP client.
pub struct AfricasTalkingClient {
    config: AfricasTalkingConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AirtimeSendResponse {
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    responses: Vec<RecipientStatus>,
}

#[derive(Debug, Deserialize)]
struct SmsSendResponse {
    #[serde(rename = "SMSMessageData")]
    sms_message_data: SmsMessageData,
}

#[derive(Debug, Deserialize)]
struct SmsMessageData {
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Recipients", default)]
    recipients: Vec<SmsRecipient>,
}

#[derive(Debug, Deserialize)]
struct SmsRecipient {
    #[serde(default)]
    number: Option<String>,
    status: String,
}

/// Airtime amounts are sent as `"<currency> <amount>"`, e.g. `KES 50`.
pub fn airtime_amount(currency: &str, amount: Decimal) -> String {
    format!("{} {}", currency, amount.normalize())
}

impl AfricasTalkingClient {
    pub fn new(config: AfricasTalkingConfig) -> Result<Self, TopupError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(AfricasTalkingClient { config, client })
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<reqwest::Response, TopupError> {
        let resp = self
            .client
            .post(format!("{}{}", self.config.base_url, path))
            .header("apiKey", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TopupError::HttpError(format!(
                "{} returned HTTP {}: {}",
                path,
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl AirtimeDisburser for AfricasTalkingClient {
    async fn disburse(&self, phone: &PhoneNumber, amount: Decimal) -> Result<DisbursementResponse, TopupError> {
        let recipients = json!([{
            "phoneNumber": phone.e164(),
            "amount": airtime_amount(&self.config.currency, amount),
        }]);
        let form = [
            ("username", self.config.username.clone()),
            ("recipients", recipients.to_string()),
        ];

        let resp = self
            .post_form("/version1/airtime/send", &form)
            .await
            .map_err(|e| TopupError::DisbursementError(e.to_string()))?;
        let body: AirtimeSendResponse = resp.json().await?;
        debug!(?body, "airtime send response");

        if body.responses.is_empty() {
            return Err(TopupError::DisbursementError(
                body.error_message.unwrap_or_else(|| "empty airtime response".to_string()),
            ));
        }
        Ok(DisbursementResponse {
            responses: body.responses,
        })
    }
}

#[async_trait]
impl Notifier for AfricasTalkingClient {
    async fn notify(&self, phone: &PhoneNumber, message: &str) -> Result<(), TopupError> {
        let mut form = vec![
            ("username", self.config.username.clone()),
            ("to", phone.e164().to_string()),
            ("message", message.to_string()),
        ];
        if let Some(sender) = &self.config.sender_id {
            form.push(("from", sender.clone()));
        }

        let resp = self
            .post_form("/version1/messaging", &form)
            .await
            .map_err(|e| TopupError::NotificationError(e.to_string()))?;
        let body: SmsSendResponse = resp.json().await?;

        match body.sms_message_data.recipients.first() {
            Some(r) if r.status == SMS_SUCCESS_STATUS => Ok(()),
            Some(r) => Err(TopupError::NotificationError(format!(
                "SMS to {} rejected: {}",
                r.number.as_deref().unwrap_or(phone.e164()),
                r.status
            ))),
            None => Err(TopupError::NotificationError(
                body.sms_message_data
                    .message
                    .unwrap_or_else(|| "no SMS recipients accepted".to_string()),
            )),
        }
    }
}
