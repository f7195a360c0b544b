use crate::core::errors::TopupError;
use crate::core::models::PhoneNumber;
use crate::infrastructure::providers::PaymentInitiator;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const CALLBACK_PATH: &str = "/payment-callback";

#[derive(Clone)]
pub struct DarajaConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    /// Public base URL the gateway posts results back to.
    pub callback_base_url: String,
    pub timeout: Duration,
}

pub struct DarajaClient {
    config: DarajaConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushRequest<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: u64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: String,
    account_reference: &'static str,
    transaction_desc: &'static str,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
}

/// Gateway timestamps are East Africa Time, `YYYYMMDDHHMMSS`.
pub fn gateway_timestamp(now: DateTime<Utc>) -> String {
    const FORMAT: &str = "%Y%m%d%H%M%S";
    match FixedOffset::east_opt(3 * 3600) {
        Some(eat) => now.with_timezone(&eat).format(FORMAT).to_string(),
        None => now.format(FORMAT).to_string(),
    }
}

pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

/// STK push only reaches Safaricom lines: `2547` followed by eight digits.
pub fn is_mpesa_msisdn(msisdn: &str) -> bool {
    msisdn.len() == 12 && msisdn.starts_with("2547") && msisdn.chars().all(|c| c.is_ascii_digit())
}

impl DarajaClient {
    pub fn new(config: DarajaConfig) -> Result<Self, TopupError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(DarajaClient { config, client })
    }

    async fn access_token(&self) -> Result<String, TopupError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TopupError::PaymentInitiationError(format!(
                "token request returned HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentInitiator for DarajaClient {
    async fn initiate_payment(&self, phone: &PhoneNumber, amount: Decimal) -> Result<String, TopupError> {
        let msisdn = phone.msisdn();
        if !is_mpesa_msisdn(msisdn) {
            return Err(TopupError::InvalidPhoneNumber(format!(
                "{} is not an M-Pesa number",
                msisdn
            )));
        }
        let amount = amount
            .to_u64()
            .filter(|_| amount.fract().is_zero())
            .ok_or_else(|| TopupError::InvalidAmount(format!("{} is not a whole amount", amount)))?;

        let token = self.access_token().await?;
        let timestamp = gateway_timestamp(Utc::now());
        let request = StkPushRequest {
            business_short_code: &self.config.shortcode,
            password: stk_password(&self.config.shortcode, &self.config.passkey, &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount,
            party_a: msisdn,
            party_b: &self.config.shortcode,
            phone_number: msisdn,
            callback_url: format!("{}{}", self.config.callback_base_url, CALLBACK_PATH),
            account_reference: "QuickAirtime",
            transaction_desc: "Airtime Purchase",
        };

        let resp = self
            .client
            .post(format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TopupError::PaymentInitiationError(format!(
                "STK push returned HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: StkPushResponse = resp.json().await?;
        debug!(?body, "STK push accepted");
        match (body.response_code.as_deref(), body.checkout_request_id) {
            (Some("0") | None, Some(id)) if !id.is_empty() => Ok(id),
            (code, _) => Err(TopupError::PaymentInitiationError(format!(
                "STK push rejected (code {}): {}",
                code.unwrap_or("none"),
                body.response_description.unwrap_or_default()
            ))),
        }
    }
}
