use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::ToSchema;

pub const AMOUNT_ITEM: &str = "Amount";
pub const RECEIPT_ITEM: &str = "MpesaReceiptNumber";
pub const PHONE_ITEM: &str = "PhoneNumber";

/// Outer envelope of an M-Pesa STK push result notification: `{"Body": {"stkCallback": {...}}}`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    #[schema(value_type = Object)]
    pub value: Option<Value>,
}

/// Success metadata pulled out of a callback by item name.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentReceipt {
    pub amount: Decimal,
    pub receipt_id: String,
    pub phone: String,
}

impl StkCallback {
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let envelope: CallbackEnvelope = serde_json::from_value(payload.clone()).ok()?;
        Some(envelope.body.stk_callback)
    }

    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    fn item(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|i| i.name == name)?
            .value
            .as_ref()
    }

    /// `None` when any of amount, receipt or phone is missing or unreadable.
    pub fn receipt(&self) -> Option<PaymentReceipt> {
        let amount = match self.item(AMOUNT_ITEM)? {
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok()?,
            Value::String(s) => Decimal::from_str(s.trim()).ok()?,
            _ => return None,
        };
        let receipt_id = scalar_to_string(self.item(RECEIPT_ITEM)?)?;
        let phone = scalar_to_string(self.item(PHONE_ITEM)?)?;
        Some(PaymentReceipt {
            amount,
            receipt_id,
            phone,
        })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}
