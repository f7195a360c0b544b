use crate::core::constants::PHONE_MATCH_DIGITS;
use crate::core::models::{PaymentReceipt, Transaction};
use rust_decimal::Decimal;

/// Why a reported payment was rejected. Carries both sides for the audit trail.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationMismatch {
    pub expected_amount: Decimal,
    pub received_amount: Decimal,
    pub expected_phone: String,
    pub received_phone: String,
    pub amount_matches: bool,
    pub phone_matches: bool,
}

/// Accepts a payment only when the amount is exactly the requested amount and the paying phone
/// shares its last nine digits with the expected payer.
pub fn verify_payment(transaction: &Transaction, receipt: &PaymentReceipt) -> Result<(), VerificationMismatch> {
    let amount_matches = receipt.amount == transaction.requested_amount;
    let phone_matches = phones_match(transaction.payer_phone.e164(), &receipt.phone);

    if amount_matches && phone_matches {
        return Ok(());
    }

    Err(VerificationMismatch {
        expected_amount: transaction.requested_amount,
        received_amount: receipt.amount,
        expected_phone: transaction.payer_phone.to_string(),
        received_phone: receipt.phone.clone(),
        amount_matches,
        phone_matches,
    })
}

pub fn phones_match(expected: &str, received: &str) -> bool {
    use crate::core::models::phone::trailing_digits;

    match (
        trailing_digits(expected, PHONE_MATCH_DIGITS),
        trailing_digits(received, PHONE_MATCH_DIGITS),
    ) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
