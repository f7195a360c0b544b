use crate::core::errors::TopupError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const COUNTRY_CODE: &str = "254";
pub const SUBSCRIBER_DIGITS: usize = 9;

/// A subscriber phone number in canonical E.164 form (`+254XXXXXXXXX`).
///
/// Accepted inputs, after stripping spaces, dashes and parentheses:
///
/// | input           | example          |
/// |-----------------|------------------|
/// | `+254` + 9      | `+254712345678`  |
/// | `254` + 9       | `254712345678`   |
/// | `0` + 9         | `0712345678`     |
/// | bare 9 digits   | `712345678`      |
///
/// Anything else is rejected. Two renderings are exposed: [`PhoneNumber::e164`] for storage and
/// airtime/SMS providers, and [`PhoneNumber::msisdn`] (no leading `+`) for the M-Pesa gateway.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, TopupError> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();

        let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(TopupError::InvalidPhoneNumber(raw.to_string()));
        }
        // a leading '+' must be followed by the country code
        if cleaned.starts_with('+') && !digits.starts_with(COUNTRY_CODE) {
            return Err(TopupError::InvalidPhoneNumber(raw.to_string()));
        }

        let subscriber = if digits.len() == COUNTRY_CODE.len() + SUBSCRIBER_DIGITS
            && digits.starts_with(COUNTRY_CODE)
        {
            &digits[COUNTRY_CODE.len()..]
        } else if digits.len() == SUBSCRIBER_DIGITS + 1 && digits.starts_with('0') {
            &digits[1..]
        } else if digits.len() == SUBSCRIBER_DIGITS && !digits.starts_with('0') {
            digits
        } else {
            return Err(TopupError::InvalidPhoneNumber(raw.to_string()));
        };

        if subscriber.starts_with('0') {
            return Err(TopupError::InvalidPhoneNumber(raw.to_string()));
        }

        Ok(PhoneNumber(format!("+{}{}", COUNTRY_CODE, subscriber)))
    }

    pub fn e164(&self) -> &str {
        &self.0
    }

    /// Gateway form, e.g. `254712345678`.
    pub fn msisdn(&self) -> &str {
        &self.0[1..]
    }

    pub fn subscriber(&self) -> &str {
        &self.0[1 + COUNTRY_CODE.len()..]
    }
}

/// Last `count` ASCII digits of `value`, ignoring any other characters.
/// Returns `None` when fewer than `count` digits are present.
pub fn trailing_digits(value: &str, count: usize) -> Option<String> {
    let digits: Vec<char> = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < count {
        return None;
    }
    Some(digits[digits.len() - count..].iter().collect())
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = TopupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PhoneNumber::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}
