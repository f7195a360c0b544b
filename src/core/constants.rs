// Audit log actions
pub const PAYMENT_INITIATED: &str = "PAYMENT_INITIATED";
pub const CALLBACK_RECEIVED: &str = "CALLBACK_RECEIVED";
pub const PAYMENT_FAILED: &str = "PAYMENT_FAILED";
pub const VERIFICATION_MISMATCH: &str = "VERIFICATION_MISMATCH";
pub const PAYMENT_CONFIRMED: &str = "PAYMENT_CONFIRMED";
pub const AIRTIME_SENT: &str = "AIRTIME_SENT";
pub const AIRTIME_FAILED: &str = "AIRTIME_FAILED";
pub const NOTIFICATION_FAILED: &str = "NOTIFICATION_FAILED";

pub const VERIFICATION_MISMATCH_REASON: &str = "payment verification mismatch";
pub const UNKNOWN_FAILURE_REASON: &str = "Unknown payment failure";

/// Trailing digits compared when matching the paying phone against the expected payer.
pub const PHONE_MATCH_DIGITS: usize = 9;

pub const CALLBACK_ACK: &str = "OK";

/// Callback bodies larger than this are acknowledged without being processed.
pub const CALLBACK_BODY_LIMIT: usize = 1024 * 1024;
