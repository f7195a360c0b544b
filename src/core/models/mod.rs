pub mod audit;
pub mod callback;
pub mod phone;
pub mod transaction;

pub use audit::AppLog;
pub use callback::{CallbackEnvelope, PaymentReceipt, StkCallback};
pub use phone::PhoneNumber;
pub use transaction::{DisbursementStatus, DisbursementUpdate, PaymentStatus, StatusUpdate, Transaction};
