pub mod api;
pub mod config;
pub mod core;
pub mod infrastructure;

pub use crate::core::errors::TopupError;
pub use crate::core::reconciliation::{ReconcileOutcome, ReconciliationEngine};
pub use crate::core::ussd::{UssdMenu, UssdReply};
pub use crate::infrastructure::logging::in_memory::InMemoryLogging;
pub use crate::infrastructure::storage::in_memory::InMemoryStorage;

#[cfg(test)]
mod tests;
