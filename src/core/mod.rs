pub mod constants;
pub mod errors;
pub mod models;
pub mod reconciliation;
pub mod ussd;
pub mod verification;
