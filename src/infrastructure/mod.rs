pub mod logging;
pub mod providers;
pub mod storage;
