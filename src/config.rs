use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub currency: String,
    pub ussd_min_amount: u32,
    pub ussd_max_amount: u32,
    pub provider_timeout: Duration,
    pub store_timeout: Duration,
    pub claim_ttl: Duration,
    pub daraja_base_url: String,
    pub daraja_consumer_key: String,
    pub daraja_consumer_secret: String,
    pub daraja_shortcode: String,
    pub daraja_passkey: String,
    pub callback_base_url: String,
    pub at_base_url: String,
    pub at_username: String,
    pub at_api_key: String,
    pub at_sender_id: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("currency", &self.currency)
            .field("ussd_min_amount", &self.ussd_min_amount)
            .field("ussd_max_amount", &self.ussd_max_amount)
            .field("provider_timeout", &self.provider_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("claim_ttl", &self.claim_ttl)
            .field("daraja_base_url", &self.daraja_base_url)
            .field("daraja_consumer_key", &"<redacted>")
            .field("daraja_consumer_secret", &"<redacted>")
            .field("daraja_shortcode", &self.daraja_shortcode)
            .field("daraja_passkey", &"<redacted>")
            .field("callback_base_url", &self.callback_base_url)
            .field("at_base_url", &self.at_base_url)
            .field("at_username", &self.at_username)
            .field("at_api_key", &"<redacted>")
            .field("at_sender_id", &self.at_sender_id)
            .finish()
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();

        Self {
            port: parsed_or("PORT", 3000),
            log_level: var_or("LOG_LEVEL", "info"),
            currency: var_or("CURRENCY", "KES"),
            ussd_min_amount: parsed_or("USSD_MIN_AMOUNT", 20),
            ussd_max_amount: parsed_or("USSD_MAX_AMOUNT", 1000),
            provider_timeout: Duration::from_millis(parsed_or("PROVIDER_TIMEOUT_MS", 10_000)),
            store_timeout: Duration::from_millis(parsed_or("STORE_TIMEOUT_MS", 2_000)),
            claim_ttl: Duration::from_millis(parsed_or("CLAIM_TTL_MS", 60_000)),
            daraja_base_url: var_or("DARAJA_BASE_URL", "https://sandbox.safaricom.co.ke"),
            daraja_consumer_key: var_or("DARAJA_CONSUMER_KEY", ""),
            daraja_consumer_secret: var_or("DARAJA_CONSUMER_SECRET", ""),
            daraja_shortcode: var_or("DARAJA_SHORTCODE", "174379"),
            daraja_passkey: var_or("DARAJA_PASSKEY", ""),
            callback_base_url: var_or("BASE_URL", "http://localhost:3000"),
            at_base_url: var_or("AT_BASE_URL", "https://api.sandbox.africastalking.com"),
            at_username: var_or("AT_USERNAME", "sandbox"),
            at_api_key: var_or("AT_API_KEY", ""),
            at_sender_id: env::var("AT_SENDER_ID").ok().filter(|s| !s.is_empty()),
        }
    }
}

// Read by `main` only; collaborators receive their settings explicitly.
pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
