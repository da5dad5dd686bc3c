use chrono::Duration as ChronoDuration;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::order::ScheduleSettings;
use crate::domain::pricing::{PolicyError, PricingPolicy};
use crate::models::CurrencyCode;
use crate::notifications::dispatcher::DispatcherConfig;
use crate::notifications::dlq::DEFAULT_DLQ_CAPACITY;
use crate::utils::RetryPolicy;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read once at startup from the environment (a `.env` file is honored).
// Everything has a development default except the webhook secret, which
// must be set when APP_ENV=production.
//
// ============================================================================

const DEV_WEBHOOK_SECRET: &str = "whsec_development_only";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable '{0}'")]
    Missing(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub metrics_enabled: bool,

    /// Postgres when set, in-memory stores otherwise
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    pub webhook_secret: String,
    pub signature_tolerance: ChronoDuration,

    pub pricing: PricingPolicy,
    pub settlement_currency: CurrencyCode,

    pub rate_freshness: ChronoDuration,
    pub rate_refresh_interval: Duration,
    pub provider_timeout: Duration,

    pub gateway_timeout: Duration,
    pub payment_base_url: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,

    pub notification_timeout: Duration,
    pub notification_retry: RetryPolicy,
    pub same_recipient_delay: Duration,
    pub dead_letter_capacity: usize,

    pub shipping_buffer_weeks: u32,
    pub default_completion_weeks: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            metrics_enabled: true,
            database_url: None,
            database_max_connections: 10,
            webhook_secret: DEV_WEBHOOK_SECRET.to_string(),
            signature_tolerance: ChronoDuration::minutes(5),
            pricing: PricingPolicy::default(),
            settlement_currency: CurrencyCode::usd(),
            rate_freshness: ChronoDuration::minutes(15),
            rate_refresh_interval: Duration::from_secs(300),
            provider_timeout: Duration::from_secs(5),
            gateway_timeout: Duration::from_secs(10),
            payment_base_url: "http://localhost:8080/sandbox".to_string(),
            checkout_success_url: "http://localhost:3000/checkout/success".to_string(),
            checkout_cancel_url: "http://localhost:3000/checkout/cancel".to_string(),
            notification_timeout: Duration::from_secs(10),
            notification_retry: RetryPolicy::default(),
            same_recipient_delay: Duration::from_millis(500),
            dead_letter_capacity: DEFAULT_DLQ_CAPACITY,
            shipping_buffer_weeks: 1,
            default_completion_weeks: 2,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|name| std::env::var(name).ok())?;
        tracing::info!(
            host = %config.server_host,
            port = config.server_port,
            postgres = config.database_url.is_some(),
            settlement_currency = %config.settlement_currency,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Build from any variable source; unset variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let defaults = Self::default();

        let production = env
            .get("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let webhook_secret = match env.get("PAYMENT_WEBHOOK_SECRET") {
            Some(secret) => secret,
            None if production => return Err(ConfigError::Missing("PAYMENT_WEBHOOK_SECRET")),
            None => defaults.webhook_secret,
        };

        let pricing = match (env.get("PRICING_MARKUP_RATE"), env.get("PRICING_MIN_COMMISSION")) {
            (None, None) => defaults.pricing,
            (markup, floor) => PricingPolicy::parse(
                markup.as_deref().unwrap_or("0.30"),
                floor.as_deref().unwrap_or("10"),
            )
            .map_err(|e| ConfigError::Invalid {
                name: match e {
                    PolicyError::MarkupRate { .. } => "PRICING_MARKUP_RATE",
                    PolicyError::MinCommission { .. } => "PRICING_MIN_COMMISSION",
                },
                reason: e.to_string(),
            })?,
        };

        let settlement_currency = match env.get("SETTLEMENT_CURRENCY") {
            Some(code) => CurrencyCode::new(&code).map_err(|reason| ConfigError::Invalid {
                name: "SETTLEMENT_CURRENCY",
                reason,
            })?,
            None => defaults.settlement_currency,
        };

        let notification_retry = RetryPolicy {
            max_attempts: env.parse("NOTIFICATION_MAX_ATTEMPTS", defaults.notification_retry.max_attempts)?,
            initial_delay: env.millis(
                "NOTIFICATION_RETRY_DELAY_MS",
                defaults.notification_retry.initial_delay,
            )?,
            ..defaults.notification_retry
        };
        if notification_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "NOTIFICATION_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            server_host: env.get("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: env.parse("SERVER_PORT", defaults.server_port)?,
            metrics_enabled: env.parse("METRICS_ENABLED", defaults.metrics_enabled)?,
            database_url: env.get("DATABASE_URL"),
            database_max_connections: env.parse("DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?,
            webhook_secret,
            signature_tolerance: ChronoDuration::seconds(
                env.parse("WEBHOOK_TOLERANCE_SECS", defaults.signature_tolerance.num_seconds())?,
            ),
            pricing,
            settlement_currency,
            rate_freshness: ChronoDuration::seconds(
                env.parse("RATE_FRESHNESS_SECS", defaults.rate_freshness.num_seconds())?,
            ),
            rate_refresh_interval: env.secs("RATE_REFRESH_INTERVAL_SECS", defaults.rate_refresh_interval)?,
            provider_timeout: env.millis("RATE_PROVIDER_TIMEOUT_MS", defaults.provider_timeout)?,
            gateway_timeout: env.millis("PAYMENT_GATEWAY_TIMEOUT_MS", defaults.gateway_timeout)?,
            payment_base_url: env.get("PAYMENT_BASE_URL").unwrap_or(defaults.payment_base_url),
            checkout_success_url: env.get("CHECKOUT_SUCCESS_URL").unwrap_or(defaults.checkout_success_url),
            checkout_cancel_url: env.get("CHECKOUT_CANCEL_URL").unwrap_or(defaults.checkout_cancel_url),
            notification_timeout: env.millis("NOTIFICATION_TIMEOUT_MS", defaults.notification_timeout)?,
            notification_retry,
            same_recipient_delay: env.millis("SAME_RECIPIENT_DELAY_MS", defaults.same_recipient_delay)?,
            dead_letter_capacity: env.parse("DEAD_LETTER_CAPACITY", defaults.dead_letter_capacity)?,
            shipping_buffer_weeks: env.parse("SHIPPING_BUFFER_WEEKS", defaults.shipping_buffer_weeks)?,
            default_completion_weeks: env.parse("DEFAULT_COMPLETION_WEEKS", defaults.default_completion_weeks)?,
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server_host.clone(), self.server_port)
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            send_timeout: self.notification_timeout,
            retry_policy: self.notification_retry.clone(),
            same_recipient_delay: self.same_recipient_delay,
        }
    }

    pub fn schedule(&self) -> ScheduleSettings {
        ScheduleSettings {
            shipping_buffer_weeks: self.shipping_buffer_weeks,
            default_completion_weeks: self.default_completion_weeks,
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn millis(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let ms = self.parse(name, default.as_millis() as u64)?;
        Ok(Duration::from_millis(ms))
    }

    fn secs(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs = self.parse(name, default.as_secs())?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_port, 8080);
        assert!(config.database_url.is_none());
        assert_eq!(config.settlement_currency, CurrencyCode::usd());
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.rate_freshness, ChronoDuration::minutes(15));
    }

    #[test]
    fn test_bad_commission_floor_names_its_variable() {
        let err = AppConfig::from_lookup(lookup(&[("PRICING_MIN_COMMISSION", "ten")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PRICING_MIN_COMMISSION", .. }));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SERVER_PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/tailor"),
            ("PRICING_MARKUP_RATE", "0.25"),
            ("PRICING_MIN_COMMISSION", "5"),
            ("SHIPPING_BUFFER_WEEKS", "2"),
            ("NOTIFICATION_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();

        assert_eq!(config.server_port, 9000);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/tailor"));
        assert_eq!(config.pricing.min_commission, BigDecimal::from(5));
        assert_eq!(config.schedule().shipping_buffer_weeks, 2);
        assert_eq!(config.dispatcher().send_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_production_requires_webhook_secret() {
        let result = AppConfig::from_lookup(lookup(&[("APP_ENV", "production")]));
        assert!(matches!(result, Err(ConfigError::Missing("PAYMENT_WEBHOOK_SECRET"))));

        let config = AppConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("PAYMENT_WEBHOOK_SECRET", "whsec_live"),
        ]))
        .unwrap();
        assert_eq!(config.webhook_secret, "whsec_live");
    }

    #[test]
    fn test_bad_numbers_are_reported_by_name() {
        let err = AppConfig::from_lookup(lookup(&[("SERVER_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }
}
