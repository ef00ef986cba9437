use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// HMAC secret for token signing. Every token ever issued verifies
    /// against this value; rotating it invalidates the installed base.
    pub secret_key: String,
    /// Bearer credential for the service/admin surface (the trusted bot
    /// process and operator tooling).
    pub service_token: String,
    /// Clients older than this are told to update. None disables the check.
    pub min_client_version: Option<String>,
    pub expiry_sweep_secs: u64,
    pub warning_sweep_secs: u64,
    pub warning_window_days: i64,
    pub notify_poll_secs: u64,
    pub notify_batch: i64,
    /// Where the in-process poller posts "license ready" events. None means
    /// an out-of-process notifier drives delivery over the HTTP boundary.
    pub notify_webhook_url: Option<String>,
    /// Where expiry/warning/grant events are posted. None logs them only.
    pub entitlement_webhook_url: Option<String>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("KEYWARDEN_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let secret_key = env::var("SECRET_KEY").unwrap_or_else(|_| {
            if !dev_mode {
                tracing::warn!("SECRET_KEY not set; falling back to the dev default. Tokens are forgeable.");
            }
            "dev-secret-change-me".to_string()
        });

        let service_token = env::var("SERVICE_TOKEN").unwrap_or_else(|_| {
            if !dev_mode {
                tracing::warn!("SERVICE_TOKEN not set; falling back to the dev default.");
            }
            "dev-service-token".to_string()
        });

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "keywarden.db".to_string()),
            secret_key,
            service_token,
            min_client_version: env::var("MIN_CLIENT_VERSION").ok().filter(|v| !v.is_empty()),
            expiry_sweep_secs: env_parse("EXPIRY_SWEEP_SECS", 60),
            warning_sweep_secs: env_parse("WARNING_SWEEP_SECS", 3600),
            warning_window_days: env_parse("WARNING_WINDOW_DAYS", 3),
            notify_poll_secs: env_parse("NOTIFY_POLL_SECS", 5),
            notify_batch: env_parse("NOTIFY_BATCH", 10),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok().filter(|v| !v.is_empty()),
            entitlement_webhook_url: env::var("ENTITLEMENT_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            rate_limit_per_second: env_parse("RATE_LIMIT_PER_SECOND", 5),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", 10),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
