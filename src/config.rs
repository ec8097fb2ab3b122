use crate::keywords;
use crate::models::WalletRollup;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Durable store URL. `None` runs memory-only.
    pub database_url: Option<String>,
    pub local_dev_mode: bool,
    pub db_connect_attempts: u32,
    pub db_retry_delay: Duration,
    pub db_timeout: Duration,
    pub wallet_rollup: WalletRollup,
    pub engage_keywords: Vec<String>,
    pub verida_api_url: String,
    pub verida_legacy_api_url: String,
    pub verida_timeout: Duration,
    pub default_did: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            database_url: None,
            local_dev_mode: false,
            db_connect_attempts: 3,
            db_retry_delay: Duration::from_millis(2000),
            db_timeout: Duration::from_millis(5000),
            wallet_rollup: WalletRollup::Average,
            engage_keywords: keywords::default_keywords(),
            verida_api_url: "https://api.verida.ai".to_string(),
            verida_legacy_api_url: "https://api.verida.io".to_string(),
            verida_timeout: Duration::from_millis(10_000),
            default_did: None,
        }
    }
}

fn env_millis(name: &str, default: Duration) -> anyhow::Result<Duration> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| anyhow::anyhow!("{} must be a number of milliseconds", name)),
        _ => Ok(default),
    }
}

fn env_url(name: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Parses a comma separated keyword list, dropping blanks and case duplicates.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for keyword in raw.split(',').map(|k| k.trim().to_lowercase()) {
        if !keyword.is_empty() && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }
    keywords
}

/// First 20 characters of a connection string, safe on any UTF-8 input.
fn redacted_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let local_dev_mode = std::env::var("USE_LOCAL_DEV_MODE")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("DB_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| {
                if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                    anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                }
                Ok(url)
            })
            .transpose()?;

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            database_url,
            local_dev_mode,
            db_connect_attempts: match std::env::var("DB_CONNECT_ATTEMPTS") {
                Ok(raw) => raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| anyhow::anyhow!("DB_CONNECT_ATTEMPTS must be a positive number"))?,
                Err(_) => defaults.db_connect_attempts,
            },
            db_retry_delay: env_millis("DB_RETRY_DELAY_MS", defaults.db_retry_delay)?,
            db_timeout: env_millis("DB_TIMEOUT_MS", defaults.db_timeout)?,
            wallet_rollup: match std::env::var("WALLET_ROLLUP") {
                Ok(raw) => WalletRollup::parse(&raw)
                    .ok_or_else(|| anyhow::anyhow!("WALLET_ROLLUP must be 'sum' or 'average'"))?,
                Err(_) => defaults.wallet_rollup,
            },
            engage_keywords: std::env::var("ENGAGE_KEYWORDS")
                .ok()
                .map(|raw| parse_keywords(&raw))
                .filter(|k| !k.is_empty())
                .unwrap_or(defaults.engage_keywords),
            verida_api_url: env_url("VERIDA_API_URL", &defaults.verida_api_url)?,
            verida_legacy_api_url: env_url(
                "VERIDA_LEGACY_API_URL",
                &defaults.verida_legacy_api_url,
            )?,
            verida_timeout: env_millis("VERIDA_TIMEOUT_MS", defaults.verida_timeout)?,
            default_did: std::env::var("DEFAULT_DID")
                .ok()
                .filter(|s| !s.trim().is_empty() && s != "unknown"),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match (&config.database_url, config.local_dev_mode) {
            (_, true) => tracing::info!("Local development mode: durable store disabled"),
            (Some(url), false) => {
                tracing::debug!("Database URL: {}...", redacted_prefix(url))
            }
            (None, false) => tracing::warn!("No DATABASE_URL set, running memory-only"),
        }
        tracing::debug!(
            "DB connect attempts: {}, retry delay: {:?}, timeout: {:?}",
            config.db_connect_attempts,
            config.db_retry_delay,
            config.db_timeout
        );
        tracing::debug!("Wallet rollup: {:?}", config.wallet_rollup);
        tracing::debug!("Engage keywords: {:?}", config.engage_keywords);
        tracing::debug!("Verida API: {} (legacy {})", config.verida_api_url, config.verida_legacy_api_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Whether a durable backend should be attempted at all.
    pub fn durable_enabled(&self) -> bool {
        self.database_url.is_some() && !self.local_dev_mode
    }
}
