//! Bot configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `POLYDICTIONS_*` environment variables (`__` separates sections).

use crate::error::{BotError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable read when no token is configured
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "POLYDICTIONS";

/// `storage.max_seen_events` must hold this many fetch windows
pub const SEEN_WINDOW_HEADROOM: usize = 2;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub polymarket: PolymarketConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; falls back to `BOT_TOKEN` when absent
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// Long-poll timeout for `getUpdates`
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub disable_link_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolymarketConfig {
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,
    #[serde(default = "default_context_url")]
    pub context_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Context generation is slow upstream
    #[serde(default = "default_context_timeout_secs")]
    pub context_timeout_secs: u64,
    #[serde(default = "default_context_retries")]
    pub context_retries: u32,
    #[serde(default = "default_context_retry_delay_ms")]
    pub context_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Events requested per poll
    #[serde(default = "default_poll_limit")]
    pub poll_limit: usize,
    /// Events marked seen on first start with an empty seen set
    #[serde(default = "default_prime_limit")]
    pub prime_limit: usize,
    /// Events checked for gaps on restart
    #[serde(default = "default_refresh_limit")]
    pub refresh_limit: usize,
    /// Unseen events above this volume are old ones that resurfaced
    #[serde(default = "default_stale_volume_threshold")]
    pub stale_volume_threshold: Decimal,
    /// On restart, unseen events above this volume are treated as missed
    #[serde(default = "default_missed_volume_threshold")]
    pub missed_volume_threshold: Decimal,
    /// Pause between two outgoing notifications
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Seen-set capacity, 0 = unbounded
    #[serde(default = "default_max_seen_events")]
    pub max_seen_events: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}
fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}
fn default_poll_timeout_secs() -> u64 {
    30
}
fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}
fn default_context_url() -> String {
    "https://polymarket.com/api/grok/event-summary".to_string()
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_context_timeout_secs() -> u64 {
    120
}
fn default_context_retries() -> u32 {
    1
}
fn default_context_retry_delay_ms() -> u64 {
    2000
}
fn default_check_interval_secs() -> u64 {
    60
}
fn default_poll_limit() -> usize {
    20
}
fn default_prime_limit() -> usize {
    100
}
fn default_refresh_limit() -> usize {
    50
}
fn default_stale_volume_threshold() -> Decimal {
    dec!(50000)
}
fn default_missed_volume_threshold() -> Decimal {
    dec!(10000)
}
fn default_send_delay_ms() -> u64 {
    500
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_max_seen_events() -> usize {
    10_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
            disable_link_preview: true,
        }
    }
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            gamma_url: default_gamma_url(),
            context_url: default_context_url(),
            request_timeout_secs: default_request_timeout_secs(),
            context_timeout_secs: default_context_timeout_secs(),
            context_retries: default_context_retries(),
            context_retry_delay_ms: default_context_retry_delay_ms(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            poll_limit: default_poll_limit(),
            prime_limit: default_prime_limit(),
            refresh_limit: default_refresh_limit(),
            stale_volume_threshold: default_stale_volume_threshold(),
            missed_volume_threshold: default_missed_volume_threshold(),
            send_delay_ms: default_send_delay_ms(),
        }
    }
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    /// Most events a single fetch can return
    pub fn largest_window(&self) -> usize {
        self.poll_limit.max(self.prime_limit).max(self.refresh_limit)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_seen_events: default_max_seen_events(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.monitor.poll_limit == 0 {
            return Err(BotError::Config("monitor.poll_limit must be > 0".into()));
        }
        if self.telegram.poll_timeout_secs == 0 {
            return Err(BotError::Config(
                "telegram.poll_timeout_secs must be > 0".into(),
            ));
        }

        // The seen set must outlive every id a fetch can still return
        let min_seen = self.monitor.largest_window() * SEEN_WINDOW_HEADROOM;
        let max_seen = self.storage.max_seen_events;
        if max_seen != 0 && max_seen < min_seen {
            return Err(BotError::Config(format!(
                "storage.max_seen_events must be 0 (unbounded) or at least {}, got {}",
                min_seen, max_seen
            )));
        }
        Ok(())
    }

    /// Resolve the bot token: configured value first, then `BOT_TOKEN`
    pub fn bot_token(&self) -> Result<String> {
        resolve_bot_token(
            self.telegram.bot_token.as_deref(),
            std::env::var(BOT_TOKEN_ENV).ok(),
        )
        .ok_or_else(|| {
            BotError::Config(format!(
                "no bot token: set telegram.bot_token or the {} environment variable",
                BOT_TOKEN_ENV
            ))
        })
    }
}

/// Pick the first non-blank token, trimmed
pub fn resolve_bot_token(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| {
            from_env
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
}
