use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

pub const CONFIG_PATH_ENV: &str = "EPISODE_WATCH_CONFIG";
const BASE_URL_ENV: &str = "EPISODE_WATCH_BASE_URL";
const POLL_INTERVAL_ENV: &str = "EPISODE_WATCH_POLL_INTERVAL";
const SEEN_FILE_ENV: &str = "EPISODE_WATCH_SEEN_FILE";
const LOG_LEVEL_ENV: &str = "EPISODE_WATCH_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Challenge,
    Direct,
    Relay,
    Proxy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_directory")]
    pub directory: String,
    #[serde(default = "default_log_filename")]
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyKind>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_relay_template")]
    pub relay_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_sources")]
    pub source_urls: Vec<String>,
    #[serde(default = "default_proxy_cache_file")]
    pub cache_file: String,
    #[serde(default)]
    pub https_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_card_selector")]
    pub card_selector: String,
    #[serde(default = "default_fallback_selectors")]
    pub fallback_selectors: Vec<String>,
    #[serde(default = "default_episode_path_pattern")]
    pub episode_path_pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_seen_file")]
    pub seen_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_listing_path")]
    pub listing_path: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_item_limit")]
    pub item_limit: usize,

    #[serde(default = "default_latest_limit")]
    pub latest_limit: usize,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            filename: default_log_filename(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            max_retries: default_max_retries(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            request_timeout_secs: default_request_timeout(),
            relay_template: default_relay_template(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            source_urls: default_proxy_sources(),
            cache_file: default_proxy_cache_file(),
            https_only: false,
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            card_selector: default_card_selector(),
            fallback_selectors: default_fallback_selectors(),
            episode_path_pattern: default_episode_path_pattern(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seen_file: default_seen_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_path: default_listing_path(),
            poll_interval_secs: default_poll_interval(),
            item_limit: default_item_limit(),
            latest_limit: default_latest_limit(),
            fetch: FetchConfig::default(),
            proxy: ProxyConfig::default(),
            scrape: ScrapeConfig::default(),
            store: StoreConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Reads `path`, which must exist, then applies `EPISODE_WATCH_*`
    /// overrides and validates.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::FileRead)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.finish()
    }

    /// Parses and validates TOML text as is, without environment overrides.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::from_file`], but falls back to defaults when `path`
    /// does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Config::default().finish()
        }
    }

    fn finish(mut self) -> Result<Self> {
        self.apply_env(|key| std::env::var(key).ok())?;
        self.validate()?;
        info!("Configuration loaded successfully");
        Ok(self)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(BASE_URL_ENV) {
            self.base_url = base_url;
        }
        if let Some(interval) = lookup(POLL_INTERVAL_ENV) {
            self.poll_interval_secs = interval.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!("{} must be an integer: {}", POLL_INTERVAL_ENV, interval))
            })?;
        }
        if let Some(seen_file) = lookup(SEEN_FILE_ENV) {
            self.store.seen_file = seen_file;
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidValue(format!("base_url {}: {}", self.base_url, e)).into())
    }

    pub fn listing_url(&self) -> Result<Url> {
        self.base()?
            .join(&self.listing_path)
            .map_err(|e| ConfigError::InvalidValue(format!("listing_path {}: {}", self.listing_path, e)).into())
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingField("base_url".to_string()).into());
        }
        if !self.base_url.starts_with("http") {
            return Err(ConfigError::InvalidValue(format!(
                "base_url must start with http(s): {}",
                self.base_url
            ))
            .into());
        }
        self.listing_url()?;

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.item_limit == 0 || self.latest_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "item_limit and latest_limit must be greater than 0".to_string(),
            )
            .into());
        }

        if self.fetch.strategies.is_empty() {
            return Err(ConfigError::MissingField("fetch.strategies".to_string()).into());
        }

        if self.fetch.max_retries == 0 {
            return Err(ConfigError::InvalidValue(
                "fetch.max_retries must be greater than 0".to_string(),
            )
            .into());
        }

        if self.fetch.backoff_min_ms > self.fetch.backoff_max_ms {
            return Err(ConfigError::InvalidValue(format!(
                "fetch.backoff_min_ms ({}) exceeds fetch.backoff_max_ms ({})",
                self.fetch.backoff_min_ms, self.fetch.backoff_max_ms
            ))
            .into());
        }

        if self.fetch.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "fetch.request_timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.fetch.strategies.contains(&StrategyKind::Relay)
            && !self.fetch.relay_template.contains("{url}")
        {
            return Err(ConfigError::InvalidValue(format!(
                "fetch.relay_template must contain {{url}}: {}",
                self.fetch.relay_template
            ))
            .into());
        }

        if self.fetch.strategies.contains(&StrategyKind::Proxy) && self.proxy.source_urls.is_empty()
        {
            return Err(ConfigError::MissingField("proxy.source_urls".to_string()).into());
        }

        if self.scrape.card_selector.trim().is_empty() {
            return Err(ConfigError::MissingField("scrape.card_selector".to_string()).into());
        }

        Ok(())
    }
}

fn default_base_url() -> String {
    "https://witanime.red".to_string()
}

fn default_listing_path() -> String {
    "/".to_string()
}

fn default_poll_interval() -> u64 {
    300
}

fn default_item_limit() -> usize {
    10
}

fn default_latest_limit() -> usize {
    5
}

fn default_strategies() -> Vec<StrategyKind> {
    vec![
        StrategyKind::Challenge,
        StrategyKind::Direct,
        StrategyKind::Relay,
        StrategyKind::Proxy,
    ]
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_min_ms() -> u64 {
    2_000
}

fn default_backoff_max_ms() -> u64 {
    5_000
}

fn default_request_timeout() -> u64 {
    10
}

fn default_relay_template() -> String {
    "https://api.allorigins.win/raw?url={url}".to_string()
}

fn default_proxy_sources() -> Vec<String> {
    vec![
        "https://api.proxyscrape.com/v2/?request=displayproxies&protocol=http&timeout=10000&country=all&ssl=yes&anonymity=all".to_string(),
        "https://free-proxy-list.net/".to_string(),
    ]
}

fn default_proxy_cache_file() -> String {
    "data/proxy.json".to_string()
}

fn default_card_selector() -> String {
    ".anime-card-container".to_string()
}

fn default_fallback_selectors() -> Vec<String> {
    vec![
        ".episodes-card-container".to_string(),
        ".anime-card-themex".to_string(),
        "div.anime-card".to_string(),
    ]
}

fn default_episode_path_pattern() -> String {
    r"^/episode/[^/]+/?$".to_string()
}

fn default_seen_file() -> String {
    "data/seen.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_log_filename() -> String {
    "episode-watch.log".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.base_url, "https://witanime.red");
        assert_eq!(config.item_limit, 10);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.strategies.len(), 4);
        assert_eq!(config.fetch.strategies[0], StrategyKind::Challenge);
    }

    #[test]
    fn strategy_order_is_configurable() {
        let config = Config::from_toml(
            r#"
            [fetch]
            strategies = ["relay", "direct"]
            backoff_min_ms = 0
            backoff_max_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(
            config.fetch.strategies,
            vec![StrategyKind::Relay, StrategyKind::Direct]
        );
    }

    #[test]
    fn rejects_inverted_backoff_window() {
        let err = Config::from_toml(
            r#"
            [fetch]
            backoff_min_ms = 5000
            backoff_max_ms = 100
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn rejects_relay_template_without_placeholder() {
        let err = Config::from_toml(
            r#"
            [fetch]
            relay_template = "https://relay.example/raw"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = Config::default();
        config
            .apply_env(|key| match key {
                BASE_URL_ENV => Some("https://mirror.example".to_string()),
                POLL_INTERVAL_ENV => Some("60".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.base_url, "https://mirror.example");
        assert_eq!(config.poll_interval_secs, 60);
    }

    #[test]
    fn listing_url_joins_path_onto_base() {
        let mut config = Config::default();
        config.base_url = "https://site.example".to_string();
        config.listing_path = "/episode/".to_string();
        assert_eq!(
            config.listing_url().unwrap().as_str(),
            "https://site.example/episode/"
        );
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");

        let err = Config::from_file(&missing).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::FileRead(_))));
        assert!(Config::load(&missing).is_ok());
    }

    #[test]
    fn reads_settings_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "item_limit = 3\n[store]\nseen_file = \"state/seen.json\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.item_limit, 3);
        assert_eq!(config.fetch.max_retries, 5);
    }
}
