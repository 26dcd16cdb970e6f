use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::data_models::OutputFormat;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("{0}")]
    Constraint(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Searxng,
    Google,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub searxng_url: String,
    pub engines: String,
    pub google_api_key: Option<String>,
    pub google_cse_id: Option<String>,
    pub timeout: Duration,
}

/// Settings shared by every page fetch.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub timeout: Duration,
    pub max_content_length: usize,
    pub user_agent: String,
    pub pool_size: usize,
    pub max_page_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub default_max_results: usize,
    pub max_results_cap: usize,
}

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub max_urls: usize,
    pub timeout_basic: Duration,
    pub timeout_advanced: Duration,
    pub default_format: OutputFormat,
    pub max_content_length: usize,
    pub renderer_url: Option<String>,
    pub renderer_token: Option<String>,
}

/// Immutable process configuration. Built once in `main` and handed to each
/// component by value; nothing reads the environment after startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub scraper: ScraperConfig,
    pub search: SearchConfig,
    pub extract: ExtractConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8001,
            },
            backend: BackendConfig {
                kind: BackendKind::Searxng,
                searxng_url: "http://searxng:8080".to_string(),
                engines: "google,duckduckgo,brave".to_string(),
                google_api_key: None,
                google_cse_id: None,
                timeout: Duration::from_secs(30),
            },
            scraper: ScraperConfig {
                timeout: Duration::from_secs(10),
                max_content_length: 2500,
                user_agent: "Mozilla/5.0 (compatible; TavilyBot/1.0)".to_string(),
                pool_size: 5,
                max_page_bytes: 5_000_000,
            },
            search: SearchConfig {
                default_max_results: 10,
                max_results_cap: 20,
            },
            extract: ExtractConfig {
                max_urls: 20,
                timeout_basic: Duration::from_secs(12),
                timeout_advanced: Duration::from_secs(25),
                default_format: OutputFormat::Markdown,
                max_content_length: 100_000,
                renderer_url: None,
                renderer_token: None,
            },
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults
    /// for anything unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let kind = match get("SEARCH_BACKEND").map(|v| v.to_lowercase()) {
            None => defaults.backend.kind,
            Some(v) if v == "searxng" => BackendKind::Searxng,
            Some(v) if v == "google" => BackendKind::Google,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    key: "SEARCH_BACKEND".to_string(),
                    value: v,
                });
            }
        };

        let default_format = match get("EXTRACT_DEFAULT_FORMAT") {
            None => defaults.extract.default_format,
            Some(v) => OutputFormat::parse(&v).ok_or(ConfigError::Invalid {
                key: "EXTRACT_DEFAULT_FORMAT".to_string(),
                value: v,
            })?,
        };

        let config = Config {
            server: ServerConfig {
                host: get("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or_default(&get, "SERVER_PORT", defaults.server.port)?,
            },
            backend: BackendConfig {
                kind,
                searxng_url: get("SEARXNG_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.backend.searxng_url),
                engines: get("SEARXNG_ENGINES").unwrap_or(defaults.backend.engines),
                google_api_key: get("GOOGLE_API_KEY"),
                google_cse_id: get("GOOGLE_CSE_ID"),
                timeout: secs_or_default(&get, "BACKEND_TIMEOUT_SECS", defaults.backend.timeout)?,
            },
            scraper: ScraperConfig {
                timeout: secs_or_default(&get, "SCRAPER_TIMEOUT_SECS", defaults.scraper.timeout)?,
                max_content_length: parse_or_default(
                    &get,
                    "SCRAPER_MAX_CONTENT_LENGTH",
                    defaults.scraper.max_content_length,
                )?,
                user_agent: get("SCRAPER_USER_AGENT").unwrap_or(defaults.scraper.user_agent),
                pool_size: parse_or_default(&get, "SCRAPER_POOL_SIZE", defaults.scraper.pool_size)?,
                max_page_bytes: parse_or_default(
                    &get,
                    "SCRAPER_MAX_PAGE_BYTES",
                    defaults.scraper.max_page_bytes,
                )?,
            },
            search: SearchConfig {
                default_max_results: parse_or_default(
                    &get,
                    "SEARCH_DEFAULT_MAX_RESULTS",
                    defaults.search.default_max_results,
                )?,
                max_results_cap: parse_or_default(
                    &get,
                    "SEARCH_MAX_RESULTS_CAP",
                    defaults.search.max_results_cap,
                )?,
            },
            extract: ExtractConfig {
                max_urls: parse_or_default(&get, "EXTRACT_MAX_URLS", defaults.extract.max_urls)?,
                timeout_basic: secs_or_default(
                    &get,
                    "EXTRACT_TIMEOUT_BASIC_SECS",
                    defaults.extract.timeout_basic,
                )?,
                timeout_advanced: secs_or_default(
                    &get,
                    "EXTRACT_TIMEOUT_ADVANCED_SECS",
                    defaults.extract.timeout_advanced,
                )?,
                default_format,
                max_content_length: parse_or_default(
                    &get,
                    "EXTRACT_MAX_CONTENT_LENGTH",
                    defaults.extract.max_content_length,
                )?,
                renderer_url: get("RENDERER_URL").map(|url| url.trim_end_matches('/').to_string()),
                renderer_token: get("RENDERER_TOKEN"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraper.pool_size == 0 {
            return Err(ConfigError::Constraint(
                "SCRAPER_POOL_SIZE must be greater than 0".to_string(),
            ));
        }
        if self.scraper.timeout.is_zero()
            || self.extract.timeout_basic.is_zero()
            || self.extract.timeout_advanced.is_zero()
            || self.backend.timeout.is_zero()
        {
            return Err(ConfigError::Constraint(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if self.scraper.max_content_length == 0 || self.extract.max_content_length == 0 {
            return Err(ConfigError::Constraint(
                "max content lengths must be greater than 0".to_string(),
            ));
        }
        if self.search.default_max_results == 0
            || self.search.default_max_results > self.search.max_results_cap
        {
            return Err(ConfigError::Constraint(
                "SEARCH_DEFAULT_MAX_RESULTS must be between 1 and SEARCH_MAX_RESULTS_CAP"
                    .to_string(),
            ));
        }
        if self.extract.max_urls == 0 {
            return Err(ConfigError::Constraint(
                "EXTRACT_MAX_URLS must be greater than 0".to_string(),
            ));
        }
        if self.backend.kind == BackendKind::Google
            && (self.backend.google_api_key.is_none() || self.backend.google_cse_id.is_none())
        {
            return Err(ConfigError::Constraint(
                "SEARCH_BACKEND=google requires GOOGLE_API_KEY and GOOGLE_CSE_ID".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or_default<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
    }
}

fn secs_or_default<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .ok_or(ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
    }
}
