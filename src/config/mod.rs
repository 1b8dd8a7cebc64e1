use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub langbase: LangbaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub pipes: PipeConfig,
    pub extraction: ExtractionConfig,
    pub cache: CacheConfig,
}

/// Langbase API configuration
///
/// Without an API key the extractor runs on the keyword fallback only.
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-batch LLM timeout
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Langbase pipe name configuration
#[derive(Debug, Clone)]
pub struct PipeConfig {
    pub argument_extraction: String,
}

/// Argument extractor batching configuration
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub batch_size: usize,
    pub max_concurrency: usize,
}

/// Result cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub ttl_secs: u64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        if !langbase.base_url.starts_with("http://") && !langbase.base_url.starts_with("https://")
        {
            return Err(AppError::Config {
                message: format!(
                    "LANGBASE_BASE_URL must be an http(s) URL, got '{}'",
                    langbase.base_url
                ),
            });
        }

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            timeout_ms: env_parse("REQUEST_TIMEOUT_MS", defaults.timeout_ms),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_parse("RETRY_DELAY_MS", defaults.retry_delay_ms),
        };

        let pipes = PipeConfig {
            argument_extraction: env::var("PIPE_ARGUMENT_EXTRACTION")
                .unwrap_or_else(|_| PipeConfig::default().argument_extraction),
        };

        let defaults = ExtractionConfig::default();
        let extraction = ExtractionConfig {
            batch_size: env_parse("EXTRACTION_BATCH_SIZE", defaults.batch_size).max(1),
            max_concurrency: env_parse("EXTRACTION_MAX_CONCURRENCY", defaults.max_concurrency)
                .max(1),
        };

        let defaults = CacheConfig::default();
        let cache = CacheConfig {
            enabled: env_parse("CACHE_ENABLED", defaults.enabled),
            path: env::var("CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            ttl_secs: env_parse("CACHE_TTL_SECS", defaults.ttl_secs),
        };

        Ok(Config {
            langbase,
            logging,
            request,
            pipes,
            extraction,
            cache,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            langbase: LangbaseConfig {
                api_key: None,
                base_url: "https://api.langbase.com".to_string(),
            },
            logging: LoggingConfig::default(),
            request: RequestConfig::default(),
            pipes: PipeConfig::default(),
            extraction: ExtractionConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 300_000,
            max_retries: 0,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            argument_extraction: "argument-extraction-v1".to_string(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrency: 4,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/analysis_cache.json"),
            ttl_secs: 24 * 60 * 60,
        }
    }
}
