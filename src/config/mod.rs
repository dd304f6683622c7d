mod file_config;

pub use file_config::{CommerceConfig, FileConfig, LlmConfig};

use crate::llm::ApiKeySource;
use crate::mirror::PaginationPolicy;
use crate::server::RequestsLoggingLevel;
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_COMMERCE_API_VERSION: &str = "2024-01";
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";

/// Upper bound the Admin API accepts for `first`.
const MAX_PAGE_SIZE: u32 = 250;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    /// Usually taken from the `LLM_API_KEY` environment variable.
    pub llm_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub read_pool_size: usize,

    // Pipeline settings
    pub staleness_ttl_minutes: u64,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub pagination_policy: PaginationPolicy,
    pub orders_since_days: Option<u32>,

    pub commerce: CommerceSettings,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone)]
pub struct CommerceSettings {
    pub api_version: String,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key_source: ApiKeySource,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| anyhow!("db_path must be specified via --db-path or in config file"))?;

        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let read_pool_size = file.read_pool_size.unwrap_or(4);
        if read_pool_size == 0 {
            bail!("read_pool_size must be at least 1");
        }

        let page_size = file.page_size.unwrap_or(50);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            bail!("page_size must be between 1 and {}, got {}", MAX_PAGE_SIZE, page_size);
        }

        let pagination_policy = match file.pagination_policy {
            Some(policy) => parse_pagination_policy(&policy)
                .ok_or_else(|| anyhow!("unknown pagination policy '{}'", policy))?,
            None => PaginationPolicy::default(),
        };

        let commerce_file = file.commerce.unwrap_or_default();
        let commerce = CommerceSettings {
            api_version: commerce_file
                .api_version
                .unwrap_or_else(|| DEFAULT_COMMERCE_API_VERSION.to_string()),
            endpoint: commerce_file.endpoint,
            timeout_secs: commerce_file.timeout_secs.unwrap_or(30),
        };

        let llm_file = file.llm.unwrap_or_default();
        let api_key_source = match (llm_file.api_key_command, llm_file.api_key) {
            (Some(command), _) => ApiKeySource::Command(command),
            (None, Some(key)) => ApiKeySource::Static(key),
            (None, None) => match &cli.llm_api_key {
                Some(key) => ApiKeySource::Static(key.clone()),
                None => ApiKeySource::None,
            },
        };
        let llm = LlmSettings {
            base_url: llm_file
                .base_url
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: llm_file
                .model
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            api_key_source,
            temperature: llm_file.temperature.unwrap_or(0.0),
            max_tokens: llm_file.max_tokens,
            timeout_secs: llm_file.timeout_secs.unwrap_or(60),
        };

        Ok(Self {
            db_path,
            port,
            metrics_port,
            logging_level,
            read_pool_size,
            staleness_ttl_minutes: file.staleness_ttl_minutes.unwrap_or(5),
            page_size,
            request_timeout_secs: file.request_timeout_secs.unwrap_or(120),
            pagination_policy,
            orders_since_days: file.orders_since_days,
            commerce,
            llm,
        })
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

fn parse_pagination_policy(s: &str) -> Option<PaginationPolicy> {
    PaginationPolicy::from_str(s, true).ok()
}
