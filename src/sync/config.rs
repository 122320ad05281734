use crate::error::SyncError;
use crate::sync::paths::SyncPaths;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key: String,
    pub search_engine_id: String,
    pub endpoint: String,
    pub country: String,
    pub language: String,
    pub rate_limit_delay_ms: u64,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            search_engine_id: String::new(),
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            country: "tw".to_string(),
            language: "zh-TW".to_string(),
            rate_limit_delay_ms: 1_200,
            timeout_secs: 20,
            retries: 0,
            retry_backoff_ms: 250,
        }
    }
}

impl SearchConfig {
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.search_engine_id.trim().is_empty()
    }
}

/// How rows for games already present in `games.json` are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExistingPolicy {
    /// Refresh `products` and `description`; keep `logo` and `social`.
    #[default]
    RefreshProducts,
    /// Refresh `description` only; the stored product list is kept as-is.
    DescriptionOnly,
}

impl ExistingPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "refresh-products" | "products" | "full" => Some(Self::RefreshProducts),
            "description-only" | "description" => Some(Self::DescriptionOnly),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RefreshProducts => "refresh-products",
            Self::DescriptionOnly => "description-only",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogConfig {
    pub existing_policy: ExistingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub timezone: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.ssbuy.tw/".to_string(),
            timezone: "Asia/Taipei".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    pub search: SearchConfig,
    pub catalog: CatalogConfig,
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialSyncConfig {
    search: Option<SearchConfig>,
    catalog: Option<CatalogConfig>,
    site: Option<SiteConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_policy(var: &str, fallback: ExistingPolicy) -> Result<ExistingPolicy> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => ExistingPolicy::parse(&v).ok_or_else(|| {
            anyhow!("invalid {var} `{}`: use `refresh-products` or `description-only`", v.trim())
        }),
        _ => Ok(fallback),
    }
}

fn validate(cfg: &SyncConfig) -> Result<()> {
    if cfg.search.timeout_secs == 0 {
        return Err(anyhow!("invalid search timeout: must be >= 1 second"));
    }
    if cfg.search.endpoint.trim().is_empty() {
        return Err(anyhow!("invalid search endpoint: cannot be empty"));
    }
    let base = cfg.site.base_url.trim();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(anyhow!(
            "invalid site base url `{base}`: must start with http:// or https://"
        ));
    }
    if cfg.site.timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err(anyhow!("invalid site timezone `{}`", cfg.site.timezone));
    }
    Ok(())
}

fn merge_file_config(base: &mut SyncConfig, paths: &SyncPaths) -> Result<()> {
    let path = &paths.config_file;
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| SyncError::InvalidConfig(format!("{}: {err}", path.display())))?;
    let parsed: PartialSyncConfig = toml::from_str(&raw)
        .map_err(|err| SyncError::InvalidConfig(format!("{}: {err}", path.display())))?;
    if let Some(search) = parsed.search {
        base.search = search;
    }
    if let Some(catalog) = parsed.catalog {
        base.catalog = catalog;
    }
    if let Some(site) = parsed.site {
        base.site = site;
    }
    Ok(())
}

pub fn load_config(paths: &SyncPaths) -> Result<SyncConfig> {
    let mut cfg = SyncConfig::default();
    merge_file_config(&mut cfg, paths)?;

    cfg.search.api_key = env_or_string("SSBUY_SEARCH_API_KEY", &cfg.search.api_key);
    cfg.search.search_engine_id =
        env_or_string("SSBUY_SEARCH_ENGINE_ID", &cfg.search.search_engine_id);
    cfg.search.endpoint = env_or_string("SSBUY_SEARCH_ENDPOINT", &cfg.search.endpoint);
    cfg.search.country = env_or_string("SSBUY_SEARCH_COUNTRY", &cfg.search.country);
    cfg.search.language = env_or_string("SSBUY_SEARCH_LANGUAGE", &cfg.search.language);
    cfg.search.rate_limit_delay_ms =
        env_or_u64("SSBUY_RATE_LIMIT_DELAY_MS", cfg.search.rate_limit_delay_ms);
    cfg.search.timeout_secs = env_or_u64("SSBUY_SEARCH_TIMEOUT_SECS", cfg.search.timeout_secs);
    cfg.search.retries = env_or_u32("SSBUY_SEARCH_RETRIES", cfg.search.retries);
    cfg.search.retry_backoff_ms =
        env_or_u64("SSBUY_SEARCH_RETRY_BACKOFF_MS", cfg.search.retry_backoff_ms);
    cfg.catalog.existing_policy =
        env_policy("SSBUY_CATALOG_EXISTING_POLICY", cfg.catalog.existing_policy)?;
    cfg.site.base_url = env_or_string("SSBUY_SITE_BASE_URL", &cfg.site.base_url);
    cfg.site.timezone = env_or_string("SSBUY_SITE_TIMEZONE", &cfg.site.timezone);

    validate(&cfg)?;
    Ok(cfg)
}
