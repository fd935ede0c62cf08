use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "https://venddy.com/api/1.1/obj";
pub const DEFAULT_WEB_BASE_URL: &str = "https://venddy.com";
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const DEFAULT_LOG_FILE: &str = "./venddy-search.log";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub no_tui: bool,
    /// Base of the data API, e.g. `https://venddy.com/api/1.1/obj`.
    pub base_url: String,
    /// Taxonomy tables live under the same API by default.
    pub taxonomy_base_url: String,
    /// Public site, used for search and vendor profile links.
    pub web_base_url: String,
    pub page_size: u64,
    pub http: HttpConfig,
    /// 0 disables the taxonomy cache; every query refetches.
    pub taxonomy_ttl_secs: u64,
    pub log_level: String,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            no_tui: false,
            base_url: DEFAULT_BASE_URL.to_string(),
            taxonomy_base_url: DEFAULT_BASE_URL.to_string(),
            web_base_url: DEFAULT_WEB_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            http: HttpConfig::default(),
            taxonomy_ttl_secs: 0,
            log_level: "info".to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_base_ms: u64,
    pub retry_jitter_ms: u64,
    pub respect_retry_after: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
            max_retries: 2,
            retry_base_ms: 250,
            retry_jitter_ms: 250,
            respect_retry_after: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub taxonomy_base_url: Option<String>,
    pub web_base_url: Option<String>,
    pub page_size: Option<u64>,
    pub taxonomy_ttl_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub http: Option<PartialHttpConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialHttpConfig {
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub max_retries: Option<usize>,
    pub retry_base_ms: Option<u64>,
    pub retry_jitter_ms: Option<u64>,
    pub respect_retry_after: Option<bool>,
}

impl PartialHttpConfig {
    fn resolve(&self) -> HttpConfig {
        let d = HttpConfig::default();
        HttpConfig {
            connect_timeout_ms: self.connect_timeout_ms.unwrap_or(d.connect_timeout_ms),
            request_timeout_ms: self.request_timeout_ms.unwrap_or(d.request_timeout_ms),
            max_retries: self.max_retries.unwrap_or(d.max_retries),
            retry_base_ms: self.retry_base_ms.unwrap_or(d.retry_base_ms),
            retry_jitter_ms: self.retry_jitter_ms.unwrap_or(d.retry_jitter_ms),
            respect_retry_after: self.respect_retry_after.unwrap_or(d.respect_retry_after),
        }
    }
}

impl AppConfig {
    pub fn from_cli(cli: crate::Cli) -> Result<Self> {
        let file_cfg = load_file_config().unwrap_or_default();
        Ok(Self::merge(cli, |key| std::env::var(key).ok(), file_cfg))
    }

    /// Priority: CLI args -> env vars -> config file -> defaults.
    pub fn merge<F>(cli: crate::Cli, env: F, file_cfg: FileConfig) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = cli
            .base_url
            .or_else(|| env("VENDDY_BASE_URL"))
            .or(file_cfg.base_url)
            .unwrap_or(defaults.base_url);
        let taxonomy_base_url = env("VENDDY_TAXONOMY_BASE_URL")
            .or(file_cfg.taxonomy_base_url)
            .unwrap_or_else(|| base_url.clone());
        let web_base_url = file_cfg.web_base_url.unwrap_or(defaults.web_base_url);

        // A page size of zero would make the cursor arithmetic meaningless.
        let page_size = cli
            .page_size
            .or_else(|| env("VENDDY_PAGE_SIZE").and_then(|v| v.parse::<u64>().ok()))
            .or(file_cfg.page_size)
            .filter(|n| *n > 0)
            .unwrap_or(defaults.page_size);

        let log_level = cli
            .log_level
            .or_else(|| env("VENDDY_LOG"))
            .or_else(|| env("RUST_LOG"))
            .or(file_cfg.log_level)
            .unwrap_or(defaults.log_level);
        let log_file = cli
            .log_file
            .or(file_cfg.log_file)
            .unwrap_or(defaults.log_file);

        let http = file_cfg
            .http
            .map(|p| p.resolve())
            .unwrap_or(defaults.http);

        Self {
            no_tui: cli.no_tui,
            base_url,
            taxonomy_base_url,
            web_base_url,
            page_size,
            http,
            taxonomy_ttl_secs: file_cfg
                .taxonomy_ttl_secs
                .unwrap_or(defaults.taxonomy_ttl_secs),
            log_level,
            log_file,
        }
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    use std::env;

    let mut v = Vec::new();
    if let Ok(p) = env::var("VENDDY_SEARCH_CONFIG") {
        v.push(PathBuf::from(p));
    }
    if let Ok(xdg_home) = env::var("XDG_CONFIG_HOME") {
        v.push(Path::new(&xdg_home).join("venddy-search/config.toml"));
    } else if let Ok(home) = env::var("HOME") {
        v.push(Path::new(&home).join(".config/venddy-search/config.toml"));
    }
    if let Ok(dirs) = env::var("XDG_CONFIG_DIRS") {
        for d in dirs.split(':') {
            if !d.is_empty() {
                v.push(Path::new(d).join("venddy-search/config.toml"));
            }
        }
    }
    v
}

pub fn load_file_config() -> Result<FileConfig> {
    for p in candidate_paths() {
        if p.exists() {
            match load_config_file(&p) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(path=%p.display(), error=%e.to_string(), "parse config failed");
                    continue;
                }
            }
        }
    }
    Ok(FileConfig::default())
}

pub fn load_config_file(path: &Path) -> Result<FileConfig> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    let cfg = toml::from_str::<FileConfig>(&s)
        .with_context(|| format!("parse config file: {}", path.display()))?;
    info!(path=%path.display(), "loaded config file");
    Ok(cfg)
}
