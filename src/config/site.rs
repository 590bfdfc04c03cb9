//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub public_dir: String,
    pub languages_dir: String,

    // Date format (date-fns tokens, e.g. "PP")
    pub date_format: String,

    // Regeneration window for generated pages, in seconds
    pub revalidate: u64,
    pub fallback: FallbackMode,

    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub listing: ListingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Blog Ignite".to_string(),
            description: String::new(),
            language: "pt-BR".to_string(),
            timezone: "America/Sao_Paulo".to_string(),

            url: "http://localhost:3000".to_string(),
            root: "/".to_string(),

            public_dir: "public".to_string(),
            languages_dir: "languages".to_string(),

            date_format: "PP".to_string(),

            revalidate: 60 * 48,
            fallback: FallbackMode::default(),

            content: ContentConfig::default(),
            listing: ListingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `PRISMIC_API_ENDPOINT` / `PRISMIC_ACCESS_TOKEN` overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("PRISMIC_API_ENDPOINT").ok(),
            std::env::var("PRISMIC_ACCESS_TOKEN").ok(),
        );
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, token: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            tracing::debug!("Using content endpoint from environment: {}", endpoint);
            self.content.endpoint = endpoint;
        }
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.content.access_token = Some(token);
        }
    }

    /// Parse the configured timezone, falling back to UTC
    pub fn tz(&self) -> chrono_tz::Tz {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                if !self.timezone.is_empty() {
                    tracing::warn!("Unknown timezone {:?}, using UTC", self.timezone);
                }
                chrono_tz::UTC
            }
        }
    }
}

/// What `/post/{slug}` answers for a path that has not been generated yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Serve a loading page and generate in the background
    #[default]
    Loading,
    /// Hold the request until the page is generated
    Blocking,
}

/// Content repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub document_type: String,
    pub page_size: usize,
    pub orderings: Option<String>,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    /// Read documents from a snapshot file instead of the remote API
    pub snapshot: Option<PathBuf>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "posts".to_string(),
            page_size: 20,
            orderings: None,
            timeout_secs: 10,
            retries: 2,
            retry_backoff_ms: 250,
            snapshot: None,
        }
    }
}

/// Listing page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Skip posts already shown when a later page repeats them
    pub dedupe: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self { dedupe: true }
    }
}
