//! blog-ignite: a statically generated blog over a headless content API
//!
//! Posts live in a Prismic repository. The generator renders the posts
//! listing and one page per post with built-in Tera templates; the server
//! serves those pages, generates paths that were not built yet on first
//! request and regenerates pages once their revalidation window elapses.

pub mod cache;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod i18n;
pub mod pages;
pub mod server;
pub mod templates;

pub use error::{Error, Result};

use std::path::{Path, PathBuf};

/// The main blog application
#[derive(Debug, Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
}

impl Blog {
    /// Create a new instance from a directory, reading `_config.yml` when
    /// present and applying environment overrides
    pub fn new<P: AsRef<Path>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };
        config.apply_env();

        Ok(Self::with_config(base_dir, config))
    }

    /// Create an instance with an explicit configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let public_dir = base_dir.join(&config.public_dir);
        Self {
            config,
            base_dir,
            public_dir,
        }
    }

    /// The configured content source
    pub fn source(&self) -> Result<content::Source> {
        content::Source::from_config(&self.config.content, &self.base_dir)
    }

    /// Date formatter for the configured locale, pattern and timezone
    pub fn formatter(&self) -> helpers::DateFormatter {
        helpers::DateFormatter::from_config(&self.config)
    }

    /// Interface strings, with overrides from the languages directory
    pub fn i18n(&self) -> i18n::I18n {
        let mut i18n = i18n::I18n::new(&self.config.language);
        let dir = self.base_dir.join(&self.config.languages_dir);
        if let Err(e) = i18n.load_languages(&dir) {
            tracing::warn!("Failed to load languages from {:?}: {}", dir, e);
        }
        i18n
    }
}
