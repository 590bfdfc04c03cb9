//! Initialize a new blog site

use anyhow::Result;
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# Blog configuration

# Site
title: Blog Ignite
description: ''
language: pt-BR
timezone: America/Sao_Paulo

# URL
url: http://localhost:3000
root: /

# Directory
public_dir: public
languages_dir: languages

# Date format (date-fns tokens; PP is "15 mar 2021" in pt-BR)
date_format: PP

# Generated pages are regenerated after this many seconds
revalidate: 2880

# Answer for posts that were not generated yet: loading | blocking
fallback: loading

# Content repository (Prismic REST API v2)
# PRISMIC_API_ENDPOINT and PRISMIC_ACCESS_TOKEN override these values.
content:
  endpoint: ''
  access_token:
  document_type: posts
  page_size: 20
  orderings:
  timeout_secs: 10
  retries: 2
  retry_backoff_ms: 250
  # Read documents from a file written by `blog-ignite snapshot`
  snapshot:

listing:
  # Skip posts already shown when a later page repeats them
  dedupe: true
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        anyhow::bail!("{:?} already exists", config_path);
    }

    fs::create_dir_all(target_dir.join("languages"))?;
    fs::write(&config_path, DEFAULT_CONFIG)?;

    Ok(())
}
