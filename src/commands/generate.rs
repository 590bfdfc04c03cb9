//! Generate static files

use anyhow::Result;

use crate::cache::PageCache;
use crate::generator::{BuildReport, Generator};
use crate::Blog;

/// Generate the whole site from the configured content source
pub async fn run(blog: &Blog) -> Result<BuildReport> {
    run_with_options(blog, false).await
}

/// Generate, optionally discarding the page cache first
pub async fn run_with_options(blog: &Blog, force: bool) -> Result<BuildReport> {
    let start = std::time::Instant::now();

    let source = blog.source()?;
    let generator = Generator::new(blog)?;
    let mut cache = if force {
        tracing::info!("Full generation (force)");
        PageCache::new()
    } else {
        PageCache::load(&blog.base_dir)
    };

    let report = generator.build_site(&source, &mut cache).await?;
    cache.save(&blog.base_dir)?;

    tracing::info!(
        "Generated {} pages ({} changed, {} skipped) in {:.2}s",
        report.pages,
        report.changed,
        report.skipped,
        start.elapsed().as_secs_f64()
    );

    Ok(report)
}
