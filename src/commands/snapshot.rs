//! Save the content repository to a snapshot file

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::content::{PrismicClient, SnapshotSource};
use crate::Blog;

/// Default snapshot file, relative to the site directory
pub const DEFAULT_SNAPSHOT: &str = "snapshot.json";

/// Fetch every post document from the remote repository and write them to
/// `output` (or the configured snapshot path)
pub async fn run(blog: &Blog, output: Option<&Path>) -> Result<PathBuf> {
    let output = output
        .map(Path::to_path_buf)
        .or_else(|| blog.config.content.snapshot.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT));
    let output = if output.is_absolute() {
        output
    } else {
        blog.base_dir.join(output)
    };

    let client = PrismicClient::new(&blog.config.content)?;
    let documents = client
        .all_documents(blog.config.content.page_size)
        .await?;
    tracing::info!("Saving {} documents to {:?}", documents.len(), output);
    SnapshotSource::save(documents, &output)?;

    Ok(output)
}
