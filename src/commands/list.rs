//! List site content

use anyhow::Result;

use crate::cache::{now_secs, Lookup, PageCache};
use crate::content::list_all_posts;
use crate::helpers::date_xml;
use crate::Blog;

/// List site content by type
pub async fn run(blog: &Blog, content_type: &str) -> Result<()> {
    match content_type {
        "post" | "posts" => {
            let source = blog.source()?;
            let posts = list_all_posts(&source, blog.config.content.page_size).await?;
            println!("Posts ({}):", posts.len());
            for post in posts {
                let date = post
                    .first_publication_date
                    .as_ref()
                    .map(date_xml)
                    .unwrap_or_else(|| "unpublished".to_string());
                println!(
                    "  {} - {} [{}]",
                    date,
                    post.title,
                    post.uid.as_deref().unwrap_or(&post.id)
                );
            }
        }
        "route" | "routes" => {
            let cache = PageCache::load(&blog.base_dir);
            let now = now_secs();
            let mut paths: Vec<_> = cache.pages.keys().collect();
            paths.sort();
            println!("Routes ({}):", paths.len());
            for path in paths {
                let state = match cache.lookup(path, now, blog.config.revalidate) {
                    Lookup::Fresh(_) => "fresh",
                    Lookup::Stale(_) => "stale",
                    Lookup::Missing => "missing",
                };
                println!("  {} ({})", path, state);
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: post, route", content_type);
        }
    }

    Ok(())
}
