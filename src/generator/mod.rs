//! Generator module - renders pages with the built-in Tera templates and
//! writes them to the public directory

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tera::Context;

use crate::cache::{now_secs, PageCache};
use crate::content::{list_all_posts, ContentSource};
use crate::error::Result;
use crate::helpers::{full_url_for, is_valid_slug, post_path, url_for, DateFormatter};
use crate::i18n::I18n;
use crate::pages::{DetailPage, ListingItem, ListingPage, PostView};
use crate::templates::{
    Labels, ListingItemData, PostPageData, SiteData, TemplateRenderer, LOAD_MORE_SCRIPT,
    SCRIPT_PATH, STYLESHEET, STYLESHEET_PATH,
};
use crate::Blog;

/// Seconds before the fallback page reloads itself
const FALLBACK_REFRESH_SECS: u64 = 2;

/// A rendered page and where it lives
#[derive(Debug, Clone)]
pub struct GeneratedPage {
    /// Site path, without root (`/` or `/post/{uid}`)
    pub path: String,
    /// Output file relative to the public directory
    pub output_path: String,
    pub html: String,
}

/// Outcome of a full build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Pages written
    pub pages: usize,
    /// Pages whose HTML differs from the previous build
    pub changed: usize,
    /// Posts without a routable uid
    pub skipped: usize,
}

/// Output file for a site path
pub fn output_path_for(path: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        "index.html".to_string()
    } else {
        format!("{}/index.html", path)
    }
}

/// Static site generator using Tera templates
pub struct Generator {
    blog: Blog,
    renderer: TemplateRenderer,
    i18n: I18n,
    site: SiteData,
    labels: Labels,
    formatter: DateFormatter,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog) -> Result<Self> {
        let i18n = blog.i18n();
        Ok(Self {
            renderer: TemplateRenderer::new()?,
            site: SiteData::from_config(&blog.config),
            labels: Labels::from_i18n(&i18n),
            formatter: blog.formatter(),
            blog: blog.clone(),
            i18n,
        })
    }

    pub fn blog(&self) -> &Blog {
        &self.blog
    }

    pub fn formatter(&self) -> &DateFormatter {
        &self.formatter
    }

    /// Link target for a document link inside rich text
    pub fn document_href(&self, uid: &str) -> String {
        url_for(&self.blog.config, &post_path(uid))
    }

    fn create_base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("site", &self.site);
        context.insert("t", &self.labels);
        context
    }

    /// Listing items as template (and JSON) data
    pub fn listing_data(&self, items: &[ListingItem]) -> Vec<ListingItemData> {
        items
            .iter()
            .map(|item| ListingItemData::from_item(item, &self.blog.config))
            .collect()
    }

    pub fn render_listing(&self, listing: &ListingPage) -> Result<String> {
        let mut context = self.create_base_context();
        context.insert("posts", &self.listing_data(listing.items()));
        context.insert("next_page", &listing.next_page());
        context.insert("more_endpoint", &url_for(&self.blog.config, "/posts/more"));
        context.insert("dedupe", &self.blog.config.listing.dedupe);
        context.insert(
            "timeout_ms",
            &(self.blog.config.content.timeout_secs * 1000),
        );
        self.renderer.render("home.html", &context)
    }

    pub fn render_post(&self, view: &PostView) -> Result<String> {
        let mut context = self.create_base_context();
        context.insert("item", &PostPageData::from_view(view, &self.i18n));
        context.insert(
            "canonical",
            &view
                .post
                .uid
                .as_deref()
                .map(|uid| full_url_for(&self.blog.config, &post_path(uid))),
        );
        self.renderer.render("post.html", &context)
    }

    /// Render a detail page in whichever state it is
    pub fn render_detail(&self, page: &DetailPage) -> Result<String> {
        match page {
            DetailPage::Fallback { slug } => self.render_fallback(slug),
            DetailPage::Loaded(view) => self.render_post(view),
        }
    }

    /// Loading page for a post that is still being generated
    pub fn render_fallback(&self, slug: &str) -> Result<String> {
        let mut context = self.create_base_context();
        context.insert("slug", slug);
        context.insert("refresh_secs", &FALLBACK_REFRESH_SECS);
        self.renderer.render("fallback.html", &context)
    }

    pub fn render_not_found(&self) -> Result<String> {
        self.renderer
            .render("not_found.html", &self.create_base_context())
    }

    pub fn render_error(&self) -> Result<String> {
        self.renderer.render("error.html", &self.create_base_context())
    }

    /// Fetch the first page of posts and render `/`
    pub async fn generate_listing<S: ContentSource>(&self, source: &S) -> Result<GeneratedPage> {
        let first = source
            .list_posts(self.blog.config.content.page_size, None)
            .await?;
        let listing = ListingPage::new(
            first,
            self.formatter.clone(),
            self.blog.config.listing.dedupe,
        );
        tracing::debug!(
            "Rendering listing with {} posts (more: {})",
            listing.items().len(),
            listing.can_load_more()
        );

        Ok(GeneratedPage {
            path: "/".to_string(),
            output_path: output_path_for("/"),
            html: self.render_listing(&listing)?,
        })
    }

    /// Fetch one post and render `/post/{slug}`
    pub async fn generate_post<S: ContentSource>(
        &self,
        source: &S,
        slug: &str,
    ) -> Result<GeneratedPage> {
        let page = DetailPage::load(source, slug, &self.formatter, |uid| self.document_href(uid))
            .await?;
        self.detail_page(slug, &page)
    }

    fn detail_page(&self, slug: &str, page: &DetailPage) -> Result<GeneratedPage> {
        let path = post_path(slug);
        Ok(GeneratedPage {
            output_path: output_path_for(&path),
            html: self.render_detail(page)?,
            path,
        })
    }

    /// Write a page under the public directory
    pub async fn write_page(&self, page: &GeneratedPage) -> Result<()> {
        let output_path = self.blog.public_dir.join(&page.output_path);
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Readers never see a half-written page
        let tmp_path = output_path.with_extension("html.tmp");
        tokio::fs::write(&tmp_path, &page.html).await?;
        tokio::fs::rename(&tmp_path, &output_path).await?;
        tracing::debug!("Generated: {:?}", output_path);
        Ok(())
    }

    /// Read a previously written page
    pub async fn read_page(&self, output_path: &str) -> Result<String> {
        Ok(tokio::fs::read_to_string(self.blog.public_dir.join(output_path)).await?)
    }

    /// Delete a page whose post no longer exists
    pub async fn remove_page(&self, output_path: &str) -> Result<()> {
        let path: PathBuf = self.blog.public_dir.join(output_path);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Deleted: {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the stylesheet and load-more script
    pub fn write_assets(&self) -> Result<()> {
        for (path, content) in [(STYLESHEET_PATH, STYLESHEET), (SCRIPT_PATH, LOAD_MORE_SCRIPT)] {
            let dest = self.blog.public_dir.join(path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&dest, content)?;
        }
        Ok(())
    }

    /// Generate the listing and every post, recording each path in `cache`
    pub async fn build_site<S: ContentSource>(
        &self,
        source: &S,
        cache: &mut PageCache,
    ) -> Result<BuildReport> {
        fs::create_dir_all(&self.blog.public_dir)?;
        self.write_assets()?;

        let mut report = BuildReport::default();
        let listing = self.generate_listing(source).await?;
        self.commit(&listing, cache, &mut report).await?;

        let posts = list_all_posts(source, self.blog.config.content.page_size).await?;
        tracing::info!("Loaded {} posts", posts.len());

        let mut done = HashSet::new();
        for post in posts {
            let uid = match post.uid.clone() {
                Some(uid) if is_valid_slug(&uid) => uid,
                other => {
                    tracing::warn!(
                        "Skipping post {} without a usable uid ({:?})",
                        post.id,
                        other
                    );
                    report.skipped += 1;
                    continue;
                }
            };
            if !done.insert(uid.clone()) {
                tracing::warn!("Duplicate uid {}, keeping the first post", uid);
                report.skipped += 1;
                continue;
            }

            let view = PostView::build(post, &self.formatter, |target| self.document_href(target));
            let page = self.detail_page(&uid, &DetailPage::Loaded(Box::new(view)))?;
            self.commit(&page, cache, &mut report).await?;
        }

        Ok(report)
    }

    async fn commit(
        &self,
        page: &GeneratedPage,
        cache: &mut PageCache,
        report: &mut BuildReport,
    ) -> Result<()> {
        self.write_page(page).await?;
        if cache.record(&page.path, &page.output_path, &page.html, now_secs()) {
            report.changed += 1;
        }
        report.pages += 1;
        Ok(())
    }
}
