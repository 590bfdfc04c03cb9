//! Blog server with on-demand generation and revalidation
//!
//! Pages are served from the public directory while they are fresh. A stale
//! page is still served, and regenerated in the background. A post path that
//! was never generated answers with the loading page (or waits for the page,
//! in `blocking` mode) while it is generated. At most one generation per path
//! runs at a time.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cache::{now_secs, Lookup, PageCache};
use crate::config::{FallbackMode, SiteConfig};
use crate::content::ContentSource;
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::helpers::{is_valid_slug, post_path};
use crate::pages::{ListingPage, LoadMore};
use crate::templates::{ListingItemData, LOAD_MORE_SCRIPT, SCRIPT_PATH, STYLESHEET, STYLESHEET_PATH};
use crate::Blog;

/// Most missing paths remembered at once
const GONE_CAPACITY: usize = 256;

/// A page the server knows how to generate
#[derive(Debug, Clone)]
enum Target {
    Listing,
    Post(String),
}

impl Target {
    fn path(&self) -> String {
        match self {
            Target::Listing => "/".to_string(),
            Target::Post(slug) => post_path(slug),
        }
    }
}

/// Cache state of a path, detached from the cache lock
enum Cached {
    Fresh(String),
    Stale(String),
    Missing,
}

/// Server state
pub struct AppState<S> {
    source: S,
    generator: Generator,
    cache: RwLock<PageCache>,
    /// One generation lock per path
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Paths whose post was reported missing, with the time of the check
    gone: Mutex<HashMap<String, u64>>,
}

impl<S: ContentSource + 'static> AppState<S> {
    pub fn new(blog: Blog, source: S) -> Result<Self> {
        Ok(Self {
            cache: RwLock::new(PageCache::load(&blog.base_dir)),
            generator: Generator::new(&blog)?,
            source,
            locks: Mutex::new(HashMap::new()),
            gone: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.generator.blog().config
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    async fn cached(&self, path: &str) -> Cached {
        let cache = self.cache.read().await;
        match cache.lookup(path, now_secs(), self.config().revalidate) {
            Lookup::Fresh(entry) => Cached::Fresh(entry.output_path.clone()),
            Lookup::Stale(entry) => Cached::Stale(entry.output_path.clone()),
            Lookup::Missing => Cached::Missing,
        }
    }

    fn lock_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn path_lock(&self, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.lock_locks().entry(path.to_string()).or_default().clone()
    }

    /// Drop the lock of `path` once nobody holds or waits on it
    fn release_lock(&self, path: &str) {
        let mut locks = self.lock_locks();
        if locks
            .get(path)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(path);
        }
    }

    fn lock_gone(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.gone.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the post behind `path` was recently reported missing
    fn is_gone(&self, path: &str) -> bool {
        let mut gone = self.lock_gone();
        match gone.get(path) {
            Some(checked) if now_secs().saturating_sub(*checked) < self.config().revalidate => true,
            Some(_) => {
                gone.remove(path);
                false
            }
            None => false,
        }
    }

    /// Remember that the post behind `path` is missing
    fn mark_gone(&self, path: &str) {
        let now = now_secs();
        let window = self.config().revalidate;
        let mut gone = self.lock_gone();
        gone.retain(|_, checked| now.saturating_sub(*checked) < window);
        if gone.len() >= GONE_CAPACITY {
            let oldest = gone
                .iter()
                .min_by_key(|(_, checked)| **checked)
                .map(|(oldest, _)| oldest.clone());
            if let Some(oldest) = oldest {
                gone.remove(&oldest);
            }
        }
        gone.insert(path.to_string(), now);
    }

    /// Generate a page, write it and record it in the cache
    async fn regenerate(&self, target: &Target) -> Result<String> {
        let result = match target {
            Target::Listing => self.generator.generate_listing(&self.source).await,
            Target::Post(slug) => self.generator.generate_post(&self.source, slug).await,
        };
        let path = target.path();
        let page = match result {
            Ok(page) => page,
            Err(Error::NotFound(what)) => {
                self.forget(&path).await;
                return Err(Error::NotFound(what));
            }
            Err(e) => return Err(e),
        };

        self.generator.write_page(&page).await?;
        {
            let mut cache = self.cache.write().await;
            if cache.record(&page.path, &page.output_path, &page.html, now_secs()) {
                tracing::info!("Generated {}", page.path);
            } else {
                tracing::debug!("Regenerated {} (unchanged)", page.path);
            }
            if let Err(e) = cache.save_async(&self.generator.blog().base_dir).await {
                tracing::warn!("Failed to save page cache: {}", e);
            }
        }
        self.lock_gone().remove(&path);
        Ok(page.html)
    }

    /// Drop a page whose post no longer exists
    async fn forget(&self, path: &str) {
        {
            let mut cache = self.cache.write().await;
            if let Some(entry) = cache.remove(path) {
                if let Err(e) = self.generator.remove_page(&entry.output_path).await {
                    tracing::warn!("Failed to delete {}: {}", entry.output_path, e);
                }
                if let Err(e) = cache.save_async(&self.generator.blog().base_dir).await {
                    tracing::warn!("Failed to save page cache: {}", e);
                }
            }
        }
        self.mark_gone(path);
    }

    /// Regenerate in the background unless a generation is already running
    fn spawn_regeneration(self: &Arc<Self>, target: Target) {
        let path = target.path();
        let Ok(guard) = self.path_lock(&path).try_lock_owned() else {
            tracing::debug!("Generation of {} already in flight", path);
            return;
        };

        let state = Arc::clone(self);
        tokio::spawn(async move {
            // A generation that finished before this one got the lock is enough
            if !matches!(state.cached(&path).await, Cached::Fresh(_)) {
                match state.regenerate(&target).await {
                    Ok(_) => {}
                    Err(Error::NotFound(_)) => tracing::info!("{} no longer exists", path),
                    Err(e) => tracing::warn!(%e, "Background generation of {} failed", path),
                }
            }
            drop(guard);
            state.release_lock(&path);
        });
    }

    /// Generate while the request waits, sharing the path lock
    async fn generate_inline(&self, target: &Target) -> Result<String> {
        let path = target.path();
        let lock = self.path_lock(&path);
        let result = {
            let _guard = lock.lock().await;
            self.generate_locked(target, &path).await
        };
        drop(lock);
        self.release_lock(&path);
        result
    }

    async fn generate_locked(&self, target: &Target, path: &str) -> Result<String> {
        // Another request may have generated the page while this one waited
        if let Cached::Fresh(output_path) = self.cached(path).await {
            if let Ok(html) = self.generator.read_page(&output_path).await {
                return Ok(html);
            }
        }
        if self.is_gone(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        self.regenerate(target).await
    }

    async fn serve(self: &Arc<Self>, target: Target) -> Response {
        let path = target.path();
        if self.is_gone(&path) {
            return self.error_page(Error::NotFound(path));
        }

        match self.cached(&path).await {
            Cached::Fresh(output_path) => self.read_or_generate(&target, &output_path).await,
            Cached::Stale(output_path) => {
                let response = self.read_or_generate(&target, &output_path).await;
                self.spawn_regeneration(target);
                response
            }
            Cached::Missing => match (&target, self.config().fallback) {
                (Target::Post(slug), FallbackMode::Loading) => {
                    self.spawn_regeneration(target.clone());
                    self.fallback_page(slug)
                }
                _ => self.generate_response(&target).await,
            },
        }
    }

    async fn read_or_generate(&self, target: &Target, output_path: &str) -> Response {
        match self.generator.read_page(output_path).await {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::warn!("Cached page {} is unreadable: {}", output_path, e);
                self.generate_response(target).await
            }
        }
    }

    async fn generate_response(&self, target: &Target) -> Response {
        match self.generate_inline(target).await {
            Ok(html) => Html(html).into_response(),
            Err(e) => self.error_page(e),
        }
    }

    fn fallback_page(&self, slug: &str) -> Response {
        match self.generator.render_fallback(slug) {
            Ok(html) => ([(header::CACHE_CONTROL, "no-store")], Html(html)).into_response(),
            Err(e) => self.error_page(e),
        }
    }

    /// Themed 404 / 502 / 500 page for an error
    fn error_page(&self, e: Error) -> Response {
        let status = e.status();
        let rendered = match &e {
            Error::NotFound(what) => {
                tracing::debug!("Not found: {}", what);
                self.generator.render_not_found()
            }
            Error::InvalidCursor(_) => return e.into_response(),
            _ => {
                tracing::error!(%e, "request failed");
                self.generator.render_error()
            }
        };

        match rendered {
            Ok(html) => (status, Html(html)).into_response(),
            Err(render_error) => {
                tracing::error!(%render_error, "failed to render error page");
                e.into_response()
            }
        }
    }
}

/// Query of `/posts/more`
#[derive(Debug, Deserialize)]
pub struct MoreQuery {
    pub cursor: Option<String>,
}

/// Body of `/posts/more`
#[derive(Debug, Serialize)]
pub struct MorePosts {
    pub next_page: Option<String>,
    pub posts: Vec<ListingItemData>,
}

async fn home<S: ContentSource + 'static>(State(state): State<Arc<AppState<S>>>) -> Response {
    state.serve(Target::Listing).await
}

async fn post<S: ContentSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(slug): Path<String>,
) -> Response {
    if !is_valid_slug(&slug) {
        return state.error_page(Error::NotFound(slug));
    }
    state.serve(Target::Post(slug)).await
}

/// Next page of posts as JSON
///
/// Each continuation fetch is served on its own, so duplicates are only
/// skipped within the fetched page; the browser script skips posts it has
/// already shown.
async fn more_posts<S: ContentSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<MoreQuery>,
) -> Result<Json<MorePosts>> {
    let cursor = query
        .cursor
        .filter(|cursor| !cursor.is_empty())
        .ok_or_else(|| Error::InvalidCursor("missing cursor".to_string()))?;
    state.source.check_cursor(&cursor)?;

    let config = state.config();
    let mut listing = ListingPage::resume(
        cursor,
        state.generator.formatter().clone(),
        config.listing.dedupe,
    );
    match listing
        .handle_load_more(&state.source, config.content.page_size)
        .await?
    {
        LoadMore::Appended(appended) => {
            tracing::debug!(added = appended.added, "Served next page of posts")
        }
        LoadMore::Rejected(rejected) => tracing::debug!(?rejected, "Load more rejected"),
    }

    Ok(Json(MorePosts {
        next_page: listing.next_page().map(str::to_string),
        posts: state.generator.listing_data(listing.items()),
    }))
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET)
}

async fn load_more_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        LOAD_MORE_SCRIPT,
    )
}

/// Serve other files from the public directory
async fn static_files<S: ContentSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();
    let mut service = ServeDir::new(&state.generator.blog().public_dir);
    match service.try_call(request).await {
        Ok(response) if response.status() != StatusCode::NOT_FOUND => response.into_response(),
        Ok(_) => state.error_page(Error::NotFound(path)),
        Err(e) => state.error_page(Error::Io(e)),
    }
}

/// Build the router, nested under the configured root
pub fn router<S: ContentSource + 'static>(state: Arc<AppState<S>>) -> Router {
    let root = state.config().root.trim_end_matches('/').to_string();

    let app = Router::new()
        .route("/", get(home::<S>))
        .route("/post/:slug", get(post::<S>))
        .route("/posts/more", get(more_posts::<S>))
        .route(&format!("/{}", STYLESHEET_PATH), get(stylesheet))
        .route(&format!("/{}", SCRIPT_PATH), get(load_more_script))
        .fallback(static_files::<S>)
        .with_state(state);

    let app = if root.is_empty() {
        app
    } else {
        Router::new().nest(&root, app)
    };
    add_middlewares(app)
}

fn add_middlewares(router: Router) -> Router {
    fn log_failure(
        err: tower_http::classify::ServerErrorsFailureClass,
        _latency: std::time::Duration,
        _span: &tracing::Span,
    ) {
        tracing::error!(error = %err, "request failed");
    }

    router.layer(TraceLayer::new_for_http().on_failure(log_failure))
}

/// Start the blog server
pub async fn start(blog: &Blog, ip: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(blog.clone(), blog.source()?)?;
    state.generator.write_assets()?;
    let app = router(Arc::new(state));

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ApiDocument, SnapshotSource};
    use serde_json::json;
    use std::time::Duration;

    fn state(dir: &std::path::Path, configure: impl FnOnce(&mut SiteConfig)) -> Arc<AppState<SnapshotSource>> {
        let mut config = SiteConfig::default();
        configure(&mut config);
        let source = SnapshotSource::new(vec![ApiDocument {
            id: "d1".to_string(),
            uid: Some("hooks".to_string()),
            doc_type: "posts".to_string(),
            first_publication_date: None,
            data: json!({"title": "Como utilizar Hooks", "author": "Ana"}),
        }]);
        Arc::new(AppState::new(Blog::with_config(dir, config), source).unwrap())
    }

    async fn wait_until_unlocked(state: &AppState<SnapshotSource>) {
        for _ in 0..200 {
            if state.lock_locks().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("path locks were never released");
    }

    #[tokio::test]
    async fn test_missing_posts_do_not_grow_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), |config| config.fallback = FallbackMode::Blocking);

        for i in 0..GONE_CAPACITY + 50 {
            let response = state.serve(Target::Post(format!("nope-{}", i))).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        assert!(state.lock_locks().is_empty());
        assert_eq!(state.lock_gone().len(), GONE_CAPACITY);
    }

    #[tokio::test]
    async fn test_background_generation_releases_locks() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), |_| {});

        for i in 0..20 {
            let response = state.serve(Target::Post(format!("nope-{}", i))).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = state.serve(Target::Post("hooks".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);

        wait_until_unlocked(&state).await;
        assert_eq!(state.lock_gone().len(), 20);
        assert!(matches!(state.cached("/post/hooks").await, Cached::Fresh(_)));
    }

    #[test]
    fn test_expired_gone_entries_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), |config| config.revalidate = 0);

        for i in 0..10 {
            state.mark_gone(&format!("/post/nope-{}", i));
        }
        assert_eq!(state.lock_gone().len(), 1);
        assert!(!state.is_gone("/post/nope-9"));
    }
}
