use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::util::ServiceExt;

use blog_ignite::{
    config::{FallbackMode, SiteConfig},
    content::{ApiDocument, ContentSource, Post, PostPagination, SnapshotSource},
    server::{self, AppState},
    Blog, Result,
};

fn document(id: &str, uid: &str, title: &str) -> ApiDocument {
    ApiDocument {
        id: id.to_string(),
        uid: Some(uid.to_string()),
        doc_type: "posts".to_string(),
        first_publication_date: Some("2021-03-15T19:25:28+0000".to_string()),
        data: json!({
            "title": title,
            "subtitle": "Pensando em sincronização em vez de ciclos de vida.",
            "author": "Joseph Oliveira",
            "banner": {"url": "https://images.prismic.io/banner.png", "alt": null},
            "content": [{
                "heading": "Proin et varius",
                "body": [{"type": "paragraph", "text": "Hello world", "spans": [
                    {"start": 0, "end": 5, "type": "strong"}
                ]}]
            }]
        }),
    }
}

fn documents() -> Vec<ApiDocument> {
    vec![
        document("d1", "como-utilizar-hooks", "Como utilizar Hooks"),
        document("d2", "criando-um-app-cra-do-zero", "Criando um app CRA do zero"),
        document("d3", "mapas-com-react", "Mapas com React usando Leaflet"),
    ]
}

/// Snapshot-backed source whose documents can be swapped during a test.
/// Counts post lookups, each of which takes a little while.
#[derive(Clone)]
struct MutableSource {
    inner: Arc<RwLock<SnapshotSource>>,
    lookups: Arc<AtomicUsize>,
}

impl MutableSource {
    fn new(documents: Vec<ApiDocument>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SnapshotSource::new(documents))),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn replace(&self, documents: Vec<ApiDocument>) {
        *self.inner.write().unwrap() = SnapshotSource::new(documents);
    }

    fn current(&self) -> SnapshotSource {
        self.inner.read().unwrap().clone()
    }
}

impl ContentSource for MutableSource {
    async fn list_posts(&self, page_size: usize, cursor: Option<&str>) -> Result<PostPagination> {
        let source = self.current();
        source.list_posts(page_size, cursor).await
    }

    async fn get_post_by_id(&self, uid: &str) -> Result<Post> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let source = self.current();
        source.get_post_by_id(uid).await
    }

    fn check_cursor(&self, cursor: &str) -> Result<()> {
        self.current().check_cursor(cursor)
    }
}

struct TestApp {
    router: Router,
    source: MutableSource,
    _dir: tempfile::TempDir,
}

impl TestApp {
    fn new(configure: impl FnOnce(&mut SiteConfig)) -> Self {
        let dir = tempfile::tempdir().expect("create site dir");
        let mut config = SiteConfig::default();
        config.content.page_size = 2;
        configure(&mut config);

        let source = MutableSource::new(documents());
        let blog = Blog::with_config(dir.path(), config);
        let state = AppState::new(blog, source.clone()).expect("create state");

        Self {
            router: server::router(Arc::new(state)),
            source,
            _dir: dir,
        }
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        let req = Request::get(uri).body(Body::empty()).expect("build request");
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot fail");
        let status = resp.status();
        let data = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, String::from_utf8(data.to_vec()).expect("utf-8 body"))
    }

    /// Send `count` requests for `uri` at once
    async fn get_concurrently(&self, uri: &str, count: usize) -> Vec<(StatusCode, String)> {
        let handles: Vec<_> = (0..count)
            .map(|_| {
                let router = self.router.clone();
                let req = Request::get(uri).body(Body::empty()).expect("build request");
                tokio::spawn(async move {
                    let resp = router.oneshot(req).await.expect("oneshot fail");
                    let status = resp.status();
                    let data = to_bytes(resp.into_body(), usize::MAX)
                        .await
                        .expect("read body");
                    (status, String::from_utf8(data.to_vec()).expect("utf-8 body"))
                })
            })
            .collect();

        let mut responses = Vec::new();
        for handle in handles {
            responses.push(handle.await.expect("request task"));
        }
        responses
    }

    /// Request `uri` until the body contains `needle`
    async fn wait_for(&self, uri: &str, needle: &str) -> (StatusCode, String) {
        for _ in 0..200 {
            let (status, body) = self.get(uri).await;
            if body.contains(needle) {
                return (status, body);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never contained {:?}", uri, needle);
    }
}

#[tokio::test]
async fn listing_shows_first_page_with_cursor() {
    let app = TestApp::new(|_| {});
    let (status, body) = app.get("/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Como utilizar Hooks"));
    assert!(body.contains("Criando um app CRA do zero"));
    assert!(!body.contains("Mapas com React"));
    assert!(body.contains("15 mar 2021"));
    assert!(body.contains("Carregar mais posts"));
    assert!(body.contains("data-cursor=\"snapshot:2\""));
}

#[tokio::test]
async fn blocking_post_is_rendered_on_first_request() {
    let app = TestApp::new(|config| config.fallback = FallbackMode::Blocking);
    let (status, body) = app.get("/post/como-utilizar-hooks").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>Como utilizar Hooks</h1>"));
    assert!(body.contains("<p><strong>Hello</strong> world</p>"));
    assert!(body.contains("1 min"));
    assert!(body.contains("Joseph Oliveira"));
}

#[tokio::test]
async fn unregistered_post_shows_fallback_then_post() {
    let app = TestApp::new(|_| {});

    let (status, body) = app.get("/post/mapas-com-react").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Carregando..."));
    assert!(!body.contains("Mapas com React"));

    let (status, body) = app
        .wait_for("/post/mapas-com-react", "Mapas com React usando Leaflet")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("Carregando..."));
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let app = TestApp::new(|config| config.fallback = FallbackMode::Blocking);
    let (status, body) = app.get("/post/nao-existe").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Post não encontrado"));

    let (status, _) = app.get("/post/bad%20slug").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_post_with_loading_fallback_ends_as_not_found() {
    let app = TestApp::new(|_| {});
    let (status, _) = app.get("/post/nao-existe").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.wait_for("/post/nao-existe", "Post não encontrado").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn more_posts_returns_next_page() {
    let app = TestApp::new(|_| {});
    let (status, body) = app.get("/posts/more?cursor=snapshot:2").await;
    assert_eq!(status, StatusCode::OK);

    let page: serde_json::Value = serde_json::from_str(&body).expect("json body");
    assert_eq!(page["next_page"], serde_json::Value::Null);
    let posts = page["posts"].as_array().expect("posts array");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Mapas com React usando Leaflet");
    assert_eq!(posts[0]["date"], "15 mar 2021");
    assert_eq!(posts[0]["href"], "/post/mapas-com-react");
    assert!(posts[0].get("reading_time").is_none());
}

#[tokio::test]
async fn more_posts_rejects_foreign_cursor() {
    let app = TestApp::new(|_| {});
    let (status, _) = app
        .get("/posts/more?cursor=https%3A%2F%2Fevil.example%2Fsearch")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/posts/more").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stale_page_is_served_then_regenerated() {
    let app = TestApp::new(|config| config.revalidate = 0);
    let (_, body) = app.get("/").await;
    assert!(body.contains("Como utilizar Hooks"));

    let mut updated = documents();
    updated[0] = document("d1", "como-utilizar-hooks", "Hooks revisitados");
    app.source.replace(updated);

    // The stale page answers first while it is regenerated
    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Como utilizar Hooks"));

    app.wait_for("/", "Hooks revisitados").await;
}

#[tokio::test]
async fn assets_are_served() {
    let app = TestApp::new(|_| {});
    let req = Request::get("/assets/style.css")
        .body(Body::empty())
        .expect("build request");
    let resp = app.router.clone().oneshot(req).await.expect("oneshot fail");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/css; charset=utf-8"
    );

    let (status, body) = app.get("/nothing-here.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Post não encontrado"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_blocking_requests_generate_once() {
    let app = TestApp::new(|config| config.fallback = FallbackMode::Blocking);

    let responses = app.get_concurrently("/post/mapas-com-react", 8).await;
    for (status, body) in &responses {
        assert_eq!(*status, StatusCode::OK);
        assert!(body.contains("Mapas com React usando Leaflet"));
    }
    assert_eq!(app.source.lookups(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_loading_requests_generate_once() {
    let app = TestApp::new(|_| {});

    let responses = app.get_concurrently("/post/mapas-com-react", 8).await;
    for (status, _) in &responses {
        assert_eq!(*status, StatusCode::OK);
    }
    app.wait_for("/post/mapas-com-react", "Mapas com React usando Leaflet")
        .await;
    assert_eq!(app.source.lookups(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_missing_post_look_up_once() {
    let app = TestApp::new(|config| config.fallback = FallbackMode::Blocking);

    let responses = app.get_concurrently("/post/nao-existe", 8).await;
    for (status, _) in &responses {
        assert_eq!(*status, StatusCode::NOT_FOUND);
    }
    assert_eq!(app.source.lookups(), 1);
}
