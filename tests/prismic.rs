use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{RawQuery, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower::util::ServiceExt;

use blog_ignite::{
    config::SiteConfig,
    content::{ContentSource, PrismicClient},
    generator::Generator,
    server::{self, AppState},
    Blog,
};

const TOKEN: &str = "SECRET-TOKEN";

fn has_token(query: &Option<String>) -> bool {
    query
        .as_deref()
        .is_some_and(|q| q.split('&').any(|pair| pair == format!("access_token={}", TOKEN)))
}

async fn api_root(RawQuery(query): RawQuery) -> Response {
    if !has_token(&query) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"refs": [{"id": "master", "ref": "REF1", "isMasterRef": true}]})).into_response()
}

/// Search endpoint that, like the real API, echoes the request query in `next_page`
async fn search(State(addr): State<SocketAddr>, RawQuery(query): RawQuery) -> Response {
    if !has_token(&query) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let query = query.unwrap_or_default();
    let second = query.split('&').any(|pair| pair == "page=2");
    let (n, next_page) = if second {
        (2, None)
    } else {
        (
            1,
            Some(format!(
                "http://{}/api/v2/documents/search?{}&page=2",
                addr, query
            )),
        )
    };

    Json(json!({
        "next_page": next_page,
        "results": [{
            "id": format!("d{}", n),
            "uid": format!("post-{}", n),
            "type": "posts",
            "first_publication_date": "2021-03-15T19:25:28+0000",
            "data": {"title": format!("Post {}", n), "author": "Joseph Oliveira"}
        }]
    }))
    .into_response()
}

async fn spawn_repository() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub address");
    let app = Router::new()
        .route("/api/v2", get(api_root))
        .route("/api/v2/documents/search", get(search))
        .with_state(addr);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });
    addr
}

fn blog(dir: &std::path::Path, addr: SocketAddr) -> Blog {
    let mut config = SiteConfig::default();
    config.content.endpoint = format!("http://{}/api/v2", addr);
    config.content.access_token = Some(TOKEN.to_string());
    config.content.retries = 0;
    Blog::with_config(dir, config)
}

#[tokio::test]
async fn listing_cursor_never_carries_the_token() {
    let addr = spawn_repository().await;
    let dir = tempfile::tempdir().expect("create site dir");
    let blog = blog(dir.path(), addr);
    let client = PrismicClient::new(&blog.config.content).expect("create client");

    let generator = Generator::new(&blog).expect("create generator");
    let page = generator
        .generate_listing(&client)
        .await
        .expect("generate listing");
    assert!(page.html.contains("Post 1"));
    assert!(page.html.contains("data-cursor="));
    assert!(!page.html.contains(TOKEN));

    // The cursor still works: the client adds the token back when following it
    let first = client.list_posts(20, None).await.expect("first page");
    let cursor = first.next_page.expect("cursor");
    assert!(!cursor.contains(TOKEN));
    let second = client
        .list_posts(20, Some(&cursor))
        .await
        .expect("second page");
    assert_eq!(second.results[0].title, "Post 2");
    assert_eq!(second.next_page, None);
}

#[tokio::test]
async fn more_posts_json_never_carries_the_token() {
    let addr = spawn_repository().await;
    let dir = tempfile::tempdir().expect("create site dir");
    let blog = blog(dir.path(), addr);
    let client = PrismicClient::new(&blog.config.content).expect("create client");
    let cursor = client
        .list_posts(20, None)
        .await
        .expect("first page")
        .next_page
        .expect("cursor");

    let state = AppState::new(blog, client).expect("create state");
    let router = server::router(Arc::new(state));
    let uri = format!(
        "/posts/more?cursor={}",
        percent_encoding::utf8_percent_encode(&cursor, percent_encoding::NON_ALPHANUMERIC)
    );
    let resp = router
        .oneshot(Request::get(uri).body(Body::empty()).expect("build request"))
        .await
        .expect("oneshot fail");
    assert_eq!(resp.status(), StatusCode::OK);

    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = String::from_utf8(body.to_vec()).expect("utf-8 body");
    assert!(body.contains("Post 2"));
    assert!(!body.contains(TOKEN));
}
