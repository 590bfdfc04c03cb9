//! Content repository clients
//!
//! `ContentSource` is the read-only seam between the pages and the content
//! store. `PrismicClient` talks to the Prismic REST API v2; `SnapshotSource`
//! serves documents from a JSON file written by the `snapshot` command.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::{StatusCode, Url};

use super::post::{ApiDocument, Post, PostPagination};
use crate::config::ContentConfig;
use crate::error::{Error, Result};

/// How long a resolved master ref is reused before asking the API again
const REF_TTL: Duration = Duration::from_secs(5);

/// Cursor prefix used by snapshot paging
const SNAPSHOT_CURSOR: &str = "snapshot:";

/// Read-only access to posts in the content repository
pub trait ContentSource: Send + Sync {
    /// Fetch one page of posts, starting at `cursor` when given
    fn list_posts(
        &self,
        page_size: usize,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<PostPagination>> + Send;

    /// Fetch one post by its uid
    fn get_post_by_id(&self, uid: &str) -> impl Future<Output = Result<Post>> + Send;

    /// Reject cursors that do not come from this repository
    fn check_cursor(&self, cursor: &str) -> Result<()>;
}

/// Follow cursors until the repository reports no further pages
pub async fn list_all_posts<S: ContentSource>(source: &S, page_size: usize) -> Result<Vec<Post>> {
    let mut posts = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = source.list_posts(page_size, cursor.as_deref()).await?;
        posts.extend(page.results);
        match page.next_page {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            Some(next) => {
                tracing::warn!("Repository returned the same cursor twice: {}", next);
                break;
            }
            None => break,
        }
    }

    Ok(posts)
}

fn to_pagination(next_page: Option<String>, documents: Vec<ApiDocument>) -> Result<PostPagination> {
    let results = documents
        .into_iter()
        .map(Post::from_document)
        .collect::<Result<Vec<_>>>()?;
    Ok(PostPagination { next_page, results })
}

#[derive(Deserialize)]
struct ApiRoot {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    next_page: Option<String>,
    #[serde(default)]
    results: Vec<ApiDocument>,
}

/// Answers worth asking again: server errors and rate limiting
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

enum Failure {
    Retry(Error),
    Fatal(Error),
}

/// Client for the Prismic REST API v2
pub struct PrismicClient {
    client: reqwest::Client,
    endpoint: Url,
    access_token: Option<String>,
    document_type: String,
    orderings: Option<String>,
    retries: u32,
    backoff: Duration,
    master_ref: Mutex<Option<(String, Instant)>>,
}

impl PrismicClient {
    pub fn new(config: &ContentConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(Error::Config(
                "content.endpoint is not set (or export PRISMIC_API_ENDPOINT)".to_string(),
            ));
        }
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("invalid content.endpoint: {}", e)))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            access_token: config.access_token.clone(),
            document_type: config.document_type.clone(),
            orderings: config.orderings.clone(),
            retries: config.retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            master_ref: Mutex::new(None),
        })
    }

    fn search_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        let path = format!("{}/documents/search", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url
    }

    fn with_token(&self, mut url: Url) -> Url {
        if let Some(token) = &self.access_token {
            if !url.query_pairs().any(|(k, _)| k == "access_token") {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }
        url
    }

    /// Drop the access token from a cursor before it leaves the client
    fn without_token(&self, cursor: String) -> String {
        let Ok(mut url) = Url::parse(&cursor) else {
            return cursor;
        };
        if !url.query_pairs().any(|(k, _)| k == "access_token") {
            return cursor;
        }
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "access_token")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        url.to_string()
    }

    /// Fetch one page of raw documents
    ///
    /// The returned cursor never carries the access token; it is added back
    /// when the cursor is followed.
    pub async fn list_documents(
        &self,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<(Option<String>, Vec<ApiDocument>)> {
        let url = match cursor {
            Some(cursor) => {
                self.check_cursor(cursor)?;
                Url::parse(cursor).map_err(|e| Error::InvalidCursor(e.to_string()))?
            }
            None => {
                let reference = self.master_ref().await?;
                let mut url = self.search_url();
                {
                    let mut query = url.query_pairs_mut();
                    query
                        .append_pair("ref", &reference)
                        .append_pair(
                            "q",
                            &format!("[[at(document.type,\"{}\")]]", self.document_type),
                        )
                        .append_pair("pageSize", &page_size.max(1).to_string());
                    if let Some(orderings) = &self.orderings {
                        query.append_pair("orderings", orderings);
                    }
                }
                url
            }
        };

        let response: SearchResponse = self.get_json(self.with_token(url)).await?;
        tracing::debug!(
            "Fetched {} documents (more: {})",
            response.results.len(),
            response.next_page.is_some()
        );
        let next_page = response.next_page.map(|next| self.without_token(next));
        Ok((next_page, response.results))
    }

    /// Fetch every document of the configured type
    pub async fn all_documents(&self, page_size: usize) -> Result<Vec<ApiDocument>> {
        let mut documents = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let (next, mut page) = self.list_documents(page_size, cursor.as_deref()).await?;
            documents.append(&mut page);
            match next {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(documents)
    }

    async fn master_ref(&self) -> Result<String> {
        if let Ok(cached) = self.master_ref.lock() {
            if let Some((reference, fetched_at)) = cached.as_ref() {
                if fetched_at.elapsed() < REF_TTL {
                    return Ok(reference.clone());
                }
            }
        }

        let root: ApiRoot = self.get_json(self.with_token(self.endpoint.clone())).await?;
        let reference = root
            .refs
            .into_iter()
            .find(|r| r.is_master)
            .map(|r| r.reference)
            .ok_or_else(|| {
                Error::RepositoryUnavailable("API root lists no master ref".to_string())
            })?;

        if let Ok(mut cached) = self.master_ref.lock() {
            *cached = Some((reference.clone(), Instant::now()));
        }
        Ok(reference)
    }

    /// GET a JSON document, retrying transport failures, 5xx and 429 answers
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut attempt = 0;
        loop {
            match self.get_once(url.clone()).await {
                Ok(value) => return Ok(value),
                Err(Failure::Retry(e)) if attempt < self.retries => {
                    attempt += 1;
                    let delay = self.backoff * attempt;
                    tracing::warn!(%e, attempt, "content request failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(Failure::Retry(e)) | Err(Failure::Fatal(e)) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: Url) -> core::result::Result<T, Failure> {
        let path = url.path().to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Failure::Retry(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let e = Error::RepositoryUnavailable(format!("{} answered {}", path, status));
            return Err(if is_retryable(status) {
                Failure::Retry(e)
            } else {
                Failure::Fatal(e)
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                Failure::Fatal(Error::malformed(path, e.to_string()))
            } else {
                Failure::Retry(e.into())
            }
        })
    }
}

impl ContentSource for PrismicClient {
    async fn list_posts(&self, page_size: usize, cursor: Option<&str>) -> Result<PostPagination> {
        let (next_page, documents) = self.list_documents(page_size, cursor).await?;
        to_pagination(next_page, documents)
    }

    async fn get_post_by_id(&self, uid: &str) -> Result<Post> {
        let reference = self.master_ref().await?;
        let mut url = self.search_url();
        url.query_pairs_mut()
            .append_pair("ref", &reference)
            .append_pair(
                "q",
                &format!(
                    "[[at(my.{}.uid,\"{}\")]]",
                    self.document_type,
                    uid.replace('\\', "\\\\").replace('"', "\\\"")
                ),
            )
            .append_pair("pageSize", "1");

        let response: SearchResponse = self.get_json(self.with_token(url)).await?;
        match response.results.into_iter().next() {
            Some(document) => Post::from_document(document),
            None => Err(Error::NotFound(uid.to_string())),
        }
    }

    fn check_cursor(&self, cursor: &str) -> Result<()> {
        let url = Url::parse(cursor).map_err(|e| Error::InvalidCursor(e.to_string()))?;
        let search = self.search_url();
        if url.scheme() == search.scheme()
            && url.host_str() == search.host_str()
            && url.port_or_known_default() == search.port_or_known_default()
            && url.path() == search.path()
        {
            Ok(())
        } else {
            Err(Error::InvalidCursor(format!(
                "{} is not a page of {}",
                cursor, self.endpoint
            )))
        }
    }
}

/// Snapshot file layout
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: String,
    pub documents: Vec<ApiDocument>,
}

/// Serves documents from memory, paging with `snapshot:<offset>` cursors
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    documents: Vec<ApiDocument>,
}

impl SnapshotSource {
    pub fn new(documents: Vec<ApiDocument>) -> Self {
        Self { documents }
    }

    /// Load a snapshot file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        tracing::debug!(
            "Loaded {} documents from snapshot {:?}",
            snapshot.documents.len(),
            path.as_ref()
        );
        Ok(Self::new(snapshot.documents))
    }

    /// Write documents to a snapshot file
    pub fn save<P: AsRef<Path>>(documents: Vec<ApiDocument>, path: P) -> Result<()> {
        let snapshot = Snapshot {
            generated_at: chrono::Utc::now().to_rfc3339(),
            documents,
        };
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }

    fn offset(cursor: &str) -> Result<usize> {
        cursor
            .strip_prefix(SNAPSHOT_CURSOR)
            .and_then(|offset| offset.parse().ok())
            .ok_or_else(|| Error::InvalidCursor(cursor.to_string()))
    }
}

impl ContentSource for SnapshotSource {
    async fn list_posts(&self, page_size: usize, cursor: Option<&str>) -> Result<PostPagination> {
        let start = match cursor {
            Some(cursor) => Self::offset(cursor)?.min(self.documents.len()),
            None => 0,
        };
        let end = (start + page_size.max(1)).min(self.documents.len());
        let next_page = (end < self.documents.len()).then(|| format!("{}{}", SNAPSHOT_CURSOR, end));
        to_pagination(next_page, self.documents[start..end].to_vec())
    }

    async fn get_post_by_id(&self, uid: &str) -> Result<Post> {
        match self
            .documents
            .iter()
            .find(|doc| doc.uid.as_deref() == Some(uid))
        {
            Some(document) => Post::from_document(document.clone()),
            None => Err(Error::NotFound(uid.to_string())),
        }
    }

    fn check_cursor(&self, cursor: &str) -> Result<()> {
        Self::offset(cursor).map(|_| ())
    }
}

/// The source a site is configured with
pub enum Source {
    Prismic(PrismicClient),
    Snapshot(SnapshotSource),
}

impl Source {
    pub fn from_config(config: &ContentConfig, base_dir: &Path) -> Result<Self> {
        match &config.snapshot {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                Ok(Source::Snapshot(SnapshotSource::load(path)?))
            }
            None => Ok(Source::Prismic(PrismicClient::new(config)?)),
        }
    }
}

impl ContentSource for Source {
    async fn list_posts(&self, page_size: usize, cursor: Option<&str>) -> Result<PostPagination> {
        match self {
            Source::Prismic(client) => client.list_posts(page_size, cursor).await,
            Source::Snapshot(snapshot) => snapshot.list_posts(page_size, cursor).await,
        }
    }

    async fn get_post_by_id(&self, uid: &str) -> Result<Post> {
        match self {
            Source::Prismic(client) => client.get_post_by_id(uid).await,
            Source::Snapshot(snapshot) => snapshot.get_post_by_id(uid).await,
        }
    }

    fn check_cursor(&self, cursor: &str) -> Result<()> {
        match self {
            Source::Prismic(client) => client.check_cursor(cursor),
            Source::Snapshot(snapshot) => snapshot.check_cursor(cursor),
        }
    }
}
