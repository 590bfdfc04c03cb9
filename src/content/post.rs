//! Post models

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::richtext::{self, Block};
use crate::error::{Error, Result};
use crate::helpers::parse_timestamp;

/// A document as returned by the content API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDocument {
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// A blog post, as fetched. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Repository document id
    pub id: String,

    /// URL-friendly unique identifier (absent for previews)
    pub uid: Option<String>,

    /// First publication date (absent for unpublished documents)
    pub first_publication_date: Option<DateTime<FixedOffset>>,

    pub title: String,
    pub subtitle: String,
    pub author: String,

    pub banner: Option<Banner>,

    /// Ordered content sections
    pub content: Vec<ContentSection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub url: String,
    pub alt: Option<String>,
}

/// A heading plus its structured rich-text body
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSection {
    pub heading: String,
    pub body: Vec<Block>,
}

/// One page of posts plus the cursor to the next page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostPagination {
    /// `None` exactly when no further pages exist
    pub next_page: Option<String>,
    pub results: Vec<Post>,
}

impl Post {
    /// Validate an API document into a post
    ///
    /// Fails with `MalformedContent` naming the document and the field when
    /// anything the pages render is missing or has the wrong shape.
    pub fn from_document(doc: ApiDocument) -> Result<Self> {
        let id = doc.id;
        let data = match doc.data {
            Value::Object(map) => map,
            _ => return Err(Error::malformed(&id, "`data` is not an object")),
        };

        let first_publication_date = match doc.first_publication_date.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                Error::malformed(&id, format!("invalid first_publication_date {:?}", raw))
            })?),
        };

        let title = required_text(&id, data.get("title"), "title")?;
        let author = required_text(&id, data.get("author"), "author")?;
        let subtitle = optional_text(&id, data.get("subtitle"), "subtitle")?.unwrap_or_default();

        let banner = match data.get("banner") {
            None | Some(Value::Null) => None,
            Some(value) => match value.get("url").and_then(Value::as_str) {
                Some(url) if !url.is_empty() => Some(Banner {
                    url: url.to_string(),
                    alt: value.get("alt").and_then(Value::as_str).map(str::to_string),
                }),
                // An image field with nothing selected comes back as `{}`
                _ => None,
            },
        };

        let content = match data.get("content") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(sections)) => sections
                .iter()
                .enumerate()
                .map(|(i, section)| parse_section(&id, i, section))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(Error::malformed(&id, "`content` is not a list")),
        };

        Ok(Self {
            id,
            uid: doc.uid.filter(|uid| !uid.is_empty()),
            first_publication_date,
            title,
            subtitle,
            author,
            banner,
            content,
        })
    }
}

fn parse_section(id: &str, index: usize, value: &Value) -> Result<ContentSection> {
    let heading = optional_text(id, value.get("heading"), "content.heading")?.unwrap_or_default();
    let body = match value.get("body") {
        None | Some(Value::Null) => Vec::new(),
        Some(body) => serde_json::from_value::<Vec<Block>>(body.clone()).map_err(|e| {
            Error::malformed(id, format!("content[{}].body: {}", index, e))
        })?,
    };
    Ok(ContentSection { heading, body })
}

/// A text field may be key text (a string) or a rich-text title (blocks)
fn optional_text(id: &str, value: Option<&Value>, field: &str) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(blocks @ Value::Array(_)) => serde_json::from_value::<Vec<Block>>(blocks.clone())
            .map(|blocks| Some(richtext::as_text(&blocks)))
            .map_err(|e| Error::malformed(id, format!("`{}`: {}", field, e))),
        Some(_) => Err(Error::malformed(id, format!("`{}` is not text", field))),
    }
}

fn required_text(id: &str, value: Option<&Value>, field: &str) -> Result<String> {
    match optional_text(id, value, field)? {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(Error::malformed(id, format!("missing `{}`", field))),
    }
}
