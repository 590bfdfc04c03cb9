//! Structured rich text as delivered by the content API
//!
//! A rich-text field is a sequence of typed blocks. Text blocks carry their
//! plain text plus span annotations (`start`/`end` offsets in UTF-16 code
//! units) marking bold, italic, link and label runs. This module turns those
//! blocks into plain text (for word counting) and into escaped HTML.

use serde::Deserialize;

use crate::helpers::html_escape;

/// One block of a rich-text field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    #[serde(rename = "paragraph")]
    Paragraph(TextBlock),
    #[serde(rename = "heading1")]
    Heading1(TextBlock),
    #[serde(rename = "heading2")]
    Heading2(TextBlock),
    #[serde(rename = "heading3")]
    Heading3(TextBlock),
    #[serde(rename = "heading4")]
    Heading4(TextBlock),
    #[serde(rename = "heading5")]
    Heading5(TextBlock),
    #[serde(rename = "heading6")]
    Heading6(TextBlock),
    #[serde(rename = "preformatted")]
    Preformatted(TextBlock),
    #[serde(rename = "list-item")]
    ListItem(TextBlock),
    #[serde(rename = "o-list-item")]
    OrderedListItem(TextBlock),
    #[serde(rename = "image")]
    Image(ImageBlock),
    #[serde(rename = "embed")]
    Embed(EmbedBlock),
    #[serde(other)]
    Unsupported,
}

impl Block {
    /// Shorthand for a paragraph
    pub fn paragraph(text: impl Into<String>, spans: Vec<Span>) -> Self {
        Block::Paragraph(TextBlock {
            text: text.into(),
            spans,
        })
    }

    /// The text payload, for text-bearing blocks
    pub fn text_block(&self) -> Option<&TextBlock> {
        match self {
            Block::Paragraph(t)
            | Block::Heading1(t)
            | Block::Heading2(t)
            | Block::Heading3(t)
            | Block::Heading4(t)
            | Block::Heading5(t)
            | Block::Heading6(t)
            | Block::Preformatted(t)
            | Block::ListItem(t)
            | Block::OrderedListItem(t) => Some(t),
            _ => None,
        }
    }

    fn element(&self) -> Option<&'static str> {
        match self {
            Block::Paragraph(_) => Some("p"),
            Block::Heading1(_) => Some("h1"),
            Block::Heading2(_) => Some("h2"),
            Block::Heading3(_) => Some("h3"),
            Block::Heading4(_) => Some("h4"),
            Block::Heading5(_) => Some("h5"),
            Block::Heading6(_) => Some("h6"),
            Block::Preformatted(_) => Some("pre"),
            Block::ListItem(_) | Block::OrderedListItem(_) => Some("li"),
            _ => None,
        }
    }

    fn list_kind(&self) -> Option<&'static str> {
        match self {
            Block::ListItem(_) => Some("ul"),
            Block::OrderedListItem(_) => Some("ol"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageBlock {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbedBlock {
    pub oembed: OEmbed,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OEmbed {
    pub embed_url: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// An annotated run inside a text block
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawSpan")]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
}

impl Span {
    pub fn new(start: usize, end: usize, kind: SpanKind) -> Self {
        Self { start, end, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink(Link),
    Label(String),
    Unsupported,
}

/// Target of a hyperlink span
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "link_type")]
pub enum Link {
    Web {
        url: String,
        #[serde(default)]
        target: Option<String>,
    },
    Document {
        #[serde(default)]
        uid: Option<String>,
    },
    Media {
        url: String,
    },
}

#[derive(Deserialize)]
struct RawSpan {
    start: usize,
    end: usize,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl From<RawSpan> for Span {
    fn from(raw: RawSpan) -> Self {
        let kind = match raw.kind.as_str() {
            "strong" => SpanKind::Strong,
            "em" => SpanKind::Em,
            "hyperlink" => raw
                .data
                .and_then(|data| serde_json::from_value::<Link>(data).ok())
                .map(SpanKind::Hyperlink)
                .unwrap_or(SpanKind::Unsupported),
            "label" => raw
                .data
                .as_ref()
                .and_then(|data| data.get("label"))
                .and_then(|label| label.as_str())
                .map(|label| SpanKind::Label(label.to_string()))
                .unwrap_or(SpanKind::Unsupported),
            _ => SpanKind::Unsupported,
        };
        Span {
            start: raw.start,
            end: raw.end,
            kind,
        }
    }
}

/// Plain text of a rich-text field, block texts joined by a space
pub fn as_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter_map(Block::text_block)
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Serialize a rich-text field to HTML
///
/// `resolve_document` maps a document uid to the href used for internal
/// links.
pub fn as_html<F>(blocks: &[Block], resolve_document: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut html = String::new();
    let mut open_list: Option<&'static str> = None;

    for block in blocks {
        let list = block.list_kind();
        if list != open_list {
            if let Some(kind) = open_list {
                html.push_str(&format!("</{}>", kind));
            }
            if let Some(kind) = list {
                html.push_str(&format!("<{}>", kind));
            }
            open_list = list;
        }

        match block {
            Block::Image(image) => {
                html.push_str(&format!(
                    r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
                    html_escape(&image.url),
                    html_escape(image.alt.as_deref().unwrap_or(""))
                ));
            }
            Block::Embed(embed) => {
                let oembed = &embed.oembed;
                let url = html_escape(&oembed.embed_url);
                html.push_str(&format!(
                    r#"<div data-oembed="{}" data-oembed-type="{}" data-oembed-provider="{}"><a href="{}" target="_blank" rel="noopener">{}</a></div>"#,
                    url,
                    html_escape(oembed.kind.as_deref().unwrap_or("")),
                    html_escape(oembed.provider_name.as_deref().unwrap_or("")),
                    url,
                    html_escape(oembed.title.as_deref().unwrap_or(&oembed.embed_url))
                ));
            }
            Block::Unsupported => {}
            text_block => {
                if let (Some(el), Some(t)) = (text_block.element(), text_block.text_block()) {
                    html.push_str(&format!(
                        "<{el}>{}</{el}>",
                        render_spans(&t.text, &t.spans, &resolve_document)
                    ));
                }
            }
        }
    }

    if let Some(kind) = open_list {
        html.push_str(&format!("</{}>", kind));
    }

    html
}

/// Opening and closing markup for a span, or None when it renders as plain text
fn span_tags<F>(kind: &SpanKind, resolve_document: &F) -> Option<(String, &'static str)>
where
    F: Fn(&str) -> String,
{
    match kind {
        SpanKind::Strong => Some(("<strong>".to_string(), "</strong>")),
        SpanKind::Em => Some(("<em>".to_string(), "</em>")),
        SpanKind::Label(label) => Some((
            format!(r#"<span class="{}">"#, html_escape(label)),
            "</span>",
        )),
        SpanKind::Hyperlink(Link::Web { url, target }) => {
            let target = match target.as_deref() {
                Some(t) if !t.is_empty() => {
                    format!(r#" target="{}" rel="noopener""#, html_escape(t))
                }
                _ => String::new(),
            };
            Some((
                format!(r#"<a href="{}"{}>"#, html_escape(url), target),
                "</a>",
            ))
        }
        SpanKind::Hyperlink(Link::Media { url }) => {
            Some((format!(r#"<a href="{}">"#, html_escape(url)), "</a>"))
        }
        SpanKind::Hyperlink(Link::Document { uid: Some(uid) }) => Some((
            format!(r#"<a href="{}">"#, html_escape(&resolve_document(uid))),
            "</a>",
        )),
        SpanKind::Hyperlink(Link::Document { uid: None }) | SpanKind::Unsupported => None,
    }
}

/// Byte offset for every UTF-16 offset of `text`, plus one for the end
fn utf16_to_byte(text: &str) -> Vec<usize> {
    let mut map = Vec::with_capacity(text.len() + 1);
    for (byte, ch) in text.char_indices() {
        for _ in 0..ch.len_utf16() {
            map.push(byte);
        }
    }
    map.push(text.len());
    map
}

struct Run {
    start: usize,
    end: usize,
    open: String,
    close: &'static str,
}

/// Render text with its spans, splitting overlapping spans so tags nest
fn render_spans<F>(text: &str, spans: &[Span], resolve_document: &F) -> String
where
    F: Fn(&str) -> String,
{
    let offsets = utf16_to_byte(text);
    let last = offsets.len() - 1;

    let mut runs: Vec<Run> = spans
        .iter()
        .filter_map(|span| {
            let (open, close) = span_tags(&span.kind, resolve_document)?;
            let start = offsets[span.start.min(last)];
            let end = offsets[span.end.min(last)];
            (start < end).then_some(Run {
                start,
                end,
                open,
                close,
            })
        })
        .collect();
    // Outer runs first so they open before the runs they contain
    runs.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut cuts: Vec<usize> = vec![0, text.len()];
    for run in &runs {
        cuts.push(run.start);
        cuts.push(run.end);
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<usize> = Vec::new();

    for window in cuts.windows(2) {
        let (from, to) = (window[0], window[1]);
        let covers = |i: usize| runs[i].start <= from && runs[i].end >= to;

        if let Some(pos) = stack.iter().position(|&i| !covers(i)) {
            let popped: Vec<usize> = stack.drain(pos..).collect();
            for &i in popped.iter().rev() {
                out.push_str(runs[i].close);
            }
            for i in popped {
                if covers(i) {
                    out.push_str(&runs[i].open);
                    stack.push(i);
                }
            }
        }

        for i in 0..runs.len() {
            if covers(i) && !stack.contains(&i) {
                out.push_str(&runs[i].open);
                stack.push(i);
            }
        }

        out.push_str(&html_escape(&text[from..to]).replace('\n', "<br />"));
    }

    for &i in stack.iter().rev() {
        out.push_str(runs[i].close);
    }

    out
}
