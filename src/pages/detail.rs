//! Post detail page

use crate::content::{reading_time, richtext, ContentSource, Post};
use crate::error::Result;
use crate::helpers::DateFormatter;

/// A content section with its body rendered to markup
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSection {
    pub heading: String,
    pub html: String,
}

/// Everything the post template needs, derived from one canonical post
#[derive(Debug, Clone, PartialEq)]
pub struct PostView {
    /// Canonical record; its rich-text bodies stay structured
    pub post: Post,
    pub display_date: Option<String>,
    /// Estimated minutes to read the body
    pub reading_time: usize,
    pub sections: Vec<RenderedSection>,
}

impl PostView {
    pub fn build<F>(post: Post, formatter: &DateFormatter, resolve_document: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        let display_date = post
            .first_publication_date
            .as_ref()
            .map(|date| formatter.format(date));
        let sections = post
            .content
            .iter()
            .map(|section| RenderedSection {
                heading: section.heading.clone(),
                html: richtext::as_html(&section.body, &resolve_document),
            })
            .collect();

        Self {
            reading_time: reading_time(&post.content),
            display_date,
            sections,
            post,
        }
    }
}

/// A detail page is either waiting for its post or ready to render
#[derive(Debug, Clone, PartialEq)]
pub enum DetailPage {
    /// The path has not been generated yet; no post data is available
    Fallback { slug: String },
    Loaded(Box<PostView>),
}

impl DetailPage {
    pub fn fallback(slug: impl Into<String>) -> Self {
        DetailPage::Fallback { slug: slug.into() }
    }

    /// Move from `Fallback` to `Loaded` once the post has been fetched
    pub fn resolve<F>(self, post: Post, formatter: &DateFormatter, resolve_document: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        match self {
            DetailPage::Fallback { .. } => {
                DetailPage::Loaded(Box::new(PostView::build(post, formatter, resolve_document)))
            }
            loaded => loaded,
        }
    }

    /// Fetch the post for `slug` and build its loaded page
    pub async fn load<S, F>(
        source: &S,
        slug: &str,
        formatter: &DateFormatter,
        resolve_document: F,
    ) -> Result<Self>
    where
        S: ContentSource,
        F: Fn(&str) -> String,
    {
        let post = source.get_post_by_id(slug).await?;
        Ok(DetailPage::fallback(slug).resolve(post, formatter, resolve_document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ApiDocument, Block, ContentSection, SnapshotSource, Span, SpanKind};
    use crate::error::Error;
    use crate::helpers::{parse_timestamp, DateLocale};
    use serde_json::json;

    fn formatter() -> DateFormatter {
        DateFormatter::new("PP", DateLocale::PtBr, chrono_tz::America::Sao_Paulo)
    }

    fn post_link(uid: &str) -> String {
        format!("/post/{}", uid)
    }

    fn sample_post() -> Post {
        Post {
            id: "YEz1".to_string(),
            uid: Some("hooks".to_string()),
            first_publication_date: parse_timestamp("2021-03-25T19:25:28+0000"),
            title: "Como utilizar Hooks".to_string(),
            subtitle: "Pensando em sincronização".to_string(),
            author: "Joseph Oliveira".to_string(),
            banner: None,
            content: vec![
                ContentSection {
                    heading: "Um".to_string(),
                    body: vec![Block::paragraph(
                        "Hello world",
                        vec![Span::new(0, 5, SpanKind::Strong)],
                    )],
                },
                ContentSection {
                    heading: "Dois".to_string(),
                    body: vec![Block::paragraph(vec!["w"; 201].join(" "), vec![])],
                },
            ],
        }
    }

    #[test]
    fn test_post_view_derives_fields() {
        let post = sample_post();
        let view = PostView::build(post.clone(), &formatter(), post_link);

        assert_eq!(view.display_date.as_deref(), Some("25 mar 2021"));
        // 1 minute for two words, 2 minutes for 201 words
        assert_eq!(view.reading_time, 3);
        assert_eq!(view.sections[0].heading, "Um");
        assert_eq!(view.sections[0].html, "<p><strong>Hello</strong> world</p>");
        // The canonical bodies stay structured
        assert_eq!(view.post, post);
    }

    #[test]
    fn test_fallback_then_loaded() {
        let page = DetailPage::fallback("hooks");
        assert_eq!(
            page,
            DetailPage::Fallback {
                slug: "hooks".to_string()
            }
        );

        let page = page.resolve(sample_post(), &formatter(), post_link);
        match page {
            DetailPage::Loaded(view) => assert_eq!(view.post.title, "Como utilizar Hooks"),
            DetailPage::Fallback { .. } => panic!("expected a loaded page"),
        }
    }

    #[tokio::test]
    async fn test_load_from_source() {
        let source = SnapshotSource::new(vec![ApiDocument {
            id: "d1".to_string(),
            uid: Some("hooks".to_string()),
            doc_type: "posts".to_string(),
            first_publication_date: None,
            data: json!({"title": "Hooks", "author": "Ana"}),
        }]);

        let page = DetailPage::load(&source, "hooks", &formatter(), post_link)
            .await
            .unwrap();
        match page {
            DetailPage::Loaded(view) => {
                assert_eq!(view.display_date, None);
                assert_eq!(view.reading_time, 0);
                assert!(view.sections.is_empty());
            }
            DetailPage::Fallback { .. } => panic!("expected a loaded page"),
        }

        assert!(matches!(
            DetailPage::load(&source, "nope", &formatter(), post_link).await,
            Err(Error::NotFound(_))
        ));
    }
}
