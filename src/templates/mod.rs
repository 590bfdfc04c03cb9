//! Built-in blog templates using the Tera template engine
//!
//! Templates, the stylesheet and the load-more script are embedded in the
//! binary. Autoescaping stays on for `.html` templates: every value coming
//! from the content repository is escaped unless the template marks it
//! `safe`, which only the serialized rich-text bodies are.

use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::error::Result;
use crate::helpers::{date_xml, is_valid_slug, post_path, truncate, url_for};
use crate::i18n::I18n;
use crate::pages::{ListingItem, PostView};

/// Stylesheet served at [`STYLESHEET_PATH`]
pub const STYLESHEET: &str = include_str!("blog/style.css");

/// Load-more script served at [`SCRIPT_PATH`]
pub const LOAD_MORE_SCRIPT: &str = include_str!("blog/load-more.js");

pub const STYLESHEET_PATH: &str = "assets/style.css";
pub const SCRIPT_PATH: &str = "assets/load-more.js";

/// Template renderer with the embedded blog theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("blog/layout.html")),
            ("home.html", include_str!("blog/home.html")),
            ("post.html", include_str!("blog/post.html")),
            ("fallback.html", include_str!("blog/fallback.html")),
            ("not_found.html", include_str!("blog/not_found.html")),
            ("error.html", include_str!("blog/error.html")),
            // Partials
            (
                "partials/post_item.html",
                include_str!("blog/partials/post_item.html"),
            ),
            (
                "partials/infos.html",
                include_str!("blog/partials/infos.html"),
            ),
            (
                "partials/icon_calendar.html",
                include_str!("blog/partials/icon_calendar.html"),
            ),
            (
                "partials/icon_user.html",
                include_str!("blog/partials/icon_user.html"),
            ),
            (
                "partials/icon_clock.html",
                include_str!("blog/partials/icon_clock.html"),
            ),
        ])?;

        tera.register_filter("truncate_chars", truncate_chars_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => Some(tera::try_get_value!(
            "truncate_chars",
            "omission",
            String,
            val
        )),
        None => None,
    };

    Ok(tera::Value::String(truncate(
        &s,
        length,
        omission.as_deref(),
    )))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub description: String,
    pub language: String,
    pub root: String,
    pub stylesheet: String,
    pub script: String,
}

impl SiteData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
            language: config.language.clone(),
            root: url_for(config, "/"),
            stylesheet: url_for(config, STYLESHEET_PATH),
            script: url_for(config, SCRIPT_PATH),
        }
    }
}

/// Interface strings in the configured language
#[derive(Debug, Clone, Serialize)]
pub struct Labels {
    pub listing_title: String,
    pub listing_load_more: String,
    pub listing_loading: String,
    pub listing_empty: String,
    pub post_title: String,
    pub post_loading: String,
    pub post_unpublished: String,
    pub not_found_title: String,
    pub not_found_heading: String,
    pub not_found_message: String,
    pub not_found_back: String,
    pub error_title: String,
    pub error_heading: String,
    pub error_message: String,
}

impl Labels {
    pub fn from_i18n(i18n: &I18n) -> Self {
        Self {
            listing_title: i18n.get("title.listing"),
            listing_load_more: i18n.get("listing.load_more"),
            listing_loading: i18n.get("listing.loading"),
            listing_empty: i18n.get("listing.empty"),
            post_title: i18n.get("title.post"),
            post_loading: i18n.get("post.loading"),
            post_unpublished: i18n.get("post.unpublished"),
            not_found_title: i18n.get("title.not_found"),
            not_found_heading: i18n.get("not_found.heading"),
            not_found_message: i18n.get("not_found.message"),
            not_found_back: i18n.get("not_found.back"),
            error_title: i18n.get("title.error"),
            error_heading: i18n.get("error.heading"),
            error_message: i18n.get("error.message"),
        }
    }
}

/// A listing entry; also the JSON shape of `/posts/more` results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingItemData {
    pub id: String,
    pub uid: Option<String>,
    /// Link to the detail page; absent when the uid cannot be routed
    pub href: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: Option<String>,
    pub datetime: Option<String>,
}

impl ListingItemData {
    pub fn from_item(item: &ListingItem, config: &SiteConfig) -> Self {
        let post = &item.post;
        Self {
            id: post.id.clone(),
            uid: post.uid.clone(),
            href: post
                .uid
                .as_deref()
                .filter(|uid| is_valid_slug(uid))
                .map(|uid| url_for(config, &post_path(uid))),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date: item.display_date.clone(),
            datetime: post.first_publication_date.as_ref().map(date_xml),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionData {
    pub heading: String,
    pub html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPageData {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub banner_alt: String,
    pub date: Option<String>,
    pub datetime: Option<String>,
    pub reading_time: Option<String>,
    pub sections: Vec<SectionData>,
}

impl PostPageData {
    pub fn from_view(view: &PostView, i18n: &I18n) -> Self {
        let post = &view.post;
        let banner_alt = post
            .banner
            .as_ref()
            .and_then(|banner| banner.alt.clone())
            .filter(|alt| !alt.trim().is_empty())
            .unwrap_or_else(|| i18n.get("post.banner_alt"));

        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            banner_url: post.banner.as_ref().map(|banner| banner.url.clone()),
            banner_alt,
            date: view.display_date.clone(),
            datetime: post.first_publication_date.as_ref().map(date_xml),
            reading_time: Some(i18n.get_count("post.reading_time", view.reading_time)),
            sections: view
                .sections
                .iter()
                .map(|section| SectionData {
                    heading: section.heading.clone(),
                    html: section.html.clone(),
                })
                .collect(),
        }
    }
}
