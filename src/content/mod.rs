//! Content module - posts, rich text and the repository clients

pub mod client;
mod post;
pub mod reading;
pub mod richtext;

pub use client::{list_all_posts, ContentSource, PrismicClient, SnapshotSource, Source};
pub use post::{ApiDocument, Banner, ContentSection, Post, PostPagination};
pub use reading::reading_time;
pub use richtext::{Block, Link, Span, SpanKind, TextBlock};
