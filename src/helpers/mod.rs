//! Helper functions for templates and page builders
//!
//! URL generation, HTML escaping and date formatting shared by the
//! rich-text serializer, the page state machines and the generator.

mod date;
mod html;
mod url;

pub use date::*;
pub use html::*;
pub use url::*;
