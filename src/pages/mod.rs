//! Page state machines: the posts listing and the post detail page

pub mod detail;
pub mod listing;

pub use detail::{DetailPage, PostView, RenderedSection};
pub use listing::{Appended, ListingItem, ListingPage, ListingState, LoadMore, Rejected};
