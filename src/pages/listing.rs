//! Posts listing with incremental "load more"
//!
//! The listing starts from the first page fetched at build time and grows
//! by following the repository cursor. Dates are formatted once, when a
//! page of posts becomes listing items; already formatted items are never
//! touched again.
//!
//! ```text
//! Initial --hydrate--> Displaying --begin--> LoadingMore --complete--> Displaying
//!    |                                                           \--> Exhausted
//!    \--hydrate (no cursor)--> Exhausted
//! ```

use std::collections::HashSet;

use crate::content::{ContentSource, Post, PostPagination};
use crate::error::Result;
use crate::helpers::DateFormatter;

/// A post as shown in the listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    /// Canonical record, untouched
    pub post: Post,
    /// Formatted publication date, computed once at fetch time
    pub display_date: Option<String>,
}

impl ListingItem {
    fn new(post: Post, formatter: &DateFormatter) -> Self {
        let display_date = post
            .first_publication_date
            .as_ref()
            .map(|date| formatter.format(date));
        Self { post, display_date }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingState {
    /// Server-rendered first page
    Initial,
    Displaying,
    /// A next-page fetch is in flight
    LoadingMore,
    /// No cursor left
    Exhausted,
}

/// Why a load-more request was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    InFlight,
    Exhausted,
}

/// Proof that a load was started; consumed when it completes
#[derive(Debug)]
pub struct LoadMoreTicket {
    cursor: String,
}

impl LoadMoreTicket {
    pub fn cursor(&self) -> &str {
        &self.cursor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub added: usize,
    /// Posts skipped because they were already listed
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    Appended(Appended),
    Rejected(Rejected),
}

pub struct ListingPage {
    items: Vec<ListingItem>,
    next_page: Option<String>,
    state: ListingState,
    formatter: DateFormatter,
    dedupe: bool,
    seen: HashSet<String>,
}

impl ListingPage {
    /// Build the listing from the first fetched page
    pub fn new(first: PostPagination, formatter: DateFormatter, dedupe: bool) -> Self {
        let mut page = Self {
            items: Vec::new(),
            next_page: first.next_page,
            state: ListingState::Initial,
            formatter,
            dedupe,
            seen: HashSet::new(),
        };
        page.append(first.results);
        page
    }

    /// An empty listing positioned at `cursor`, for serving a single
    /// continuation fetch. Nothing shown before `cursor` is known here, so
    /// `dedupe` only applies within the fetched page.
    pub fn resume(cursor: String, formatter: DateFormatter, dedupe: bool) -> Self {
        Self::new(
            PostPagination {
                next_page: Some(cursor),
                results: Vec::new(),
            },
            formatter,
            dedupe,
        )
    }

    pub fn items(&self) -> &[ListingItem] {
        &self.items
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }

    pub fn state(&self) -> ListingState {
        self.state
    }

    /// Whether the load-more control is shown
    pub fn can_load_more(&self) -> bool {
        self.next_page.is_some()
    }

    /// Leave the server-rendered state. Later calls do nothing.
    pub fn hydrate(&mut self) {
        if self.state == ListingState::Initial {
            self.state = self.settled_state();
        }
    }

    /// Start fetching the next page
    ///
    /// Rejected while another load is in flight or when there is no cursor;
    /// in both cases nothing changes.
    pub fn begin_load_more(&mut self) -> std::result::Result<LoadMoreTicket, Rejected> {
        self.hydrate();
        match (self.state, &self.next_page) {
            (ListingState::LoadingMore, _) => Err(Rejected::InFlight),
            (_, None) => Err(Rejected::Exhausted),
            (_, Some(cursor)) => {
                let ticket = LoadMoreTicket {
                    cursor: cursor.clone(),
                };
                self.state = ListingState::LoadingMore;
                Ok(ticket)
            }
        }
    }

    /// Finish a load started with `begin_load_more`
    ///
    /// On success the new posts go after the existing ones in fetched order
    /// and the cursor is replaced. On failure the old cursor is kept so the
    /// user can try again.
    pub fn complete_load_more(
        &mut self,
        ticket: LoadMoreTicket,
        fetched: Result<PostPagination>,
    ) -> Result<Appended> {
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(%e, cursor = ticket.cursor(), "load more failed");
                self.state = ListingState::Displaying;
                return Err(e);
            }
        };

        let appended = self.append(page.results);
        self.next_page = match page.next_page {
            Some(next) if next == ticket.cursor => {
                tracing::warn!("Repository repeated cursor {}, stopping", next);
                None
            }
            next => next,
        };
        self.state = self.settled_state();

        tracing::debug!(
            added = appended.added,
            duplicates = appended.duplicates,
            "listing now has {} posts",
            self.items.len()
        );
        Ok(appended)
    }

    /// Fetch and append the next page
    pub async fn handle_load_more<S: ContentSource>(
        &mut self,
        source: &S,
        page_size: usize,
    ) -> Result<LoadMore> {
        let ticket = match self.begin_load_more() {
            Ok(ticket) => ticket,
            Err(rejected) => return Ok(LoadMore::Rejected(rejected)),
        };
        let fetched = source.list_posts(page_size, Some(ticket.cursor())).await;
        self.complete_load_more(ticket, fetched)
            .map(LoadMore::Appended)
    }

    fn settled_state(&self) -> ListingState {
        if self.next_page.is_some() {
            ListingState::Displaying
        } else {
            ListingState::Exhausted
        }
    }

    fn append(&mut self, posts: Vec<Post>) -> Appended {
        let mut appended = Appended {
            added: 0,
            duplicates: 0,
        };
        for post in posts {
            if !self.seen.insert(post.id.clone()) && self.dedupe {
                appended.duplicates += 1;
                continue;
            }
            self.items.push(ListingItem::new(post, &self.formatter));
            appended.added += 1;
        }
        appended
    }
}
