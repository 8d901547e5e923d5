//! Pagination state for aggregate listings.
//!
//! ```text
//! items: [a b c d e]   page_size: 2
//!
//!   page 1: a b + pager   → <dir>/index.html
//!   page 2: c d + pager   → <dir>/2.html
//!   page 3: e   + pager   → <dir>/3.html     (partial, but not the first)
//!
//! items: [a]           page_size: 2
//!   page 1: a             → <dir>/index.html (partial first page, no pager)
//! ```

use super::INDEX_FILE;
use serde::Serialize;

/// State passed to `pager.html` as `pager`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagerState {
    /// 1-based
    pub current: usize,
    pub total: usize,
    /// Prefix of pages after the first: `<prefix>/<n>.html`
    pub uri_prefix: String,
    /// URI of the first page
    pub index_uri: String,
    pub prev_uri: Option<String>,
    pub next_uri: Option<String>,
}

impl PagerState {
    pub fn new(current: usize, total: usize, uri_prefix: &str, index_uri: &str) -> Self {
        let uri = |n: usize| page_uri(n, uri_prefix, index_uri);
        Self {
            current,
            total,
            uri_prefix: uri_prefix.to_owned(),
            index_uri: index_uri.to_owned(),
            prev_uri: (current > 1).then(|| uri(current - 1)),
            next_uri: (current < total).then(|| uri(current + 1)),
        }
    }
}

fn page_uri(number: usize, uri_prefix: &str, index_uri: &str) -> String {
    if number <= 1 {
        index_uri.to_owned()
    } else {
        format!("{uri_prefix}/{number}.html")
    }
}

/// `ceil(items / page_size)`
#[inline]
pub fn total_pages(items: usize, page_size: usize) -> usize {
    items.div_ceil(page_size.max(1))
}

/// Output file name of a listing page.
pub fn page_file_name(number: usize) -> String {
    if number <= 1 {
        INDEX_FILE.to_owned()
    } else {
        format!("{number}.html")
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a, T> {
    /// 1-based
    pub number: usize,
    pub total: usize,
    pub items: &'a [T],
    pub show_pager: bool,
}

/// Split `items` into pages. Full pages always show a pager; a trailing
/// partial page shows one only when it is not the first page.
pub fn chunks<T>(items: &[T], page_size: usize) -> impl Iterator<Item = Chunk<'_, T>> {
    let page_size = page_size.max(1);
    let total = total_pages(items.len(), page_size);
    items
        .chunks(page_size)
        .enumerate()
        .map(move |(idx, page)| Chunk {
            number: idx + 1,
            total,
            items: page,
            show_pager: page.len() == page_size || idx > 0,
        })
}
