//! Derived outputs beyond the page templates: syndication feeds.

pub mod excerpt;
pub mod feed;
