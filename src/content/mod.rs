//! Content entities: pages and posts parsed from Markdown sources.
//!
//! # Pipeline
//!
//! ```text
//! pages/<id>.md ─┐                          ┌─► Page { id, title, body, .. }
//!                ├─► front matter ─► directives ─► markdown ─┤
//! posts/<id>.md ─┘                          └─► Post { + date, time, tags }
//! ```
//!
//! Entities are immutable after parsing and shared through [`cache::EntityCache`]
//! as `Arc`s.

pub mod cache;
pub mod directive;
pub mod front_matter;
pub mod markdown;
pub mod parser;

use crate::utils::date::{fmt_date, fmt_time};
use chrono::{NaiveDate, NaiveTime};
use serde::{Serialize, Serializer};
use std::{fmt, sync::Arc};

// ============================================================================
// Entity Kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Page,
    Post,
}

impl EntityKind {
    pub const ALL: [Self; 2] = [Self::Page, Self::Post];

    /// Lowercase name used in URIs and deploy directories.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Post => "post",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "page" => Some(Self::Page),
            "post" => Some(Self::Post),
            _ => None,
        }
    }

    /// Site-relative URI of an entity page.
    pub fn uri(self, id: &str) -> String {
        format!("/{}/{id}.html", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity id from a source file name: the name minus its extension.
pub fn entity_id(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem)
}

// ============================================================================
// Entities
// ============================================================================

/// Search index entry: `("post/<id>", lowercase searchable text)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub key: String,
    pub text: String,
}

/// Where the feed should take a post's leading image from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MediaHint {
    #[default]
    None,
    /// A directive names this file explicitly.
    File(String),
    /// A bare `{media}` directive shows all media; use the first image.
    FirstImage,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(skip)]
    pub search: SearchEntry,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Source with front matter and directives removed; feeds excerpt from it.
    pub raw_body: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    /// As written, deduplicated by URI segment.
    pub tags: Vec<String>,
    pub search: SearchEntry,
    pub media_hint: MediaHint,
}

impl Serialize for Post {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct View<'a> {
            id: &'a str,
            title: &'a str,
            body: &'a str,
            date: String,
            time: String,
            tags: &'a [String],
        }

        View {
            id: &self.id,
            title: &self.title,
            body: &self.body,
            date: self.date.map(fmt_date).unwrap_or_default(),
            time: self.time.map(fmt_time).unwrap_or_default(),
            tags: &self.tags,
        }
        .serialize(serializer)
    }
}

/// A parsed entity plus whether this build can skip writing its own page.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub entity: Arc<T>,
    /// Served from the cache with an unchanged source.
    pub skip_processing: bool,
}

impl<T> Loaded<T> {
    pub fn fresh(entity: Arc<T>) -> Self {
        Self {
            entity,
            skip_processing: false,
        }
    }

    pub fn cached(entity: Arc<T>) -> Self {
        Self {
            entity,
            skip_processing: true,
        }
    }
}

impl<T> std::ops::Deref for Loaded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}
