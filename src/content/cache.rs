//! Incremental-build cache of parsed entities keyed by source modification time.
//!
//! ```text
//! (kind, file name) ──► (mtime, Arc<entity>)
//!
//! get(kind, name, mtime):
//!   stored mtime == mtime ──► same Arc   (hit)
//!   otherwise             ──► None       (miss, caller re-parses and puts)
//! ```
//!
//! Shared by the build and every watcher thread; reads dominate, so a
//! `parking_lot::RwLock` guards the map.

use super::{EntityKind, Page, Post};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{sync::Arc, time::SystemTime};

/// A cached entity of either kind.
#[derive(Debug, Clone)]
pub enum CachedEntity {
    Page(Arc<Page>),
    Post(Arc<Post>),
}

impl CachedEntity {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Page(_) => EntityKind::Page,
            Self::Post(_) => EntityKind::Post,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    modified: SystemTime,
    entity: CachedEntity,
}

type CacheKey = (EntityKind, String);

#[derive(Debug, Default)]
pub struct EntityCache {
    entries: RwLock<FxHashMap<CacheKey, CacheEntry>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entity whose stored mtime equals `modified`.
    pub fn get(&self, kind: EntityKind, file_name: &str, modified: SystemTime) -> Option<CachedEntity> {
        let entries = self.entries.read();
        entries
            .get(&(kind, file_name.to_owned()))
            .filter(|entry| entry.modified == modified)
            .map(|entry| entry.entity.clone())
    }

    #[cfg(test)]
    pub fn get_page(&self, file_name: &str, modified: SystemTime) -> Option<Arc<Page>> {
        match self.get(EntityKind::Page, file_name, modified)? {
            CachedEntity::Page(page) => Some(page),
            CachedEntity::Post(_) => None,
        }
    }

    #[cfg(test)]
    pub fn get_post(&self, file_name: &str, modified: SystemTime) -> Option<Arc<Post>> {
        match self.get(EntityKind::Post, file_name, modified)? {
            CachedEntity::Post(post) => Some(post),
            CachedEntity::Page(_) => None,
        }
    }

    /// Insert or overwrite the entry for `file_name`.
    pub fn put(&self, file_name: &str, modified: SystemTime, entity: CachedEntity) {
        let key = (entity.kind(), file_name.to_owned());
        self.entries.write().insert(key, CacheEntry { modified, entity });
    }

    /// Drop the entry for `file_name`. Returns whether one existed.
    pub fn invalidate(&self, kind: EntityKind, file_name: &str) -> bool {
        self.entries
            .write()
            .remove(&(kind, file_name.to_owned()))
            .is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}
