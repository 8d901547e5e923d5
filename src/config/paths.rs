//! Centralized path resolution for the fixed working-directory layout.
//!
//! # Architecture
//!
//! ```text
//! SiteConfig
//!     │
//!     └── paths() → SitePaths
//!                       │
//!                       ├── source_dir(kind)     → /root/pages | /root/posts
//!                       ├── deploy_dir()         → /root/deploy
//!                       ├── media_dir(kind, id)  → /root/deploy/media/post/<id>
//!                       ├── templates_dir()      → /root/<theme>/templates
//!                       └── include_dir(scope)   → /root/include[/<theme-name>]
//! ```

use crate::content::EntityKind;
use crate::template::IncludeScope;
use std::path::{Path, PathBuf};

pub const PAGES_DIR: &str = "pages";
pub const POSTS_DIR: &str = "posts";
pub const DEPLOY_DIR: &str = "deploy";
pub const INCLUDE_DIR: &str = "include";
pub const MEDIA_DIR: &str = "media";

/// Path resolver bound to a project root and theme.
#[derive(Debug, Clone, Copy)]
pub struct SitePaths<'a> {
    root: &'a Path,
    theme: &'a Path,
}

impl<'a> SitePaths<'a> {
    #[inline]
    pub const fn new(root: &'a Path, theme: &'a Path) -> Self {
        Self { root, theme }
    }

    /// Markdown source directory for an entity kind.
    pub fn source_dir(&self, kind: EntityKind) -> PathBuf {
        match kind {
            EntityKind::Page => self.root.join(PAGES_DIR),
            EntityKind::Post => self.root.join(POSTS_DIR),
        }
    }

    /// Markdown source file for an entity.
    pub fn source_file(&self, kind: EntityKind, id: &str) -> PathBuf {
        self.source_dir(kind).join(format!("{id}.md"))
    }

    #[inline]
    pub fn deploy_dir(&self) -> PathBuf {
        self.root.join(DEPLOY_DIR)
    }

    /// Root of all per-entity media directories.
    pub fn media_root(&self) -> PathBuf {
        self.deploy_dir().join(MEDIA_DIR)
    }

    /// Media directory of a single entity.
    pub fn media_dir(&self, kind: EntityKind, id: &str) -> PathBuf {
        self.media_root().join(kind.as_str()).join(id)
    }

    /// Theme root, resolved against the project root when relative.
    pub fn theme_dir(&self) -> PathBuf {
        self.root.join(self.theme)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.theme_dir().join("templates")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.theme_dir().join("resources")
    }

    /// Deployed copy of the theme resources.
    pub fn deploy_resources_dir(&self) -> PathBuf {
        self.deploy_dir().join("resources")
    }

    /// Include directory for a scope.
    ///
    /// Global includes live directly under `include/`, theme includes under
    /// `include/<theme-name>/`.
    pub fn include_dir(&self, scope: IncludeScope) -> PathBuf {
        let base = self.root.join(INCLUDE_DIR);
        match scope {
            IncludeScope::Global => base,
            IncludeScope::Theme => match self.theme.file_name() {
                Some(name) => base.join(name),
                None => base,
            },
        }
    }
}
