//! File category classification for watch mode.
//!
//! # File Categories
//!
//! | Category        | Rebuild Strategy                  | Example Files                       |
//! |-----------------|-----------------------------------|-------------------------------------|
//! | Source(kind)    | Incremental (entity cache)        | `posts/2024-05-01-ride.md`          |
//! | Media(kind)     | Thumbnails + incremental          | `deploy/media/post/<id>/a.jpg`      |
//! | Config          | Full rebuild, caches cleared      | `mdpress.toml`                      |
//! | Theme           | Full rebuild, caches cleared      | `<theme>/templates/*`, `include/*`  |
//! | Unknown         | Ignored                           | Files outside watched dirs          |

use crate::config::SiteConfig;
use crate::content::EntityKind;
use crate::template::IncludeScope;
use std::{
    env,
    path::{Path, PathBuf},
};

/// Category of a changed file, used to pick the rebuild strategy in watch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// Markdown source of a page or post
    Source(EntityKind),
    /// File inside an entity's media directory
    Media(EntityKind),
    /// Site configuration
    Config,
    /// Theme templates, resources or includes
    Theme,
    /// File outside watched directories
    Unknown,
}

/// Categorize a file path to determine how changes should be handled.
pub fn categorize_path(path: &Path, config: &SiteConfig) -> FileCategory {
    let path = normalize_path(path);
    let paths = config.paths();

    if path == normalize_path(&config.config_path) {
        return FileCategory::Config;
    }
    for kind in EntityKind::ALL {
        if path.parent() == Some(normalize_path(&paths.source_dir(kind)).as_path()) {
            return if is_markdown(&path) {
                FileCategory::Source(kind)
            } else {
                FileCategory::Unknown
            };
        }
    }
    if let Some((kind, _, _)) = media_entry(&path, config) {
        return FileCategory::Media(kind);
    }

    let theme_dirs = [
        paths.theme_dir(),
        paths.include_dir(IncludeScope::Global),
    ];
    if theme_dirs
        .iter()
        .any(|dir| path.starts_with(normalize_path(dir)))
    {
        return FileCategory::Theme;
    }
    FileCategory::Unknown
}

/// `(kind, entity id, file name)` of a path below `deploy/media/<kind>/<id>/`.
pub fn media_entry(path: &Path, config: &SiteConfig) -> Option<(EntityKind, String, String)> {
    let path = normalize_path(path);
    let media_root = normalize_path(&config.paths().media_root());
    let rel = path.strip_prefix(&media_root).ok()?;

    let mut parts = rel.iter().map(|p| p.to_string_lossy().into_owned());
    let kind = EntityKind::from_name(&parts.next()?)?;
    let id = parts.next()?;
    let file = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((kind, id, file))
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("md")
}

/// Normalize a path to absolute form for reliable comparison.
///
/// Deleted files cannot be canonicalized, so their parent is canonicalized
/// instead and the file name re-attached.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
        && let Ok(parent) = parent.canonicalize()
    {
        return parent.join(name);
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for sub in ["pages", "posts", "deploy/media/post/p1", "themes/default/templates", "include"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(root.join("mdpress.toml"), "").unwrap();

        let mut config = SiteConfig::default();
        config.set_root(root);
        config.config_path = root.join("mdpress.toml");
        (dir, config)
    }

    #[test]
    fn test_categorize_path() {
        let (dir, config) = site();
        let root = dir.path();

        assert_eq!(
            categorize_path(&root.join("posts/new.md"), &config),
            FileCategory::Source(EntityKind::Post)
        );
        assert_eq!(
            categorize_path(&root.join("pages/about.md"), &config),
            FileCategory::Source(EntityKind::Page)
        );
        assert_eq!(categorize_path(&root.join("posts/.new.md.swp"), &config), FileCategory::Unknown);
        assert_eq!(
            categorize_path(&root.join("deploy/media/post/p1/a.jpg"), &config),
            FileCategory::Media(EntityKind::Post)
        );
        assert_eq!(categorize_path(&root.join("mdpress.toml"), &config), FileCategory::Config);
        assert_eq!(
            categorize_path(&root.join("themes/default/templates/post.html"), &config),
            FileCategory::Theme
        );
        assert_eq!(categorize_path(&root.join("include/head.html"), &config), FileCategory::Theme);
        assert_eq!(categorize_path(&root.join("deploy/index.html"), &config), FileCategory::Unknown);
    }

    #[test]
    fn test_media_entry() {
        let (dir, config) = site();
        let entry = media_entry(&dir.path().join("deploy/media/post/p1/a.jpg"), &config);
        assert_eq!(entry, Some((EntityKind::Post, "p1".into(), "a.jpg".into())));
        assert_eq!(media_entry(&dir.path().join("deploy/media/post/p1"), &config), None);
        assert_eq!(media_entry(&dir.path().join("deploy/media/tag/x/a.jpg"), &config), None);
    }

    #[test]
    fn test_normalize_path_deleted_file() {
        let (dir, _) = site();
        let gone = dir.path().join("posts/gone.md");
        let normalized = normalize_path(&gone);
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("posts/gone.md"));
    }

    #[test]
    fn test_normalize_path_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
    }
}
