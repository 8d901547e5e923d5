//! Per-entity media: listing, URIs, thumbnails and embedded players.
//!
//! Media files live in `deploy/media/<kind>/<id>/` and are addressed by the
//! site-relative URI `/media/<kind>/<id>/<file>`.
//!
//! ```text
//! deploy/media/post/2024-05-01-ride/
//!   ├── clip.mp4
//!   ├── summit.jpg
//!   ├── summit.jpg_480_thumb.jpg
//!   └── summit.jpg_960_thumb.jpg
//! ```

pub mod thumbs;

use crate::content::EntityKind;
use anyhow::{Context, Result};
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Serialize, Serializer};
use std::{
    fs,
    path::Path,
    sync::LazyLock,
};

// ============================================================================
// File Classification
// ============================================================================

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov"];
/// Image formats thumbnails are generated for.
pub const THUMBNAIL_SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Marker inside every thumbnail file name.
pub const THUMB_MARKER: &str = "_thumb";

/// Reference sizes for the original's `srcset` width descriptor.
const SRCSET_MIN_SIZE: u32 = 480;
const SRCSET_MAX_SIZE: u32 = 960;

static RE_THUMB_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d+)_thumb").unwrap());

/// Lowercased extension of a file name, without the dot.
pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    extension(name).is_some_and(|ext| extensions.contains(&ext.as_str()))
}

#[inline]
pub fn is_image(name: &str) -> bool {
    has_extension(name, IMAGE_EXTENSIONS)
}

#[inline]
pub fn is_video(name: &str) -> bool {
    has_extension(name, VIDEO_EXTENSIONS)
}

#[inline]
pub fn is_thumbnail(name: &str) -> bool {
    name.contains(THUMB_MARKER)
}

/// Size encoded in a thumbnail file name.
pub fn thumb_size(name: &str) -> Option<u32> {
    RE_THUMB_SIZE
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

/// Thumbnail file name for `file` at `size`: `<file>_<size>_thumb<.ext>`.
pub fn thumb_file_name(file: &str, size: u32) -> String {
    let ext = Path::new(file)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!("{file}_{size}{THUMB_MARKER}{ext}")
}

/// Site-relative URI of a media file.
pub fn media_uri(kind: EntityKind, id: &str, file: &str) -> String {
    format!("/media/{}/{id}/{file}", kind.as_str())
}

// ============================================================================
// Media Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumb {
    pub uri: String,
    pub size: u32,
}

/// A media file attached to a content entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub uri: String,
    /// One entry per configured size. Missing thumbnails point at the original.
    pub thumbs: Vec<Thumb>,
}

impl MediaItem {
    /// `srcset` attribute value: every thumbnail plus the original.
    pub fn src_set(&self) -> String {
        let (min, max) = self.thumbs.iter().fold(
            (SRCSET_MIN_SIZE, SRCSET_MAX_SIZE),
            |(min, max), thumb| (min.min(thumb.size), max.max(thumb.size)),
        );

        let mut entries: Vec<String> = self
            .thumbs
            .iter()
            .map(|thumb| format!("{} {}w", thumb.uri, thumb.size))
            .collect();
        entries.push(format!("{} {}w", self.uri, max + (min + max) / 2));
        entries.join(", ")
    }

    /// Smallest thumbnail, or the original when there is none.
    pub fn thumb_uri(&self) -> &str {
        self.thumbs.first().map_or(&self.uri, |thumb| &thumb.uri)
    }

    #[inline]
    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }
}

impl Serialize for MediaItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct View<'a> {
            kind: MediaKind,
            is_image: bool,
            is_video: bool,
            uri: &'a str,
            thumbs: &'a [Thumb],
            thumb_uri: &'a str,
            thumb_uris: Vec<&'a str>,
            src_set: String,
        }

        View {
            kind: self.kind,
            is_image: self.kind == MediaKind::Image,
            is_video: self.kind == MediaKind::Video,
            uri: &self.uri,
            thumbs: &self.thumbs,
            thumb_uri: self.thumb_uri(),
            thumb_uris: self.thumbs.iter().map(|t| t.uri.as_str()).collect(),
            src_set: self.src_set(),
        }
        .serialize(serializer)
    }
}

// ============================================================================
// Embedded Media
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedProvider {
    Youtube,
    Vimeo,
}

static RE_YOUTUBE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(youtu\.be/|youtube\.com/watch\?v=)([\w-]+)").unwrap());
static RE_VIMEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)vimeo\.com/([\w-]+)").unwrap());

impl EmbedProvider {
    const ALL: [Self; 2] = [Self::Youtube, Self::Vimeo];

    fn code(self, url: &str) -> Option<String> {
        let (re, group) = match self {
            Self::Youtube => (&*RE_YOUTUBE, 2),
            Self::Vimeo => (&*RE_VIMEO, 1),
        };
        re.captures(url).map(|caps| caps[group].to_owned())
    }

    pub fn embed_url(self, code: &str) -> String {
        match self {
            Self::Youtube => format!("https://www.youtube.com/embed/{code}"),
            Self::Vimeo => format!("https://player.vimeo.com/video/{code}"),
        }
    }
}

/// A third-party video player embedded by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedMedia {
    pub provider: EmbedProvider,
    pub code: String,
    pub embed_url: String,
}

impl EmbeddedMedia {
    /// Recognize a YouTube or Vimeo URL.
    pub fn parse(url: &str) -> Option<Self> {
        EmbedProvider::ALL.into_iter().find_map(|provider| {
            provider.code(url).map(|code| Self {
                provider,
                embed_url: provider.embed_url(&code),
                code,
            })
        })
    }
}

// ============================================================================
// Listing
// ============================================================================

/// File names in a media directory, sorted.
fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// All media of an entity: videos first, then images, excluding thumbnails
/// and files named in `skip`.
pub fn list_all_media(dir: &Path, skip: &FxHashSet<String>) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let files = list_files(dir)?;
    let wanted = |name: &&String| !skip.contains(name.as_str());

    let videos = files.iter().filter(|n| is_video(n)).filter(wanted);
    let images = files
        .iter()
        .filter(|n| is_image(n) && !is_thumbnail(n))
        .filter(wanted);

    Ok(videos.chain(images).cloned().collect())
}

/// Resolve media file names into [`MediaItem`]s.
///
/// Thumbnails are looked up in `dir`; unknown extensions and thumbnail names
/// are skipped.
pub fn parse_media_file_names(
    names: &[String],
    kind: EntityKind,
    id: &str,
    dir: &Path,
    thumb_sizes: &[u32],
) -> Vec<MediaItem> {
    names
        .iter()
        .filter(|name| !is_thumbnail(name))
        .filter_map(|name| {
            let uri = media_uri(kind, id, name);
            if is_image(name) {
                let thumbs = thumb_sizes
                    .iter()
                    .map(|&size| {
                        let file = thumb_file_name(name, size);
                        let uri = if dir.join(&file).is_file() {
                            media_uri(kind, id, &file)
                        } else {
                            uri.clone()
                        };
                        Thumb { uri, size }
                    })
                    .collect();
                Some(MediaItem { kind: MediaKind::Image, uri, thumbs })
            } else if is_video(name) {
                Some(MediaItem { kind: MediaKind::Video, uri, thumbs: Vec::new() })
            } else {
                None
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_classification() {
        assert!(is_image("a.JPG"));
        assert!(is_image("b.gif"));
        assert!(is_video("c.mov"));
        assert!(!is_image("notes.txt") && !is_video("notes.txt"));
        assert!(is_thumbnail("a.jpg_480_thumb.jpg"));
        assert!(!is_thumbnail("a.jpg"));
    }

    #[test]
    fn test_thumb_file_name_and_size() {
        let name = thumb_file_name("a.jpg", 480);
        assert_eq!(name, "a.jpg_480_thumb.jpg");
        assert_eq!(thumb_size(&name), Some(480));
        assert_eq!(thumb_size("a.jpg"), None);
    }

    #[test]
    fn test_media_uri() {
        assert_eq!(media_uri(EntityKind::Post, "p1", "a.jpg"), "/media/post/p1/a.jpg");
        assert_eq!(media_uri(EntityKind::Page, "about", "b.mp4"), "/media/page/about/b.mp4");
    }

    #[test]
    fn test_list_all_media_order_and_filters() {
        let dir = TempDir::new().unwrap();
        for name in ["b.jpg", "a.png", "a.png_480_thumb.png", "z.mp4", "clip.mov", "notes.txt"] {
            touch(dir.path(), name);
        }

        let all = list_all_media(dir.path(), &FxHashSet::default()).unwrap();
        assert_eq!(all, vec!["clip.mov", "z.mp4", "a.png", "b.jpg"]);

        let skip: FxHashSet<String> = ["b.jpg".to_owned()].into_iter().collect();
        let rest = list_all_media(dir.path(), &skip).unwrap();
        assert_eq!(rest, vec!["clip.mov", "z.mp4", "a.png"]);
    }

    #[test]
    fn test_list_all_media_missing_dir() {
        let dir = TempDir::new().unwrap();
        let all = list_all_media(&dir.path().join("nope"), &FxHashSet::default()).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_parse_media_file_names_thumb_fallback() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "a.jpg_480_thumb.jpg");

        let names = vec!["a.jpg".to_owned(), "v.mp4".to_owned(), "a.jpg_480_thumb.jpg".to_owned()];
        let items = parse_media_file_names(&names, EntityKind::Post, "p1", dir.path(), &[480, 960]);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, MediaKind::Image);
        assert_eq!(items[0].thumbs[0].uri, "/media/post/p1/a.jpg_480_thumb.jpg");
        assert_eq!(items[0].thumbs[1].uri, "/media/post/p1/a.jpg");
        assert_eq!(items[0].thumb_uri(), "/media/post/p1/a.jpg_480_thumb.jpg");
        assert_eq!(items[1].kind, MediaKind::Video);
        assert!(items[1].thumbs.is_empty());
    }

    #[test]
    fn test_src_set() {
        let item = MediaItem {
            kind: MediaKind::Image,
            uri: "/m/a.jpg".into(),
            thumbs: vec![
                Thumb { uri: "/m/a_480.jpg".into(), size: 480 },
                Thumb { uri: "/m/a_960.jpg".into(), size: 960 },
            ],
        };
        assert_eq!(item.src_set(), "/m/a_480.jpg 480w, /m/a_960.jpg 960w, /m/a.jpg 1680w");
    }

    #[test]
    fn test_embedded_media_parse() {
        let yt = EmbeddedMedia::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(yt.provider, EmbedProvider::Youtube);
        assert_eq!(yt.code, "dQw4w9WgXcQ");
        assert_eq!(yt.embed_url, "https://www.youtube.com/embed/dQw4w9WgXcQ");

        let short = EmbeddedMedia::parse("https://youtu.be/abc_123").unwrap();
        assert_eq!(short.code, "abc_123");

        let vimeo = EmbeddedMedia::parse("https://vimeo.com/76979871").unwrap();
        assert_eq!(vimeo.provider, EmbedProvider::Vimeo);
        assert_eq!(vimeo.embed_url, "https://player.vimeo.com/video/76979871");

        assert!(EmbeddedMedia::parse("https://example.com/video").is_none());
    }
}
