//! `[build]` section configuration.
//!
//! Contains listing, feed and media-processing settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Enums
// ============================================================================

/// Syndication feed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// RSS 2.0, written to `rss.xml`.
    Rss,
    /// Atom 1.0, written to `atom.xml`.
    Atom,
    /// JSON Feed 1.1, written to `feed.json`.
    Json,
}

impl FeedFormat {
    /// Output file name relative to the deploy directory.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Rss => "rss.xml",
            Self::Atom => "atom.xml",
            Self::Json => "feed.json",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Atom => "atom",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PNG encoder compression level for thumbnails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    #[default]
    Default,
    Fast,
    Best,
}

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in mdpress.toml - generation settings.
///
/// # Example
/// ```toml
/// [build]
/// page_size = 10
/// generate_archive = true
/// generate_tag_index = true
/// enable_search = true
/// generate_feeds = ["rss", "atom", "json"]
///
/// [build.media]
/// thumb_sizes = [480, 960]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Posts per listing page.
    #[serde(default = "defaults::build::page_size")]
    #[educe(Default = defaults::build::page_size())]
    pub page_size: usize,

    /// Generate per-month archive pages.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub generate_archive: bool,

    /// Generate `tags/index.html`.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub generate_tag_index: bool,

    /// Generate `search.json` and `search.html`.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable_search: bool,

    /// Feed formats to generate. Empty disables feeds.
    #[serde(default = "defaults::build::generate_feeds")]
    #[educe(Default = defaults::build::generate_feeds())]
    pub generate_feeds: Vec<FeedFormat>,

    /// Number of most recent posts included in feeds.
    #[serde(default = "defaults::build::feed_post_count")]
    #[educe(Default = defaults::build::feed_post_count())]
    pub feed_post_count: usize,

    /// Link text appended to each feed excerpt.
    #[serde(default = "defaults::build::feed_continue_text")]
    #[educe(Default = defaults::build::feed_continue_text())]
    pub feed_continue_text: String,

    /// Maximum number of sentences in a feed excerpt.
    #[serde(default = "defaults::build::feed_excerpt_sentences")]
    #[educe(Default = defaults::build::feed_excerpt_sentences())]
    pub feed_excerpt_sentences: usize,

    /// Media processing settings.
    #[serde(default)]
    pub media: MediaConfig,
}

impl BuildConfig {
    #[inline]
    pub fn feeds_enabled(&self) -> bool {
        !self.generate_feeds.is_empty()
    }
}

// ============================================================================
// Sub-configurations
// ============================================================================

/// `[build.media]` section - thumbnail and image resizing configuration.
///
/// # Example
/// ```toml
/// [build.media]
/// use_thumbs = true
/// thumb_sizes = [480, 960]   # widths, each >= 320
/// thumb_threshold = 0.5      # only images of at least 0.5 MB get thumbnails
/// jpeg_quality = 85
/// png_compression = "best"
/// resize_originals = true
/// max_image_size = 2560
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Generate thumbnails. When disabled, existing thumbnails are removed.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub use_thumbs: bool,

    /// Thumbnail sizes (longer edge, pixels).
    #[serde(default = "defaults::build::media::thumb_sizes")]
    #[educe(Default = defaults::build::media::thumb_sizes())]
    pub thumb_sizes: Vec<u32>,

    /// Minimum source file size in MB for thumbnail generation.
    #[serde(default = "defaults::build::media::thumb_threshold")]
    #[educe(Default = defaults::build::media::thumb_threshold())]
    pub thumb_threshold: f64,

    /// JPEG encoder quality (1-100).
    #[serde(default = "defaults::build::media::jpeg_quality")]
    #[educe(Default = defaults::build::media::jpeg_quality())]
    pub jpeg_quality: u8,

    /// PNG encoder compression level.
    #[serde(default = "defaults::build::media::png_compression")]
    #[educe(Default = defaults::build::media::png_compression())]
    pub png_compression: PngCompression,

    /// Downscale originals larger than `max_image_size`.
    #[serde(default)]
    pub resize_originals: bool,

    /// Longer-edge limit for originals. Zero disables resizing.
    #[serde(default = "defaults::build::media::max_image_size")]
    #[educe(Default = defaults::build::media::max_image_size())]
    pub max_image_size: u32,
}

impl MediaConfig {
    /// Configured thumbnail sizes in ascending order.
    pub fn sorted_thumb_sizes(&self) -> Vec<u32> {
        let mut sizes = self.thumb_sizes.clone();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.page_size, 10);
        assert!(config.build.generate_archive);
        assert!(config.build.generate_tag_index);
        assert!(config.build.enable_search);
        assert!(config.build.generate_feeds.is_empty());
        assert!(!config.build.feeds_enabled());
        assert_eq!(config.build.feed_post_count, 20);
        assert_eq!(config.build.feed_continue_text, "Continue reading...");
        assert_eq!(config.build.feed_excerpt_sentences, 3);
    }

    #[test]
    fn test_build_config_custom() {
        let config = r#"
            [build]
            page_size = 5
            generate_archive = false
            enable_search = false
            generate_feeds = ["rss", "json"]
            feed_continue_text = "More"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.build.page_size, 5);
        assert!(!config.build.generate_archive);
        assert!(config.build.generate_tag_index);
        assert!(!config.build.enable_search);
        assert_eq!(config.build.generate_feeds, vec![FeedFormat::Rss, FeedFormat::Json]);
        assert_eq!(config.build.feed_continue_text, "More");
    }

    #[test]
    fn test_feed_format_parsing() {
        let config: SiteConfig = toml::from_str("[build]\ngenerate_feeds = [\"atom\"]").unwrap();
        assert_eq!(config.build.generate_feeds, vec![FeedFormat::Atom]);

        let result: Result<SiteConfig, _> = toml::from_str("[build]\ngenerate_feeds = [\"gopher\"]");
        assert!(result.is_err());
    }

    #[test]
    fn test_feed_format_file_names() {
        assert_eq!(FeedFormat::Rss.file_name(), "rss.xml");
        assert_eq!(FeedFormat::Atom.file_name(), "atom.xml");
        assert_eq!(FeedFormat::Json.file_name(), "feed.json");
        assert_eq!(FeedFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_media_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();
        let media = &config.build.media;

        assert!(media.use_thumbs);
        assert_eq!(media.thumb_sizes, vec![480, 960]);
        assert_eq!(media.thumb_threshold, 0.5);
        assert_eq!(media.jpeg_quality, 85);
        assert_eq!(media.png_compression, PngCompression::Default);
        assert!(!media.resize_originals);
        assert_eq!(media.max_image_size, 0);
    }

    #[test]
    fn test_media_config_custom() {
        let config = r#"
            [build.media]
            use_thumbs = false
            thumb_sizes = [960, 480, 960]
            png_compression = "best"
            resize_originals = true
            max_image_size = 2048
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();
        let media = &config.build.media;

        assert!(!media.use_thumbs);
        assert_eq!(media.sorted_thumb_sizes(), vec![480, 960]);
        assert_eq!(media.png_compression, PngCompression::Best);
        assert!(media.resize_originals);
        assert_eq!(media.max_image_size, 2048);
    }

    #[test]
    fn test_png_compression_parsing() {
        let result: Result<SiteConfig, _> =
            toml::from_str("[build.media]\npng_compression = \"ultra\"");
        assert!(result.is_err());

        let config: SiteConfig = toml::from_str("[build.media]\npng_compression = \"fast\"").unwrap();
        assert_eq!(config.build.media.png_compression, PngCompression::Fast);
    }

    #[test]
    fn test_unknown_field_rejection() {
        let result: Result<SiteConfig, _> = toml::from_str("[build]\nminify = true");
        assert!(result.is_err());

        let result: Result<SiteConfig, _> = toml::from_str("[build.media]\nquality = 3");
        assert!(result.is_err());
    }
}
