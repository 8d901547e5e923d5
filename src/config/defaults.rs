//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [site] Section Defaults
// ============================================================================

pub mod site {
    use std::path::PathBuf;

    pub fn theme() -> PathBuf {
        "themes/default".into()
    }

    pub fn base_url() -> Option<String> {
        None
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use super::super::FeedFormat;

    pub fn page_size() -> usize {
        10
    }

    pub fn generate_feeds() -> Vec<FeedFormat> {
        vec![]
    }

    pub fn feed_post_count() -> usize {
        20
    }

    pub fn feed_continue_text() -> String {
        "Continue reading...".into()
    }

    pub fn feed_excerpt_sentences() -> usize {
        3
    }

    pub mod media {
        use super::super::super::PngCompression;

        /// Smallest accepted thumbnail width.
        pub const MIN_THUMB_SIZE: u32 = 320;

        /// Smallest accepted thumbnail threshold (MB).
        pub const MIN_THUMB_THRESHOLD: f64 = 0.3;

        pub fn thumb_sizes() -> Vec<u32> {
            vec![480, 960]
        }

        pub fn thumb_threshold() -> f64 {
            0.5
        }

        pub fn jpeg_quality() -> u8 {
            85
        }

        pub fn png_compression() -> PngCompression {
            PngCompression::default()
        }

        pub fn max_image_size() -> u32 {
            0
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8888
    }

    pub fn reload_port() -> u16 {
        8889
    }
}
