//! `[site]` section configuration.
//!
//! Contains site identity and theme selection.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[site]` section in mdpress.toml - site metadata.
///
/// # Example
/// ```toml
/// [site]
/// name = "Field Notes"
/// description = "Short posts about long rides"
/// base_url = "https://notes.example.com"
/// theme = "themes/default"
/// home_page = "about"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    /// Site name, used as the title prefix of every page.
    #[serde(default)]
    pub name: String,

    /// Site description for feeds.
    #[serde(default)]
    pub description: String,

    /// Absolute base URL. Required when feeds are enabled.
    #[serde(default = "defaults::site::base_url")]
    #[educe(Default = defaults::site::base_url())]
    pub base_url: Option<String>,

    /// Theme directory (contains `templates/` and `resources/`).
    #[serde(default = "defaults::site::theme")]
    #[educe(Default = defaults::site::theme())]
    pub theme: PathBuf,

    /// Page id rendered as the site index instead of the post feed.
    #[serde(default)]
    pub home_page: String,
}

impl SiteSection {
    /// Base URL without a trailing slash, empty when unset.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or_default()
    }
}
