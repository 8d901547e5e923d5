//! `[serve]` section configuration.
//!
//! Contains development server settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[serve]` section in mdpress.toml - development server settings.
///
/// # Example
/// ```toml
/// [serve]
/// interface = "0.0.0.0"  # Listen on all interfaces
/// port = 3000
/// reload_port = 3001     # WebSocket live-reload channel
/// watch = true           # Rebuild and push reloads on file changes
/// admin = false          # Authoring endpoints and editor script
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 8888).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// WebSocket port for live reload (default: 8889).
    #[serde(default = "defaults::serve::reload_port")]
    #[educe(Default = defaults::serve::reload_port())]
    pub reload_port: u16,

    /// Enable file watcher for live reload on changes.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,

    /// Expose `/admin-*` authoring endpoints and inject the editor script.
    #[serde(default)]
    pub admin: bool,
}
