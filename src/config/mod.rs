//! Site configuration management for `mdpress.toml`.
//!
//! # Sections
//!
//! | Section         | Purpose                                          |
//! |-----------------|--------------------------------------------------|
//! | `[site]`        | Site identity, base URL, theme, home page        |
//! | `[build]`       | Listings, search, feeds                          |
//! | `[build.media]` | Thumbnails and original-image resizing           |
//! | `[serve]`       | Development server (ports, interface, watch)     |
//!
//! # Example
//!
//! ```toml
//! [site]
//! name = "Field Notes"
//! base_url = "https://notes.example.com"
//! theme = "themes/default"
//!
//! [build]
//! page_size = 10
//! generate_feeds = ["rss", "atom"]
//!
//! [serve]
//! port = 8888
//! ```

mod build;
pub mod defaults;
mod error;
mod handle;
mod paths;
mod serve;
mod site;

pub use build::{FeedFormat, MediaConfig, PngCompression};
pub use handle::{cfg, init_config, reload_config};
pub use paths::SitePaths;

use build::BuildConfig;
use error::ConfigError;
use serve::ServeConfig;
use site::SiteSection;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing mdpress.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory (set after loading)
    #[serde(skip)]
    #[educe(Default = PathBuf::from("./"))]
    pub root: PathBuf,

    /// Site identity and theme
    #[serde(default)]
    pub site: SiteSection,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load the config file named by the CLI and apply CLI overrides.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("./"));
        let config_path = root.join(&cli.config);
        let mut config = Self::from_path(&config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        config.update_with_cli(cli);
        Ok(config)
    }

    /// Get the root directory path
    #[inline]
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.root = path.to_path_buf();
    }

    /// Path resolver for the working-directory layout.
    #[inline]
    pub fn paths(&self) -> SitePaths<'_> {
        SitePaths::new(&self.root, &self.site.theme)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);

        let root = cli.root.clone().unwrap_or_else(|| self.root.clone());
        let root = Self::normalize_path(&root);
        self.config_path = Self::normalize_path(&root.join(&cli.config));
        self.set_root(&root);

        if let Commands::Serve {
            interface,
            port,
            watch,
            admin,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
            self.serve.admin |= *admin;
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before any content is processed.
    pub fn validate(&self) -> Result<()> {
        use defaults::build::media::{MIN_THUMB_SIZE, MIN_THUMB_THRESHOLD};

        if self.site.theme.as_os_str().is_empty() {
            bail!(ConfigError::invalid("site.theme", "must be set"));
        }

        let templates = self.paths().templates_dir();
        if !templates.is_dir() {
            bail!(ConfigError::invalid(
                "site.theme",
                format!("templates directory not found: {}", templates.display())
            ));
        }

        if self.build.feeds_enabled() {
            match &self.site.base_url {
                None => bail!(ConfigError::invalid("site.base_url", "is required for feed generation")),
                Some(url) if !url.starts_with("http") => {
                    bail!(ConfigError::invalid("site.base_url", "must start with http:// or https://"))
                }
                _ => {}
            }
        }

        if self.build.page_size == 0 {
            bail!(ConfigError::invalid("build.page_size", "must be at least 1"));
        }

        let media = &self.build.media;
        if let Some(size) = media.thumb_sizes.iter().find(|&&s| s < MIN_THUMB_SIZE) {
            bail!(ConfigError::invalid(
                "build.media.thumb_sizes",
                format!("entry {size} is below the minimum of {MIN_THUMB_SIZE}")
            ));
        }

        if media.thumb_threshold < MIN_THUMB_THRESHOLD {
            bail!(ConfigError::invalid(
                "build.media.thumb_threshold",
                format!("must be at least {MIN_THUMB_THRESHOLD}")
            ));
        }

        if !(1..=100).contains(&media.jpeg_quality) {
            bail!(ConfigError::invalid("build.media.jpeg_quality", "must be between 1 and 100"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
