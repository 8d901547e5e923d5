//! Global config with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic config replacement.
//! This enables hot-reloading of `mdpress.toml` while serving.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CONFIG (ArcSwap)                         │
//! │                                                             │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐    │
//! │  │  Builder    │     │  Watcher    │     │  Watcher    │    │
//! │  │  (rayon)    │     │  (content)  │     │  (config)   │    │
//! │  └──────┬──────┘     └──────┬──────┘     └──────┬──────┘    │
//! │         │                   │                   │           │
//! │         ▼                   ▼                   ▼           │
//! │       cfg()              cfg()           reload_config()    │
//! │    (lock-free)         (lock-free)      (atomic replace)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use super::SiteConfig;
use anyhow::{Result, bail};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::{
    fs,
    sync::{Arc, LazyLock},
};

// =============================================================================
// Global State
// =============================================================================

/// Global config storage with atomic replacement support.
pub static CONFIG: LazyLock<ArcSwap<SiteConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(SiteConfig::default()));

/// Hash of the config file content as last loaded.
static CONFIG_HASH: Mutex<Option<blake3::Hash>> = Mutex::new(None);

// =============================================================================
// Public API
// =============================================================================

/// Get current config as `Arc<SiteConfig>`.
#[inline]
pub fn cfg() -> Arc<SiteConfig> {
    CONFIG.load_full()
}

/// Initialize global config (called once at startup).
pub fn init_config(config: SiteConfig) {
    if let Ok(content) = fs::read(&config.config_path) {
        *CONFIG_HASH.lock() = Some(blake3::hash(&content));
    }
    CONFIG.store(Arc::new(config));
}

/// Replace config atomically when `mdpress.toml` changes.
///
/// Returns `true` if the config was updated, `false` when the file content
/// matches the last load.
pub fn reload_config() -> Result<bool> {
    let current = cfg();
    let Some(cli) = current.cli else {
        bail!("config reload requested before CLI initialization");
    };

    let content = fs::read(&current.config_path)?;
    let new_hash = blake3::hash(&content);
    if is_unchanged(&new_hash) {
        return Ok(false);
    }

    let new_config = SiteConfig::load(cli)?;
    CONFIG.store(Arc::new(new_config));
    *CONFIG_HASH.lock() = Some(new_hash);

    Ok(true)
}

fn is_unchanged(hash: &blake3::Hash) -> bool {
    CONFIG_HASH.lock().as_ref() == Some(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_detects_content_change() {
        let a = blake3::hash(b"[site]\nname = \"A\"");
        let b = blake3::hash(b"[site]\nname = \"B\"");
        let a_again = blake3::hash(b"[site]\nname = \"A\"");

        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }
}
