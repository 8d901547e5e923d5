//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── clean()              (--clean only)
//!     ├── resize_originals()   ([build.media] resize_originals)
//!     │
//!     └── Site::build()
//!             │
//!             ├── ContentLoader ──► pages, posts   (entity cache, thumbnails)
//!             ├── Processor     ──► deploy tree    (FsOutput, unchanged files skipped)
//!             ├── copy_resources()
//!             └── remove_stale()   (listing pages no longer produced)
//! ```
//!
//! A [`Site`] owns the process-wide caches. The watch controller and the
//! authoring endpoints share one for the whole serve session, re-entering
//! [`Site::build`] per change under [`Site::exclusive`].

use crate::{
    config::SiteConfig,
    content::{cache::EntityCache, parser::ContentLoader},
    log,
    media::thumbs,
    output::{self, FsOutput, NullOutput, OutputHandler, ProcessReport, Processor, Stats},
    template::{FsLoader, TemplateCache},
};
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, MutexGuard};
use std::{fs, path::Path, sync::Arc, time::Instant};
use walkdir::WalkDir;

/// Parsed-entity and template caches shared by builds and watchers.
pub struct Site {
    cache: EntityCache,
    templates: ArcSwap<TemplateCache>,
    rebuild: Mutex<()>,
}

impl Site {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            cache: EntityCache::new(),
            templates: ArcSwap::from_pointee(TemplateCache::new(FsLoader::new(config))),
            rebuild: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn templates(&self) -> Arc<TemplateCache> {
        self.templates.load_full()
    }

    /// Held by whoever changes sources and rebuilds, so rebuilds never overlap.
    pub fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.rebuild.lock()
    }

    /// Drop every cached entity and start over with fresh templates.
    ///
    /// Includes are never invalidated inside a template cache, so config and
    /// theme changes need a new one.
    pub fn reset(&self, config: &SiteConfig) {
        self.cache.clear();
        self.templates
            .store(Arc::new(TemplateCache::new(FsLoader::new(config))));
    }

    /// Parse, process and write the deploy tree.
    ///
    /// With `use_cache`, entities whose source mtime is unchanged are reused
    /// and their standalone files are not rewritten.
    pub fn build(&self, config: &SiteConfig, use_cache: bool) -> Result<ProcessReport> {
        let paths = config.paths();
        let deploy = paths.deploy_dir();
        let output = FsOutput::new(&deploy);

        let report = self.process(config, &output, use_cache, true)?;
        copy_resources(config)?;
        output::remove_stale(&deploy, &report.outputs)?;
        Ok(report)
    }

    /// Parse and process everything without touching the deploy tree.
    pub fn stats(&self, config: &SiteConfig) -> Result<Stats> {
        let report = self.process(config, &NullOutput, false, false)?;
        Ok(report.stats)
    }

    fn process(
        &self,
        config: &SiteConfig,
        output: &dyn OutputHandler,
        use_cache: bool,
        thumbnails: bool,
    ) -> Result<ProcessReport> {
        let templates = self.templates.load_full();
        let loader = ContentLoader::new(config, &templates, &self.cache)
            .use_cache(use_cache)
            .thumbnails(thumbnails);

        let pages = loader.load_pages()?;
        let posts = loader.load_posts()?;
        Processor::new(config, &templates, output).process(&pages, &posts)
    }
}

/// Full build as run by `mdpress build` and before serving.
pub fn build_site(site: &Site, config: &SiteConfig, clean: bool) -> Result<Stats> {
    let start = Instant::now();
    let paths = config.paths();

    if clean {
        output::clean(&paths.deploy_dir())?;
    }

    let media = &config.build.media;
    if media.resize_originals && media.max_image_size > 0 {
        let resized = thumbs::resize_originals(&paths.media_root(), media, false)?;
        if resized > 0 {
            log!("thumbs"; "resized {resized} originals");
        }
    }

    let report = site.build(config, false)?;
    log!("build"; "{} in {:.2?}", report.stats, start.elapsed());
    Ok(report.stats)
}

/// Copy `<theme>/resources/` into `deploy/resources/`, skipping unchanged files.
///
/// Returns the number of files written.
pub fn copy_resources(config: &SiteConfig) -> Result<usize> {
    let paths = config.paths();
    let source = paths.resources_dir();
    if !source.is_dir() {
        return Ok(0);
    }

    let output = FsOutput::new(paths.deploy_resources_dir());
    let mut written = 0;
    for entry in WalkDir::new(&source).follow_links(true) {
        let entry = entry.with_context(|| format!("failed to walk {}", source.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(&source)?;
        if is_hidden(rel) {
            continue;
        }
        let bytes = fs::read(entry.path())
            .with_context(|| format!("failed to read {}", entry.path().display()))?;
        if output.write(rel, &bytes)? {
            written += 1;
        }
    }
    Ok(written)
}

fn is_hidden(rel: &Path) -> bool {
    rel.iter().any(|part| part.to_string_lossy().starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::EntityKind;
    use tempfile::TempDir;

    fn config(root: &Path) -> SiteConfig {
        let mut config = SiteConfig::from_str("[site]\ntheme = \"theme\"").unwrap();
        config.set_root(root);
        config
    }

    #[test]
    fn test_copy_resources() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let resources = dir.path().join("theme/resources");
        fs::create_dir_all(resources.join("css")).unwrap();
        fs::write(resources.join("css/site.css"), "body{}").unwrap();
        fs::write(resources.join(".DS_Store"), "x").unwrap();

        assert_eq!(copy_resources(&config).unwrap(), 1);
        let copied = dir.path().join("deploy/resources/css/site.css");
        assert_eq!(fs::read_to_string(copied).unwrap(), "body{}");
        assert!(!dir.path().join("deploy/resources/.DS_Store").exists());

        assert_eq!(copy_resources(&config).unwrap(), 0);
    }

    #[test]
    fn test_copy_resources_without_theme_resources() {
        let dir = TempDir::new().unwrap();
        assert_eq!(copy_resources(&config(dir.path())).unwrap(), 0);
    }

    /// Minimal theme plus a config with every optional output off.
    fn site_fixture(root: &Path) -> SiteConfig {
        let templates = root.join("theme/templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("main.html"), "<title>{{ title }}</title>{{@ sub-template @}}").unwrap();
        fs::write(templates.join("post.html"), "<article>{{ content.id }}</article>").unwrap();
        fs::write(templates.join("pager.html"), "").unwrap();
        fs::create_dir_all(root.join("posts")).unwrap();

        let mut config = config(root);
        config.build.enable_search = false;
        config.build.generate_archive = false;
        config.build.generate_tag_index = false;
        config.build.generate_feeds.clear();
        config.build.media.use_thumbs = false;
        config
    }

    #[test]
    fn test_build_and_orphaned_tags() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let config = site_fixture(root);
        fs::write(root.join("posts/2024-05-01-ride.md"), "---\ntitle: Ride\n---\nOut and back.").unwrap();
        fs::create_dir_all(root.join("deploy/tags/stale")).unwrap();
        fs::write(root.join("deploy/tags/stale/index.html"), "old").unwrap();

        let site = Site::new(&config);
        let report = site.build(&config, true).unwrap();
        assert_eq!(report.stats.posts, 1);
        assert!(root.join("deploy/post/2024-05-01-ride.html").is_file());
        assert!(root.join("deploy/index.html").is_file());
        assert!(!root.join("deploy/tags/stale").exists());

        let stats = site.stats(&config).unwrap();
        assert_eq!(stats.posts, 1);
        assert_eq!(stats.generated, 0);
        assert_eq!(site.cache().len(), 1);
    }

    #[test]
    fn test_shrinking_listing_removes_old_pages() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let mut config = site_fixture(root);
        config.build.page_size = 1;
        for day in 1..=3 {
            let file = root.join(format!("posts/2024-05-0{day}-ride.md"));
            fs::write(file, format!("Ride {day}.")).unwrap();
        }

        let site = Site::new(&config);
        site.build(&config, true).unwrap();
        assert!(root.join("deploy/posts/3.html").is_file());

        fs::remove_file(root.join("posts/2024-05-03-ride.md")).unwrap();
        site.cache().invalidate(EntityKind::Post, "2024-05-03-ride.md");
        let report = site.build(&config, true).unwrap();

        assert_eq!(report.stats.posts, 2);
        assert!(root.join("deploy/posts/2.html").is_file());
        assert!(!root.join("deploy/posts/3.html").exists());
        assert!(root.join("deploy/posts/index.html").is_file());
    }
}
