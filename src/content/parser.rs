//! Loading pages and posts from `pages/` and `posts/`.
//!
//! ```text
//! <kind>/<file>.md ──► (name, mtime)
//!                        │
//!        cache hit? ─────┼── yes ─► Loaded::cached (same Arc, skip own page)
//!                        │
//!                        └── no ──► thumbnails ─► front matter ─► directives
//!                                   ─► markdown ─► Loaded::fresh + cache put
//! ```
//!
//! Pages load in ascending file-name order, posts in descending order so the
//! newest (date-prefixed) post comes first. Files are parsed in parallel.

use super::{
    EntityKind, Loaded, Page, Post, SearchEntry,
    cache::{CachedEntity, EntityCache},
    directive::{self, DirectiveContext, Resolved},
    entity_id, front_matter,
};
use crate::{
    config::SiteConfig,
    log,
    media::thumbs,
    template::TemplateCache,
    utils::{
        date::{parse_date, parse_time},
        slug::normalize_tag_uri,
    },
};
use anyhow::{Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::{fs, path::Path, sync::Arc, time::SystemTime};

const SOURCE_EXTENSION: &str = "md";

/// An entity kind the loader can parse and cache.
trait SourceEntity: Sized + Send + Sync {
    const KIND: EntityKind;

    fn parse(loader: &ContentLoader<'_>, id: &str, source: &str) -> Result<Self>;
    fn from_cached(entity: CachedEntity) -> Option<Arc<Self>>;
    fn to_cached(entity: Arc<Self>) -> CachedEntity;
}

impl SourceEntity for Page {
    const KIND: EntityKind = EntityKind::Page;

    fn parse(loader: &ContentLoader<'_>, id: &str, source: &str) -> Result<Self> {
        loader.parse_page(id, source)
    }

    fn from_cached(entity: CachedEntity) -> Option<Arc<Self>> {
        match entity {
            CachedEntity::Page(page) => Some(page),
            CachedEntity::Post(_) => None,
        }
    }

    fn to_cached(entity: Arc<Self>) -> CachedEntity {
        CachedEntity::Page(entity)
    }
}

impl SourceEntity for Post {
    const KIND: EntityKind = EntityKind::Post;

    fn parse(loader: &ContentLoader<'_>, id: &str, source: &str) -> Result<Self> {
        loader.parse_post(id, source)
    }

    fn from_cached(entity: CachedEntity) -> Option<Arc<Self>> {
        match entity {
            CachedEntity::Post(post) => Some(post),
            CachedEntity::Page(_) => None,
        }
    }

    fn to_cached(entity: Arc<Self>) -> CachedEntity {
        CachedEntity::Post(entity)
    }
}

/// Parses source files into entities, consulting the entity cache.
pub struct ContentLoader<'a> {
    config: &'a SiteConfig,
    templates: &'a TemplateCache,
    cache: &'a EntityCache,
    thumb_sizes: Vec<u32>,
    use_cache: bool,
    thumbnails: bool,
}

impl<'a> ContentLoader<'a> {
    pub fn new(config: &'a SiteConfig, templates: &'a TemplateCache, cache: &'a EntityCache) -> Self {
        Self {
            config,
            templates,
            cache,
            thumb_sizes: config.build.media.sorted_thumb_sizes(),
            use_cache: true,
            thumbnails: true,
        }
    }

    /// Look entities up in the cache before parsing.
    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Bring each parsed entity's thumbnails in line with the config first.
    pub fn thumbnails(mut self, enabled: bool) -> Self {
        self.thumbnails = enabled;
        self
    }

    pub fn load_pages(&self) -> Result<Vec<Loaded<Page>>> {
        self.load::<Page>()
    }

    pub fn load_posts(&self) -> Result<Vec<Loaded<Post>>> {
        self.load::<Post>()
    }

    fn load<T: SourceEntity>(&self) -> Result<Vec<Loaded<T>>> {
        let dir = self.config.paths().source_dir(T::KIND);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = source_files(&dir)?;
        if T::KIND == EntityKind::Post {
            files.reverse();
        }
        if files.is_empty() {
            return Ok(Vec::new());
        }

        log!("parse"; "{} {}s", files.len(), T::KIND);
        files
            .par_iter()
            .map(|(name, modified)| self.load_one::<T>(&dir, name, *modified))
            .collect()
    }

    fn load_one<T: SourceEntity>(&self, dir: &Path, name: &str, modified: SystemTime) -> Result<Loaded<T>> {
        if self.use_cache
            && let Some(entity) = self.cache.get(T::KIND, name, modified).and_then(T::from_cached)
        {
            return Ok(Loaded::cached(entity));
        }

        let path = dir.join(name);
        let source = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let id = entity_id(name);

        if self.thumbnails {
            let media_dir = self.config.paths().media_dir(T::KIND, id);
            let report = thumbs::process_dir(&media_dir, &self.config.build.media)
                .with_context(|| format!("failed to process thumbnails of {}", media_dir.display()))?;
            if report.generated > 0 || report.deleted > 0 {
                log!("thumbs"; "{} {id}: {} generated, {} deleted", T::KIND, report.generated, report.deleted);
            }
        }

        let entity = T::parse(self, id, &source)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let entity = Arc::new(entity);
        self.cache.put(name, modified, T::to_cached(Arc::clone(&entity)));
        Ok(Loaded::fresh(entity))
    }

    fn resolve(&self, kind: EntityKind, id: &str, body: &str) -> Resolved {
        let media_dir = self.config.paths().media_dir(kind, id);
        let ctx = DirectiveContext {
            kind,
            id,
            media_dir: &media_dir,
            thumb_sizes: &self.thumb_sizes,
            templates: self.templates,
        };
        directive::resolve(body, &ctx)
    }

    pub fn parse_page(&self, id: &str, source: &str) -> Result<Page> {
        let (meta, body) = front_matter::parse(source)?;
        let resolved = self.resolve(EntityKind::Page, id, body);
        let raw_title = meta.title.unwrap_or_default();

        Ok(Page {
            id: id.to_owned(),
            title: display_title(&raw_title),
            body: resolved.render_html(),
            search: SearchEntry {
                key: format!("page/{id}"),
                text: format!("{} {}", raw_title.to_lowercase(), resolved.raw_body.to_lowercase()),
            },
        })
    }

    pub fn parse_post(&self, id: &str, source: &str) -> Result<Post> {
        let (meta, body) = front_matter::parse(source)?;
        let date = meta.date.as_deref().map(parse_date).transpose()?;
        let time = meta.time.as_deref().map(parse_time).transpose()?;
        let tags = dedup_tags(meta.tags);

        let resolved = self.resolve(EntityKind::Post, id, body);
        let raw_title = meta.title.unwrap_or_default();
        let text = format!(
            "{} {} {}",
            raw_title.to_lowercase(),
            resolved.raw_body.to_lowercase(),
            tags.join(" ").to_lowercase()
        );

        Ok(Post {
            id: id.to_owned(),
            title: display_title(&raw_title),
            body: resolved.render_html(),
            date,
            time,
            tags,
            search: SearchEntry {
                key: format!("post/{id}"),
                text,
            },
            media_hint: resolved.media_hint,
            raw_body: resolved.raw_body,
        })
    }
}

/// Markdown sources of `dir` with their mtimes, by file name.
fn source_files(dir: &Path) -> Result<Vec<(String, SystemTime)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if !metadata.is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION)
        {
            continue;
        }
        files.push((entry.file_name().to_string_lossy().into_owned(), metadata.modified()?));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn display_title(title: &str) -> String {
    title.replace('\n', "<br>")
}

/// Keep the first spelling of each tag, compared by URI segment.
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    tags.into_iter()
        .map(|tag| tag.trim().to_owned())
        .filter(|tag| {
            let key = normalize_tag_uri(tag);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{MEDIA_TEMPLATE, MemoryLoader};
    use std::{fs::File, time::Duration};
    use tempfile::TempDir;

    struct Site {
        dir: TempDir,
        config: SiteConfig,
        templates: TemplateCache,
        cache: EntityCache,
    }

    impl Site {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let mut config = SiteConfig::default();
            config.set_root(dir.path());
            Self {
                dir,
                config,
                templates: TemplateCache::new(
                    MemoryLoader::new().template(MEDIA_TEMPLATE, "{% for m in media %}<img src=\"{{ m.uri }}\">{% endfor %}"),
                ),
                cache: EntityCache::new(),
            }
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn loader(&self) -> ContentLoader<'_> {
            ContentLoader::new(&self.config, &self.templates, &self.cache)
        }
    }

    #[test]
    fn test_parse_post_fields() {
        let site = Site::new();
        let source = "---\ntitle: |-\n  Morning\n  Ride\ndate: 2024-05-01\ntime: \"07:30\"\ntags: [Gravel, gravel, Multi Word]\n---\nUp the #Hill early.\n";
        let post = site.loader().parse_post("2024-05-01-ride", source).unwrap();

        assert_eq!(post.title, "Morning<br>Ride");
        assert_eq!(post.date, chrono::NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(post.time, chrono::NaiveTime::from_hms_opt(7, 30, 0));
        assert_eq!(post.tags, vec!["Gravel", "Multi Word"]);
        assert_eq!(post.body, "<p>Up the <a href=\"/tags/hill/\">#Hill</a> early.</p>");
        assert_eq!(post.raw_body, "Up the #Hill early.");
        assert_eq!(post.search.key, "post/2024-05-01-ride");
        assert_eq!(post.search.text, "morning\nride up the #hill early. gravel multi word");
    }

    #[test]
    fn test_parse_post_invalid_date() {
        let site = Site::new();
        assert!(site.loader().parse_post("p", "---\ndate: 2024-02-30\n---\nx").is_err());
        assert!(site.loader().parse_post("p", "---\ntime: 25:00\n---\nx").is_err());
    }

    #[test]
    fn test_parse_page_without_front_matter() {
        let site = Site::new();
        let page = site.loader().parse_page("about", "Hello\n\n---\n\nWorld").unwrap();

        assert_eq!(page.title, "");
        assert!(page.body.contains("<hr />"));
        assert_eq!(page.search.text, " hello --- world");
    }

    #[test]
    fn test_parse_page_media_directive() {
        let site = Site::new();
        site.write("deploy/media/page/about/me.png", "x");
        let page = site.loader().parse_page("about", "{media}").unwrap();
        assert_eq!(page.body, "<p><img src=\"/media/page/about/me.png\"></p>");
    }

    #[test]
    fn test_load_order_and_filtering() {
        let site = Site::new();
        site.write("posts/2024-01-01-a.md", "a");
        site.write("posts/2024-03-01-c.md", "c");
        site.write("posts/2024-02-01-b.md", "b");
        site.write("posts/notes.txt", "ignored");
        site.write("pages/b.md", "b");
        site.write("pages/a.md", "a");

        let loader = site.loader();
        let posts: Vec<String> = loader.load_posts().unwrap().iter().map(|p| p.id.clone()).collect();
        let pages: Vec<String> = loader.load_pages().unwrap().iter().map(|p| p.id.clone()).collect();

        assert_eq!(posts, ["2024-03-01-c", "2024-02-01-b", "2024-01-01-a"]);
        assert_eq!(pages, ["a", "b"]);
    }

    #[test]
    fn test_missing_source_dir() {
        let site = Site::new();
        assert!(site.loader().load_pages().unwrap().is_empty());
    }

    #[test]
    fn test_cache_returns_same_entity_until_mtime_changes() {
        let site = Site::new();
        site.write("posts/p.md", "first");

        let first = site.loader().load_posts().unwrap();
        assert!(!first[0].skip_processing);

        let second = site.loader().load_posts().unwrap();
        assert!(second[0].skip_processing);
        assert!(Arc::ptr_eq(&first[0].entity, &second[0].entity));

        let uncached = site.loader().use_cache(false).load_posts().unwrap();
        assert!(!uncached[0].skip_processing);

        let path = site.dir.path().join("posts/p.md");
        fs::write(&path, "second").unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        File::options().write(true).open(&path).unwrap().set_modified(later).unwrap();

        let third = site.loader().load_posts().unwrap();
        assert!(!third[0].skip_processing);
        assert_eq!(third[0].body, "<p>second</p>");
    }
}
