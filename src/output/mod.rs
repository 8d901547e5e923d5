//! Deploy tree generation from parsed entities.
//!
//! # Output Layout
//!
//! ```text
//! deploy/
//! ├── index.html                  home page, or page 1 of the post listing
//! ├── page/<id>.html
//! ├── post/<id>.html
//! ├── posts/{index,N}.html        chronological listing
//! ├── archive/index.html          month index
//! ├── archive/<yyyy-mm>/{index,N}.html
//! ├── tags/index.html             tag index
//! ├── tags/<tag>/{index,N}.html
//! ├── search.json, search.html
//! └── rss.xml, atom.xml, feed.json
//! ```
//!
//! Every file goes through an [`OutputHandler`], so the same pass can write
//! the deploy tree, collect stats, or fill an in-memory map in tests.

pub mod archive;
pub mod pager;
pub mod search;
pub mod tags;
pub mod writer;

pub use writer::{FsOutput, NullOutput, OutputHandler, TrackedOutput};
#[cfg(test)]
pub use writer::MemoryOutput;

use crate::config::SiteConfig;
use crate::content::{EntityKind, Loaded, Page, Post};
use crate::generator::feed;
use crate::log;
use crate::template::{
    ARCHIVE_TEMPLATE, SEARCH_TEMPLATE, TAG_INDEX_TEMPLATE, TemplateCache, TemplateConfig,
};
use anyhow::{Context, Result, bail};
use archive::ArchiveIndex;
use pager::{PagerState, chunks, page_file_name};
use rayon::prelude::*;
use search::SearchIndex;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};
use tags::TagGroups;
use walkdir::WalkDir;

// ============================================================================
// Constants
// ============================================================================

pub const INDEX_FILE: &str = "index.html";
pub const POSTS_LIST_DIR: &str = "posts";
pub const TAGS_DIR: &str = "tags";
pub const ARCHIVE_DIR: &str = "archive";
pub const SEARCH_INDEX_FILE: &str = "search.json";
pub const SEARCH_PAGE_FILE: &str = "search.html";

/// Generated entries `--clean` removes. Media and theme resources stay.
const GENERATED: &[&str] = &[
    INDEX_FILE,
    "page",
    "post",
    POSTS_LIST_DIR,
    TAGS_DIR,
    ARCHIVE_DIR,
    SEARCH_INDEX_FILE,
    SEARCH_PAGE_FILE,
    "rss.xml",
    "atom.xml",
    "feed.json",
];

/// Listing directories swept after a build.
const SWEPT_DIRS: &[&str] = &[POSTS_LIST_DIR, TAGS_DIR, ARCHIVE_DIR];

/// Optional root files swept after a build.
const SWEPT_FILES: &[&str] = &[SEARCH_INDEX_FILE, SEARCH_PAGE_FILE, "rss.xml", "atom.xml", "feed.json"];

// ============================================================================
// Types
// ============================================================================

/// Root context of every full-page template.
#[derive(Serialize)]
struct PageContext<'a, C: Serialize + ?Sized> {
    entity_type: EntityKind,
    title: &'a str,
    file_name: &'a str,
    content: Option<&'a C>,
    /// Pre-rendered markup for the body shell.
    body: Option<&'a str>,
    config: &'a TemplateConfig,
}

#[derive(Serialize)]
struct PagerContext<'a> {
    pager: &'a PagerState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub pages: usize,
    pub posts: usize,
    pub tags: usize,
    /// Files actually written.
    pub generated: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} posts, {} tags, {} files generated",
            self.pages, self.posts, self.tags, self.generated
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    pub stats: Stats,
    /// Every deploy path produced by the pass, written or unchanged.
    pub outputs: BTreeSet<PathBuf>,
}

/// One paginated listing: `<dir>/index.html`, `<dir>/2.html`, ...
struct Listing<'a> {
    dir: PathBuf,
    uri_prefix: String,
    index_uri: String,
    title: String,
    /// Also write page 1 to the site root.
    root_index: bool,
    items: Vec<&'a str>,
}

// ============================================================================
// Processor
// ============================================================================

pub struct Processor<'a> {
    config: &'a SiteConfig,
    templates: &'a TemplateCache,
    output: TrackedOutput<'a>,
    template_config: TemplateConfig,
    generated: AtomicUsize,
}

impl<'a> Processor<'a> {
    pub fn new(config: &'a SiteConfig, templates: &'a TemplateCache, output: &'a dyn OutputHandler) -> Self {
        Self {
            config,
            templates,
            output: TrackedOutput::new(output),
            template_config: TemplateConfig::from_site(config),
            generated: AtomicUsize::new(0),
        }
    }

    /// Generate the whole deploy tree. Posts are expected newest first.
    pub fn process(&self, pages: &[Loaded<Page>], posts: &[Loaded<Post>]) -> Result<ProcessReport> {
        self.generated.store(0, Ordering::Relaxed);
        self.output.take_paths();
        self.check_home_page(pages)?;

        let mut search = SearchIndex::default();
        self.process_pages(pages, &mut search)?;
        let tags = self.process_posts(posts, &mut search)?;

        let build = &self.config.build;
        if build.enable_search {
            self.write_search(&search)?;
        }
        if build.feeds_enabled() {
            let written = feed::write_feeds(posts, self.config, &self.output)?;
            self.generated.fetch_add(written, Ordering::Relaxed);
        }

        Ok(ProcessReport {
            stats: Stats {
                pages: pages.len(),
                posts: posts.len(),
                tags: tags.len(),
                generated: self.generated.load(Ordering::Relaxed),
            },
            outputs: self.output.take_paths(),
        })
    }

    fn home_page(&self) -> Option<&str> {
        let home = self.config.site.home_page.trim();
        (!home.is_empty()).then_some(home)
    }

    fn check_home_page(&self, pages: &[Loaded<Page>]) -> Result<()> {
        if let Some(home) = self.home_page()
            && !pages.iter().any(|page| page.id == home)
        {
            bail!("home page `{home}` not found in pages/");
        }
        Ok(())
    }

    /// `"<site> - <title>"`, or the site name alone.
    fn title(&self, title: &str) -> String {
        let site = &self.config.site.name;
        match (site.is_empty(), title.is_empty()) {
            (_, true) => site.clone(),
            (true, false) => title.to_owned(),
            (false, false) => format!("{site} - {title}"),
        }
    }

    fn emit(&self, path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
        let path = path.as_ref();
        if self
            .output
            .write(path, bytes)
            .with_context(|| format!("failed to output {}", path.display()))?
        {
            self.generated.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn render_full<C: Serialize + ?Sized>(
        &self,
        template: &str,
        entity_type: EntityKind,
        title: &str,
        file_name: &str,
        content: &C,
    ) -> Result<String> {
        self.templates.render(
            template,
            PageContext {
                entity_type,
                title,
                file_name,
                content: Some(content),
                body: None,
                config: &self.template_config,
            },
        )
    }

    fn render_shell(&self, entity_type: EntityKind, title: &str, body: &str) -> Result<String> {
        self.templates.render(
            self.templates.body_shell()?,
            PageContext::<()> {
                entity_type,
                title,
                file_name: "",
                content: None,
                body: Some(body),
                config: &self.template_config,
            },
        )
    }

    // ========================================================================
    // Pages
    // ========================================================================

    fn process_pages<'p>(&self, pages: &'p [Loaded<Page>], search: &mut SearchIndex<'p>) -> Result<()> {
        let home = self.home_page();
        for page in pages {
            search.push(&page.search);
            if page.skip_processing {
                continue;
            }

            let file_name = format!("{}.html", page.id);
            let path = if home == Some(page.id.as_str()) {
                PathBuf::from(INDEX_FILE)
            } else {
                Path::new(EntityKind::Page.as_str()).join(&file_name)
            };

            let template = self.templates.page(&page.id)?;
            let html = self.render_full(
                &template,
                EntityKind::Page,
                &self.title(&page.title),
                &file_name,
                &*page.entity,
            )?;
            self.emit(&path, html.as_bytes())?;
        }
        Ok(())
    }

    // ========================================================================
    // Posts
    // ========================================================================

    fn render_post(&self, template: &str, post: &Post, file_name: &str) -> Result<String> {
        let html = self.render_full(template, EntityKind::Post, &self.title(&post.title), file_name, post)?;
        Ok(html.trim().to_owned())
    }

    fn process_posts<'p>(&self, posts: &'p [Loaded<Post>], search: &mut SearchIndex<'p>) -> Result<TagGroups> {
        let mut tags = TagGroups::default();
        for post in posts {
            search.push(&post.search);
        }
        if posts.is_empty() {
            return Ok(tags);
        }

        let template = self.templates.post()?;
        self.templates.body_shell()?;

        let fragments: Vec<String> = posts
            .par_iter()
            .map(|post| self.render_post(template, post, &format!("{}.html", post.id)))
            .collect::<Result<_>>()?;

        posts
            .par_iter()
            .filter(|post| !post.skip_processing)
            .try_for_each(|post| {
                let fragment = self.render_post(template, post, "")?;
                let html = self.render_shell(EntityKind::Post, &self.title(&post.title), &fragment)?;
                let path = Path::new(EntityKind::Post.as_str()).join(format!("{}.html", post.id));
                self.emit(&path, html.as_bytes())
            })?;

        let has_home = self.home_page().is_some();
        self.write_listing(Listing {
            dir: PathBuf::from(POSTS_LIST_DIR),
            uri_prefix: format!("/{POSTS_LIST_DIR}"),
            index_uri: if has_home { format!("/{POSTS_LIST_DIR}/") } else { "/".to_owned() },
            title: self.title(""),
            root_index: !has_home,
            items: fragments.iter().map(String::as_str).collect(),
        })?;

        if self.config.build.generate_archive {
            self.process_archive(posts, &fragments)?;
        }

        for (idx, post) in posts.iter().enumerate() {
            for tag in &post.tags {
                tags.add(tag, idx);
            }
        }
        self.process_tags(&tags, &fragments)?;

        Ok(tags)
    }

    fn process_archive(&self, posts: &[Loaded<Post>], fragments: &[String]) -> Result<()> {
        let mut index = ArchiveIndex::default();
        let mut months: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for (post, fragment) in posts.iter().zip(fragments) {
            if let Some(date) = post.date {
                index.add(date);
                months
                    .entry(crate::utils::date::archive_key(date))
                    .or_default()
                    .push(fragment);
            }
        }
        if index.is_empty() {
            return Ok(());
        }

        let template = self.templates.standalone(ARCHIVE_TEMPLATE)?;
        let html = self.render_full(template, EntityKind::Post, &self.title("Archive"), "", &index)?;
        self.emit(Path::new(ARCHIVE_DIR).join(INDEX_FILE), html.as_bytes())?;

        for (key, items) in months {
            self.write_listing(Listing {
                dir: Path::new(ARCHIVE_DIR).join(&key),
                uri_prefix: format!("/{ARCHIVE_DIR}/{key}"),
                index_uri: format!("/{ARCHIVE_DIR}/{key}/"),
                title: self.title(&key),
                root_index: false,
                items,
            })?;
        }
        Ok(())
    }

    fn process_tags(&self, tags: &TagGroups, fragments: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        if self.config.build.generate_tag_index {
            let template = self.templates.standalone(TAG_INDEX_TEMPLATE)?;
            let index = tags.index();
            let html = self.render_full(template, EntityKind::Post, &self.title("Tag Index"), "", &index)?;
            self.emit(Path::new(TAGS_DIR).join(INDEX_FILE), html.as_bytes())?;
        }

        for (uri, group) in tags.iter() {
            self.write_listing(Listing {
                dir: Path::new(TAGS_DIR).join(uri),
                uri_prefix: format!("/{TAGS_DIR}/{uri}"),
                index_uri: format!("/{TAGS_DIR}/{uri}/"),
                title: self.title(&group.title),
                root_index: false,
                items: group.posts.iter().map(|&idx| fragments[idx].as_str()).collect(),
            })?;
        }
        Ok(())
    }

    fn write_listing(&self, listing: Listing<'_>) -> Result<()> {
        let page_size = self.config.build.page_size;
        for chunk in chunks(&listing.items, page_size) {
            let mut body = chunk.items.concat();
            if chunk.show_pager {
                let state = PagerState::new(chunk.number, chunk.total, &listing.uri_prefix, &listing.index_uri);
                body.push_str(&self.templates.render(
                    self.templates.pager()?,
                    PagerContext { pager: &state },
                )?);
            }

            let html = self.render_shell(EntityKind::Post, &listing.title, &body)?;
            if chunk.number == 1 && listing.root_index {
                self.emit(INDEX_FILE, html.as_bytes())?;
            }
            self.emit(listing.dir.join(page_file_name(chunk.number)), html.as_bytes())?;
        }
        Ok(())
    }

    // ========================================================================
    // Search
    // ========================================================================

    fn write_search(&self, search: &SearchIndex<'_>) -> Result<()> {
        let json = search.to_json().context("failed to serialize the search index")?;
        self.emit(SEARCH_INDEX_FILE, &json)?;

        let template = self.templates.standalone(SEARCH_TEMPLATE)?;
        let html = self.render_full(template, EntityKind::Page, &self.title("Search"), SEARCH_PAGE_FILE, &())?;
        self.emit(SEARCH_PAGE_FILE, html.as_bytes())
    }
}

/// Remove generated files and listing directories from the deploy tree.
pub fn clean(deploy_dir: &Path) -> Result<()> {
    for name in GENERATED {
        let path = deploy_dir.join(name);
        if path.is_dir() {
            fs::remove_dir_all(&path).with_context(|| format!("failed to remove {}", path.display()))?;
        } else if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
        } else {
            continue;
        }
        log!("build"; "removed {name}");
    }
    Ok(())
}

/// Delete listing pages and optional root files missing from `live`.
///
/// `page/` and `post/` are not swept: cache hits are never re-emitted.
/// Returns the number of files removed.
pub fn remove_stale(deploy_dir: &Path, live: &BTreeSet<PathBuf>) -> Result<usize> {
    let mut removed = 0;

    for name in SWEPT_FILES {
        let path = deploy_dir.join(name);
        if path.is_file() && !live.contains(Path::new(name)) {
            fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
            log!("build"; "removed {name}");
            removed += 1;
        }
    }

    for dir in SWEPT_DIRS {
        let root = deploy_dir.join(dir);
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root).contents_first(true) {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            let path = entry.path();
            if entry.file_type().is_dir() {
                let empty = fs::read_dir(path)
                    .with_context(|| format!("failed to list {}", path.display()))?
                    .next()
                    .is_none();
                if empty {
                    fs::remove_dir(path).with_context(|| format!("failed to remove {}", path.display()))?;
                }
                continue;
            }

            let rel = path.strip_prefix(deploy_dir)?;
            if !live.contains(rel) {
                fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
                log!("build"; "removed {}", rel.display());
                removed += 1;
            }
        }
    }
    Ok(removed)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MediaHint, SearchEntry};
    use crate::template::{
        MAIN_TEMPLATE, MemoryLoader, PAGE_TEMPLATE, PAGER_TEMPLATE, POST_TEMPLATE,
    };
    use crate::utils::date::parse_date;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn templates() -> TemplateCache {
        TemplateCache::new(
            MemoryLoader::new()
                .template(MAIN_TEMPLATE, "<title>{{ title }}</title>{{@ sub-template @}}")
                .template(PAGE_TEMPLATE, "<main>{{ content.body }}</main>")
                .template(POST_TEMPLATE, "<article>{{ content.id }}|{{ file_name }}</article>\n")
                .template(PAGER_TEMPLATE, "<nav>{{ pager.current }}/{{ pager.total }}</nav>")
                .template(
                    ARCHIVE_TEMPLATE,
                    "{% for y in content %}{{ y.year }}:{% for m in y.months %}{{ m.key }}={{ m.count }};{% endfor %}{% endfor %}",
                )
                .template(TAG_INDEX_TEMPLATE, "{% for t in content %}{{ t.title }}={{ t.count }};{% endfor %}")
                .template(SEARCH_TEMPLATE, "<div id=\"search\"></div>"),
        )
    }

    fn config(home_page: &str) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.site.name = "Site".into();
        config.site.home_page = home_page.into();
        config.build.page_size = 2;
        config.build.generate_feeds = Vec::new();
        config
    }

    fn page(id: &str) -> Loaded<Page> {
        Loaded::fresh(Arc::new(Page {
            id: id.into(),
            title: id.to_uppercase(),
            body: format!("<p>{id}</p>"),
            search: SearchEntry { key: format!("page/{id}"), text: id.into() },
        }))
    }

    fn post(id: &str, date: Option<&str>, tags: &[&str]) -> Loaded<Post> {
        Loaded::fresh(Arc::new(Post {
            id: id.into(),
            title: String::new(),
            body: String::new(),
            raw_body: String::new(),
            date: date.map(|d| parse_date(d).unwrap()),
            time: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            search: SearchEntry { key: format!("post/{id}"), text: id.into() },
            media_hint: MediaHint::None,
        }))
    }

    fn five_posts() -> Vec<Loaded<Post>> {
        vec![
            post("p5", Some("2024-05-03"), &["Gravel"]),
            post("p4", Some("2024-05-01"), &["gravel", "Rain"]),
            post("p3", Some("2024-04-20"), &[]),
            post("p2", None, &["Rain"]),
            post("p1", Some("2023-12-24"), &[]),
        ]
    }

    #[test]
    fn test_chronological_pagination() {
        let (config, templates, output) = (config(""), templates(), MemoryOutput::new());
        let report = Processor::new(&config, &templates, &output)
            .process(&[page("about")], &five_posts())
            .unwrap();

        let first = "<title>Site</title><article>p5|p5.html</article><article>p4|p4.html</article><nav>1/3</nav>";
        assert_eq!(output.get("index.html").as_deref(), Some(first));
        assert_eq!(output.get("posts/index.html").as_deref(), Some(first));
        assert!(output.get("posts/2.html").unwrap().contains("p3|p3.html"));
        assert!(output.get("posts/3.html").unwrap().ends_with("<article>p1|p1.html</article><nav>3/3</nav>"));
        assert_eq!(
            output.get("post/p5.html").as_deref(),
            Some("<title>Site</title><article>p5|</article>")
        );
        assert_eq!(report.stats.posts, 5);
        assert_eq!(report.stats.pages, 1);
    }

    #[test]
    fn test_home_page() {
        let (config, templates, output) = (config("about"), templates(), MemoryOutput::new());
        Processor::new(&config, &templates, &output)
            .process(&[page("about"), page("contact")], &five_posts())
            .unwrap();

        assert_eq!(
            output.get("index.html").as_deref(),
            Some("<title>Site - ABOUT</title><main><p>about</p></main>")
        );
        assert!(output.get("page/about.html").is_none());
        assert!(output.get("page/contact.html").is_some());
        assert!(output.get("posts/index.html").is_some());
    }

    #[test]
    fn test_missing_home_page_writes_nothing() {
        let (config, templates, output) = (config("about"), templates(), MemoryOutput::new());
        let result = Processor::new(&config, &templates, &output).process(&[page("contact")], &five_posts());

        assert!(result.is_err());
        assert!(output.paths().is_empty());
    }

    #[test]
    fn test_tags_and_tag_index() {
        let (config, templates, output) = (config(""), templates(), MemoryOutput::new());
        let report = Processor::new(&config, &templates, &output)
            .process(&[], &five_posts())
            .unwrap();

        assert_eq!(report.stats.tags, 2);
        assert!(report.outputs.contains(Path::new("tags/gravel/index.html")));
        assert!(report.outputs.contains(Path::new("tags/rain/index.html")));
        assert_eq!(
            output.get("tags/gravel/index.html").as_deref(),
            Some("<title>Site - Gravel</title><article>p5|p5.html</article><article>p4|p4.html</article><nav>1/1</nav>")
        );
        assert_eq!(
            output.get("tags/index.html").as_deref(),
            Some("<title>Site - Tag Index</title>Gravel=2;Rain=2;")
        );
    }

    #[test]
    fn test_archive() {
        let (config, templates, output) = (config(""), templates(), MemoryOutput::new());
        Processor::new(&config, &templates, &output)
            .process(&[], &five_posts())
            .unwrap();

        assert_eq!(
            output.get("archive/index.html").as_deref(),
            Some("<title>Site - Archive</title>2024:2024-05=2;2024-04=1;2023:2023-12=1;")
        );
        assert!(output.get("archive/2024-05/index.html").unwrap().contains("p4|p4.html"));
        assert!(output.get("archive/2024-04/index.html").unwrap().ends_with("p3|p3.html</article>"));
    }

    #[test]
    fn test_archive_skipped_without_dates() {
        let (config, templates, output) = (config(""), templates(), MemoryOutput::new());
        Processor::new(&config, &templates, &output)
            .process(&[], &[post("p1", None, &[])])
            .unwrap();
        assert!(output.paths().iter().all(|p| !p.starts_with("archive")));
    }

    #[test]
    fn test_search_index_order() {
        let (config, templates, output) = (config(""), templates(), MemoryOutput::new());
        Processor::new(&config, &templates, &output)
            .process(&[page("about")], &[post("p2", None, &[]), post("p1", None, &[])])
            .unwrap();

        assert_eq!(
            output.get("search.json").as_deref(),
            Some(r#"{"page/about":"about","post/p2":"p2","post/p1":"p1"}"#)
        );
        assert!(output.get("search.html").unwrap().starts_with("<title>Site - Search</title>"));
    }

    #[test]
    fn test_second_pass_writes_nothing() {
        let (config, templates, output) = (config(""), templates(), MemoryOutput::new());
        let processor = Processor::new(&config, &templates, &output);
        let posts = five_posts();

        assert!(processor.process(&[page("about")], &posts).unwrap().stats.generated > 0);
        assert_eq!(processor.process(&[page("about")], &posts).unwrap().stats.generated, 0);
    }

    #[test]
    fn test_cached_post_still_listed() {
        let (config, templates, output) = (config(""), templates(), MemoryOutput::new());
        let cached = Loaded::cached(post("p1", None, &[]).entity);
        Processor::new(&config, &templates, &output)
            .process(&[], &[cached])
            .unwrap();

        assert!(output.get("post/p1.html").is_none());
        assert_eq!(
            output.get("index.html").as_deref(),
            Some("<title>Site</title><article>p1|p1.html</article>")
        );
    }

    #[test]
    fn test_outputs_include_unchanged_files() {
        let (config, templates, output) = (config(""), templates(), MemoryOutput::new());
        let processor = Processor::new(&config, &templates, &output);
        let posts = five_posts();

        let first = processor.process(&[], &posts).unwrap();
        let second = processor.process(&[], &posts).unwrap();
        assert_eq!(second.stats.generated, 0);
        assert_eq!(first.outputs, second.outputs);
        assert!(second.outputs.contains(Path::new("posts/3.html")));
    }

    #[test]
    fn test_remove_stale_listing_pages() {
        let dir = TempDir::new().unwrap();
        let deploy = dir.path();
        for file in [
            "posts/index.html",
            "posts/2.html",
            "tags/gravel/index.html",
            "tags/gone/index.html",
            "tags/index.html",
            "archive/2024-05/2.html",
            "post/p1.html",
            "search.json",
            "rss.xml",
        ] {
            let path = deploy.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }

        let live: BTreeSet<PathBuf> = ["posts/index.html", "tags/gravel/index.html", "search.json"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(remove_stale(deploy, &live).unwrap(), 5);

        assert!(deploy.join("posts/index.html").is_file());
        assert!(!deploy.join("posts/2.html").exists());
        assert!(deploy.join("tags/gravel/index.html").is_file());
        assert!(!deploy.join("tags/gone").exists());
        assert!(!deploy.join("tags/index.html").exists());
        assert!(!deploy.join("archive").exists());
        assert!(deploy.join("post/p1.html").is_file());
        assert!(deploy.join("search.json").is_file());
        assert!(!deploy.join("rss.xml").exists());
    }

    #[test]
    fn test_clean_keeps_media() {
        let dir = TempDir::new().unwrap();
        for sub in ["posts", "tags/x", "media/post/a"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        fs::write(dir.path().join("index.html"), "x").unwrap();

        clean(dir.path()).unwrap();
        assert!(!dir.path().join("posts").exists());
        assert!(!dir.path().join("tags").exists());
        assert!(!dir.path().join("index.html").exists());
        assert!(dir.path().join("media/post/a").is_dir());
    }
}
