//! Theme template composition and caching.
//!
//! Theme templates are minijinja markup extended with pre-processing
//! placeholders that are resolved before compilation:
//!
//! | Placeholder             | Meaning                                              |
//! |-------------------------|------------------------------------------------------|
//! | `{{@ file.html @}}`     | template include from `<theme>/templates/`           |
//! | `{{# file.html #}}`     | content include: Global then Theme scope, optional   |
//! | `{{@ sub-template @}}`  | slot in `main.html` for the page-specific template   |
//! | `{{@ page-head @}}`     | slot in `main.html` for a per-page head include      |
//! | `{% page:id %}`         | link to `/page/id.html` (also `post:`)               |
//!
//! # Composition
//!
//! ```text
//! main.html (memoized) ──mutator──► splice body at {{@ sub-template @}}
//!                                         │
//!                                         ▼
//!                                  resolve includes ──► drop {{@ page-head @}}
//!                                         │
//!                                         ▼
//!                                  minijinja compile (cached by name)
//! ```

mod functions;
mod loader;

pub use loader::{FsLoader, ResourceLoader};
#[cfg(test)]
pub use loader::MemoryLoader;

use crate::config::SiteConfig;
use crate::content::directive::resolve_content_links;
use anyhow::{Context, Result};
use minijinja::{AutoEscape, Environment};
use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::{fmt, sync::LazyLock};
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

pub const MAIN_TEMPLATE: &str = "main.html";
pub const PAGE_TEMPLATE: &str = "page.html";
pub const POST_TEMPLATE: &str = "post.html";
pub const MEDIA_TEMPLATE: &str = "media.html";
pub const PAGER_TEMPLATE: &str = "pager.html";
pub const ARCHIVE_TEMPLATE: &str = "archive.html";
pub const TAG_INDEX_TEMPLATE: &str = "tags.html";
pub const SEARCH_TEMPLATE: &str = "search.html";

/// Shell with the rendered body passed in as `body`.
const BODY_SHELL: &str = "main.html#body";

const SUB_TEMPLATE_PLACEHOLDER: &str = "{{@ sub-template @}}";
const PAGE_HEAD_PLACEHOLDER: &str = "{{@ page-head @}}";
const PAGE_HEAD_INCLUDE_PREFIX: &str = "page-head--";

static RE_TEMPLATE_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{@\s*([\w-]+\.html)\s*@\}\}").unwrap());
static RE_CONTENT_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{#\s*([\w-]+\.html)\s*#\}\}").unwrap());

// ============================================================================
// Types
// ============================================================================

/// Where a content include is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncludeScope {
    /// `include/<file>`, shared by all themes.
    Global,
    /// `include/<theme-name>/<file>`.
    Theme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IncludeKind {
    Template,
    Content,
}

impl fmt::Display for IncludeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Template => "Template",
            Self::Content => "Content",
        })
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template `{0}` not found")]
    NotFound(String),

    #[error("failed to read `{name}`")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("template error")]
    Render(#[from] minijinja::Error),
}

/// Site values exposed to every template as `config`.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateConfig {
    pub page_size: usize,
    pub generate_feeds: bool,
    pub site_base_url: String,
    pub site_name: String,
}

impl TemplateConfig {
    pub fn from_site(config: &SiteConfig) -> Self {
        Self {
            page_size: config.build.page_size,
            generate_feeds: config.build.feeds_enabled(),
            site_base_url: config.site.base_url().to_owned(),
            site_name: config.site.name.clone(),
        }
    }
}

// ============================================================================
// Template Cache
// ============================================================================

/// Compiled templates and resolved includes for one process run.
///
/// Nothing is invalidated once cached; the per-page template is recompiled
/// on every request.
pub struct TemplateCache {
    loader: Box<dyn ResourceLoader>,
    env: RwLock<Environment<'static>>,
    main: RwLock<Option<String>>,
    includes: RwLock<FxHashMap<String, String>>,
}

impl TemplateCache {
    pub fn new(loader: impl ResourceLoader + 'static) -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        functions::register(&mut env);

        Self {
            loader: Box::new(loader),
            env: RwLock::new(env),
            main: RwLock::new(None),
            includes: RwLock::new(FxHashMap::default()),
        }
    }

    /// `main.html` markup, loaded once.
    fn main_markup(&self) -> Result<String> {
        if let Some(markup) = self.main.read().as_ref() {
            return Ok(markup.clone());
        }
        let markup = self
            .loader
            .load_template(MAIN_TEMPLATE)
            .context("failed to load the main template")?;
        *self.main.write() = Some(markup.clone());
        Ok(markup)
    }

    /// Replace template and content includes, then content links.
    pub fn resolve_includes(&self, markup: &str) -> Result<String> {
        let mut found: Vec<(IncludeKind, String, String)> = Vec::new();
        for caps in RE_TEMPLATE_INCLUDE.captures_iter(markup) {
            found.push((IncludeKind::Template, caps[0].to_owned(), caps[1].to_owned()));
        }
        for caps in RE_CONTENT_INCLUDE.captures_iter(markup) {
            found.push((IncludeKind::Content, caps[0].to_owned(), caps[1].to_owned()));
        }

        let mut out = markup.to_owned();
        for (kind, placeholder, file) in found {
            let include = self.include(kind, &file)?;
            out = out.replacen(&placeholder, &include, 1);
        }
        Ok(resolve_content_links(&out))
    }

    fn include(&self, kind: IncludeKind, file: &str) -> Result<String> {
        let key = format!("{kind}/{file}");
        if let Some(markup) = self.includes.read().get(&key) {
            return Ok(markup.clone());
        }

        let markup = match kind {
            IncludeKind::Template => self
                .loader
                .load_template(file)
                .with_context(|| format!("failed to include template `{file}`"))?,
            IncludeKind::Content => {
                let mut markup = String::new();
                for scope in [IncludeScope::Global, IncludeScope::Theme] {
                    match self.loader.load_include(file, scope) {
                        Ok(Some(text)) => markup.push_str(&text),
                        Ok(None) => {}
                        Err(err) => crate::log!("error"; "include `{file}` ({scope:?}): {err}"),
                    }
                }
                markup
            }
        };

        self.includes.write().insert(key, markup.clone());
        Ok(markup)
    }

    /// Compile `body` inside the main shell under `name`.
    pub fn compile_full(
        &self,
        name: &str,
        body: &str,
        mutator: Option<&dyn Fn(&str) -> String>,
    ) -> Result<()> {
        let mut shell = self.main_markup()?;
        if let Some(mutate) = mutator {
            shell = mutate(&shell);
        }
        let markup = shell.replacen(SUB_TEMPLATE_PLACEHOLDER, body, 1);
        let markup = self
            .resolve_includes(&markup)?
            .replacen(PAGE_HEAD_PLACEHOLDER, "", 1);
        self.add(name, markup)
    }

    fn add(&self, name: &str, markup: String) -> Result<()> {
        self.env
            .write()
            .add_template_owned(name.to_owned(), markup)
            .map_err(TemplateError::from)
            .with_context(|| format!("failed to compile `{name}`"))
    }

    fn is_compiled(&self, name: &str) -> bool {
        self.env.read().get_template(name).is_ok()
    }

    /// Compile a plain template once, resolving includes when asked.
    fn ensure_fragment(&self, file: &str, with_includes: bool) -> Result<()> {
        if self.is_compiled(file) {
            return Ok(());
        }
        let markup = self
            .loader
            .load_template(file)
            .with_context(|| format!("failed to load `{file}`"))?;
        let markup = if with_includes {
            self.resolve_includes(&markup)?
        } else {
            markup
        };
        self.add(file, markup)
    }

    /// Per-page template with its own head include. Never cached.
    pub fn page(&self, id: &str) -> Result<String> {
        let markup = self
            .loader
            .load_template(PAGE_TEMPLATE)
            .context("failed to load the page template")?;
        let head = format!("{{{{# {PAGE_HEAD_INCLUDE_PREFIX}{id}.html #}}}}");
        let mutator = |shell: &str| shell.replacen(PAGE_HEAD_PLACEHOLDER, &head, 1);

        let name = format!("{PAGE_TEMPLATE}#{id}");
        self.compile_full(&name, &markup, Some(&mutator))?;
        Ok(name)
    }

    /// Full-page template that needs no per-page head (archive, tags, search).
    pub fn standalone(&self, name: &'static str) -> Result<&'static str> {
        if !self.is_compiled(name) {
            let markup = self
                .loader
                .load_template(name)
                .with_context(|| format!("failed to load `{name}`"))?
                .replacen(PAGE_HEAD_PLACEHOLDER, "", 1);
            self.compile_full(name, &markup, None)?;
        }
        Ok(name)
    }

    /// Main shell rendering an already rendered `body`.
    pub fn body_shell(&self) -> Result<&'static str> {
        if !self.is_compiled(BODY_SHELL) {
            self.compile_full(BODY_SHELL, "{{ body }}", None)?;
        }
        Ok(BODY_SHELL)
    }

    /// `post.html` fragment.
    pub fn post(&self) -> Result<&'static str> {
        self.ensure_fragment(POST_TEMPLATE, true)?;
        Ok(POST_TEMPLATE)
    }

    /// `media.html` fragment.
    pub fn media(&self) -> Result<&'static str> {
        self.ensure_fragment(MEDIA_TEMPLATE, true)?;
        Ok(MEDIA_TEMPLATE)
    }

    /// `pager.html` fragment.
    pub fn pager(&self) -> Result<&'static str> {
        self.ensure_fragment(PAGER_TEMPLATE, false)?;
        Ok(PAGER_TEMPLATE)
    }

    /// `content-<directive>.html`, or `None` when the theme has no such template.
    pub fn content_directive(&self, directive: &str) -> Result<Option<String>> {
        let file = format!("content-{directive}.html");
        if self.is_compiled(&file) {
            return Ok(Some(file));
        }
        match self.loader.load_template(&file) {
            Ok(markup) => {
                let markup = self.resolve_includes(&markup)?;
                self.add(&file, markup)?;
                Ok(Some(file))
            }
            Err(TemplateError::NotFound(_)) => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to load `{file}`")),
        }
    }

    /// Render a compiled template.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String> {
        let env = self.env.read();
        let rendered = env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map_err(TemplateError::from)
            .with_context(|| format!("failed to render `{name}`"))?;
        Ok(rendered)
    }
}

// ============================================================================
// Tests
// ============================================================================
