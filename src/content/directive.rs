//! Directive resolution over Markdown bodies.
//!
//! | Syntax                              | Result                                   |
//! |-------------------------------------|------------------------------------------|
//! | `#Word`                             | `[#Word](/tags/word/)`                   |
//! | `[Text]({%tag%})`                   | `[Text](/tags/text/)`                    |
//! | `{%tag:Multi Word%}`                | `/tags/multi_word/`                      |
//! | `{%page:id%}`, `{%post:id%}`        | `/page/id.html`, `/post/id.html`         |
//! | `{%search:terms%}`                  | `/search.html?q=terms`                   |
//! | `{name(k=v):a.jpg, b.jpg}text{/}`   | `content-<name>.html` fragment           |
//! | `{media(k=v):a.jpg}`                | `media.html` fragment                    |
//! | `{embed:https://youtu.be/<code>}`   | `media.html` fragment with a player      |
//!
//! # Resolution
//!
//! ```text
//! body ──► link substitutions (plain Markdown)
//!      ──► wrap + media directives ─┐ explicit media first
//!      ──► embed directives ────────┤
//!                                   ▼
//!            fragment ──► token `:@@@:<uuid>:@@@:` in the Markdown
//!
//! markdown::render(markdown) ──► Replacements::restore ──► body HTML
//! ```
//!
//! Fragments are swapped for tokens before Markdown rendering so the
//! renderer never sees template output.

use super::{EntityKind, MediaHint, markdown};
use crate::{
    log,
    media::{self, EmbeddedMedia, MediaItem},
    template::TemplateCache,
    utils::slug::{normalize_tag_uri, search_uri, tag_uri},
};
use regex::{Captures, Regex};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::{collections::BTreeMap, path::Path, sync::LazyLock};
use uuid::Uuid;

// ============================================================================
// Patterns
// ============================================================================

const TOKEN_DELIMITER: &str = ":@@@:";
const WITH_MEDIA_DIRECTIVE: &str = "with-media";
const BARE_MEDIA_DIRECTIVE: &str = "{media}";

static RE_DIRECTIVE_SYNTAX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{.*\}").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static RE_HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\p{L}+[_-]*\p{L}*)").unwrap());
static RE_TAG_AUTO_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(\{%\s*tag\s*%\}\)").unwrap());
static RE_TAG_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*tag:([^%]+)%\}").unwrap());
static RE_CONTENT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*([\w-]+):([\w-]+)\s*%\}").unwrap());
static RE_SEARCH_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*search:([^%]+)%\}").unwrap());

static RE_WRAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([\w.-]+)(\([\s\w=,]+\))?(:\s*([\w\s.,*-]+))?\}([^{}]*)\{/\}").unwrap()
});
static RE_MEDIA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{media(\([\s\w=,]+\))?(:\s*([\w\s.,*-]+))?\}").unwrap()
});
static RE_EMBED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{embed:\s*([^}]+)\}").unwrap());

// ============================================================================
// Link Substitutions
// ============================================================================

/// Resolve tag, content and search links. Used for bodies and theme markup.
pub fn resolve_content_links(text: &str) -> String {
    let text = RE_TAG_LINK.replace_all(text, |caps: &Captures| tag_uri(caps[1].trim()));
    // `{%search:x%}` also fits the content link shape, so it goes first.
    let text = RE_SEARCH_LINK.replace_all(&text, |caps: &Captures| search_uri(&caps[1]));
    RE_CONTENT_LINK
        .replace_all(&text, |caps: &Captures| {
            EntityKind::from_name(&caps[1])
                .map(|kind| kind.uri(&caps[2]))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Hashtags and tag auto-links, then [`resolve_content_links`].
fn substitute_links(body: &str) -> String {
    let body = RE_HASHTAG.replace_all(body, |caps: &Captures| {
        format!("[#{}]({})", &caps[1], tag_uri(&caps[1]))
    });
    let body = RE_TAG_AUTO_LINK.replace_all(&body, |caps: &Captures| {
        format!("[{}](/tags/{}/)", &caps[1], normalize_tag_uri(&caps[1]))
    });
    resolve_content_links(&body)
}

/// Searchable text of a body: directive syntax removed, whitespace collapsed.
pub fn raw_body(body: &str) -> String {
    let stripped = RE_DIRECTIVE_SYNTAX.replace_all(body, "");
    RE_WHITESPACE.replace_all(&stripped, " ").trim().to_owned()
}

// ============================================================================
// Directive Records
// ============================================================================

type Props = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    /// `{name(props):files}text{/}`
    Wrap,
    /// `{media(props):files}`
    Media,
}

impl DirectiveKind {
    /// Matchers in resolution order.
    const ORDERED: [Self; 2] = [Self::Wrap, Self::Media];

    fn regex(self) -> &'static Regex {
        match self {
            Self::Wrap => &RE_WRAP,
            Self::Media => &RE_MEDIA,
        }
    }

    fn record(self, caps: &Captures) -> Directive {
        let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());
        let (name, props, files, text) = match self {
            Self::Wrap => (group(1), group(2), group(4), group(5)),
            Self::Media => ("media", group(1), group(3), ""),
        };
        Directive {
            kind: self,
            matched: group(0).to_owned(),
            name: name.to_owned(),
            props: parse_props(props),
            files: parse_files(files),
            text: text.trim().to_owned(),
        }
    }

    /// Every match in `content`, explicit-media directives first, then by
    /// matched text.
    fn collect(self, content: &str) -> Vec<Directive> {
        let mut found: Vec<Directive> = self
            .regex()
            .captures_iter(content)
            .map(|caps| self.record(&caps))
            .collect();
        found.sort_by(|a, b| {
            (!a.is_explicit(), &a.matched).cmp(&(!b.is_explicit(), &b.matched))
        });
        found
    }
}

#[derive(Debug, Clone)]
struct Directive {
    kind: DirectiveKind,
    matched: String,
    name: String,
    props: Props,
    /// Explicitly listed media files.
    files: Vec<String>,
    text: String,
}

impl Directive {
    #[inline]
    fn is_explicit(&self) -> bool {
        !self.files.is_empty()
    }
}

/// `(k=v, flag)` → `{k: v, flag: ""}`
fn parse_props(raw: &str) -> Props {
    raw.trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_owned(), value.trim().to_owned()))
        })
        .collect()
}

fn parse_files(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Where the feed takes this body's leading image from.
fn media_hint(body: &str) -> MediaHint {
    let first_file = |caps: Captures, group: usize| {
        caps.get(group)
            .and_then(|m| parse_files(m.as_str()).into_iter().next())
    };

    if let Some(file) = RE_MEDIA.captures_iter(body).find_map(|caps| first_file(caps, 3)) {
        return MediaHint::File(file);
    }
    let with_media = RE_WRAP
        .captures_iter(body)
        .filter(|caps| &caps[1] == WITH_MEDIA_DIRECTIVE)
        .find_map(|caps| first_file(caps, 4));
    if let Some(file) = with_media {
        return MediaHint::File(file);
    }
    if body.contains(BARE_MEDIA_DIRECTIVE) {
        return MediaHint::FirstImage;
    }
    MediaHint::None
}

// ============================================================================
// Replacement Tokens
// ============================================================================

/// Rendered fragments keyed by the token standing in for them.
#[derive(Debug, Default, Clone)]
pub struct Replacements(Vec<(String, String)>);

impl Replacements {
    /// Store `fragment` and return its token.
    fn insert(&mut self, fragment: String) -> String {
        let token = format!("{TOKEN_DELIMITER}{}{TOKEN_DELIMITER}", Uuid::new_v4());
        self.0.push((token.clone(), fragment));
        token
    }

    /// Replace every token in `html` once with its fragment.
    pub fn restore(&self, html: &str) -> String {
        self.0
            .iter()
            .fold(html.to_owned(), |out, (token, fragment)| out.replacen(token, fragment, 1))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// What the resolver needs to know about the entity being parsed.
pub struct DirectiveContext<'a> {
    pub kind: EntityKind,
    pub id: &'a str,
    /// `deploy/media/<kind>/<id>/`
    pub media_dir: &'a Path,
    pub thumb_sizes: &'a [u32],
    pub templates: &'a TemplateCache,
}

/// A body with every directive resolved.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Markdown with fragments replaced by tokens.
    pub markdown: String,
    pub raw_body: String,
    pub replacements: Replacements,
    pub media_hint: MediaHint,
}

impl Resolved {
    /// Render the Markdown and restore the fragments.
    pub fn render_html(&self) -> String {
        self.replacements.restore(&markdown::render(&self.markdown))
    }
}

#[derive(Debug, Default, Serialize)]
struct DirectiveData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    media: &'a [MediaItem],
    props: Option<&'a Props>,
    embedded_media: Option<&'a EmbeddedMedia>,
}

enum Outcome {
    Fragment(String),
    Remove,
    Keep,
}

/// Resolve all directives of `body` (front matter already removed).
pub fn resolve(body: &str, ctx: &DirectiveContext<'_>) -> Resolved {
    let raw_body = raw_body(body);
    let media_hint = media_hint(body);
    let mut content = substitute_links(body);
    let mut replacements = Replacements::default();

    let directives: Vec<Directive> = DirectiveKind::ORDERED
        .into_iter()
        .flat_map(|kind| kind.collect(&content))
        .collect();
    let claimed: FxHashSet<String> = directives
        .iter()
        .flat_map(|d| d.files.iter().cloned())
        .collect();

    for directive in &directives {
        let outcome = match directive.kind {
            DirectiveKind::Wrap => resolve_wrap(directive, &claimed, ctx),
            DirectiveKind::Media => resolve_media(directive, &claimed, ctx),
        };
        apply(&mut content, &directive.matched, outcome, &mut replacements);
    }

    let embeds: Vec<(String, String)> = RE_EMBED
        .captures_iter(&content)
        .map(|caps| (caps[0].to_owned(), caps[1].trim().to_owned()))
        .collect();
    for (matched, url) in embeds {
        let outcome = resolve_embed(&url, ctx);
        apply(&mut content, &matched, outcome, &mut replacements);
    }

    Resolved {
        markdown: content,
        raw_body,
        replacements,
        media_hint,
    }
}

fn apply(content: &mut String, matched: &str, outcome: Outcome, replacements: &mut Replacements) {
    match outcome {
        Outcome::Fragment(html) => {
            let token = replacements.insert(html);
            *content = content.replacen(matched, &token, 1);
        }
        Outcome::Remove => *content = content.replacen(matched, "", 1),
        Outcome::Keep => {}
    }
}

/// Explicit files, or every media file no directive claims.
fn media_items(
    directive: &Directive,
    claimed: &FxHashSet<String>,
    ctx: &DirectiveContext<'_>,
) -> Vec<MediaItem> {
    let names = if directive.is_explicit() {
        directive.files.clone()
    } else {
        media::list_all_media(ctx.media_dir, claimed).unwrap_or_else(|err| {
            log!("parse"; "{} {}: {err:#}", ctx.kind, ctx.id);
            Vec::new()
        })
    };
    media::parse_media_file_names(&names, ctx.kind, ctx.id, ctx.media_dir, ctx.thumb_sizes)
}

fn render(ctx: &DirectiveContext<'_>, template: &str, data: &DirectiveData<'_>) -> Outcome {
    match ctx.templates.render(template, data) {
        Ok(html) => Outcome::Fragment(html.trim().to_owned()),
        Err(err) => {
            log!("parse"; "{} {}: {err:#}", ctx.kind, ctx.id);
            Outcome::Remove
        }
    }
}

fn resolve_wrap(
    directive: &Directive,
    claimed: &FxHashSet<String>,
    ctx: &DirectiveContext<'_>,
) -> Outcome {
    let template = match ctx.templates.content_directive(&directive.name) {
        Ok(Some(template)) => template,
        Ok(None) => {
            log!("parse"; "{} {}: no template for directive `{}`", ctx.kind, ctx.id, directive.name);
            return Outcome::Keep;
        }
        Err(err) => {
            log!("parse"; "{} {}: {err:#}", ctx.kind, ctx.id);
            return Outcome::Remove;
        }
    };

    let text = markdown::render(&directive.text);
    let media = media_items(directive, claimed, ctx);
    let data = DirectiveData {
        text: Some(&text),
        media: &media,
        props: Some(&directive.props),
        embedded_media: None,
    };
    render(ctx, &template, &data)
}

fn resolve_media(
    directive: &Directive,
    claimed: &FxHashSet<String>,
    ctx: &DirectiveContext<'_>,
) -> Outcome {
    let media = media_items(directive, claimed, ctx);
    if media.is_empty() {
        return Outcome::Remove;
    }
    match ctx.templates.media() {
        Ok(template) => {
            let data = DirectiveData {
                media: &media,
                props: Some(&directive.props),
                ..Default::default()
            };
            render(ctx, template, &data)
        }
        Err(err) => {
            log!("parse"; "{} {}: {err:#}", ctx.kind, ctx.id);
            Outcome::Remove
        }
    }
}

fn resolve_embed(url: &str, ctx: &DirectiveContext<'_>) -> Outcome {
    let Some(embedded) = EmbeddedMedia::parse(url) else {
        return Outcome::Remove;
    };
    match ctx.templates.media() {
        Ok(template) => {
            let data = DirectiveData {
                embedded_media: Some(&embedded),
                ..Default::default()
            };
            render(ctx, template, &data)
        }
        Err(err) => {
            log!("parse"; "{} {}: {err:#}", ctx.kind, ctx.id);
            Outcome::Remove
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
