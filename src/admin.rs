//! Authoring endpoints of the dev server (`serve --admin`).
//!
//! ```text
//! POST   /admin-create?type=post&id=<id>      new source from a stub ─► 201, Location
//! GET    /admin-edit?type=post&id=<id>        raw markdown
//! POST   /admin-edit?type=post&id=<id>        replace markdown ─► rendered <main> content
//! POST   /admin-delete?type=post&id=<id>      source, html and media removed ─► 204
//! GET    /admin-media?type=post&id=<id>       media.html for the entity's media
//! POST   /admin-media?...&fileName=<name>     raw body stored as a media file ─► 201
//! DELETE /admin-media?...&fileName=<name>     file and its thumbnails removed
//! ```
//!
//! Every change runs under [`Site::exclusive`] and rebuilds with the entity
//! cache, the same way a watcher event does.

use crate::{
    build::Site,
    config::SiteConfig,
    content::EntityKind,
    log,
    media::{MediaItem, extension, is_image, is_video, list_all_media, parse_media_file_names, thumbs},
    utils::date::{fmt_date, fmt_time},
    watch::{remove_content_file, remove_media_dir},
};
use anyhow::{Context, Result};
use chrono::Local;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::{fs, io::Read, path::PathBuf};
use tiny_http::Method;

/// URL prefix shared by every authoring endpoint.
pub const ADMIN_PREFIX: &str = "/admin-";

/// Largest accepted request body.
const MAX_BODY_BYTES: u64 = 12 << 20;

const MAIN_OPEN: &str = "<main>";
const MAIN_CLOSE: &str = "</main>";

// ============================================================================
// Reply
// ============================================================================

/// Transport-independent response of an authoring endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl Reply {
    fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self { status, content_type, location: None, body: body.into() }
    }

    fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body.into())
    }

    fn html(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "text/html; charset=utf-8", body.into())
    }

    fn created(location: String) -> Self {
        Self { location: Some(location), ..Self::text(201, "") }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Parsed `type`, `id` and `fileName` query parameters.
struct Target {
    kind: EntityKind,
    id: String,
    file_name: Option<String>,
}

/// Route one authoring request. Failures become 4xx/5xx replies.
pub fn dispatch(site: &Site, config: &SiteConfig, method: &Method, url: &str, body: &mut dyn Read) -> Reply {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let Some(endpoint) = path.strip_prefix(ADMIN_PREFIX) else {
        return Reply::text(404, "not found");
    };
    let target = match parse_target(query) {
        Ok(target) => target,
        Err(reply) => return reply,
    };

    let _rebuild = site.exclusive();
    let result = match (endpoint, method) {
        ("create", Method::Post) => create(site, config, &target),
        ("edit", Method::Get) => read_source(config, &target),
        ("edit", Method::Post) => with_body(body, |bytes| edit(site, config, &target, bytes)),
        ("delete", Method::Post | Method::Delete) => delete(site, config, &target),
        ("media", Method::Get) => list_media(site, config, &target, 200),
        ("media", Method::Post) => with_body(body, |bytes| upload_media(site, config, &target, bytes)),
        ("media", Method::Delete) => delete_media(site, config, &target),
        ("create" | "edit" | "delete" | "media", _) => Ok(Reply::text(405, "method not allowed")),
        _ => Ok(Reply::text(404, "not found")),
    };

    result.unwrap_or_else(|err| {
        log!("admin"; "{method} {path} failed");
        log!("error"; "{err:#}");
        Reply::text(500, format!("{err:#}"))
    })
}

fn query_params(query: &str) -> FxHashMap<String, String> {
    query
        .split('&')
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| {
            let value = urlencoding::decode(value).map_or_else(|_| value.to_owned(), |v| v.into_owned());
            (key.to_owned(), value)
        })
        .collect()
}

/// File-name-safe identifier: no separators, no leading dot.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && name.trim() == name
}

fn parse_target(query: &str) -> Result<Target, Reply> {
    let mut params = query_params(query);
    let kind = params
        .get("type")
        .and_then(|t| EntityKind::from_name(t))
        .ok_or_else(|| Reply::text(400, "type must be page or post"))?;
    let id = params.remove("id").unwrap_or_default();
    if id.is_empty() {
        return Err(Reply::text(400, "ID is required"));
    }
    if !is_safe_name(&id) {
        return Err(Reply::text(400, format!("invalid ID `{id}`")));
    }
    let file_name = params.remove("fileName");
    if let Some(name) = &file_name
        && !is_safe_name(name)
    {
        return Err(Reply::text(400, format!("invalid file name `{name}`")));
    }
    Ok(Target { kind, id, file_name })
}

fn with_body(body: &mut dyn Read, handle: impl FnOnce(&[u8]) -> Result<Reply>) -> Result<Reply> {
    let mut bytes = Vec::new();
    body.take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut bytes)
        .context("failed to read request body")?;
    if bytes.len() as u64 > MAX_BODY_BYTES {
        return Ok(Reply::text(413, "request body too large"));
    }
    handle(&bytes)
}

// ============================================================================
// Sources
// ============================================================================

fn source_path(config: &SiteConfig, target: &Target) -> PathBuf {
    config.paths().source_file(target.kind, &target.id)
}

/// Markdown stub of a newly created entity.
fn stub_source(kind: EntityKind) -> String {
    let mut source = String::from("---\n");
    if kind == EntityKind::Post {
        let now = Local::now().naive_local();
        source.push_str(&format!("date: {}\n", fmt_date(now.date())));
        source.push_str(&format!("time: {}\n", fmt_time(now.time())));
    }
    source.push_str(&format!("title: New {kind} title\n---\n\nNew {kind} content\n\n{{media}}\n"));
    source
}

fn create(site: &Site, config: &SiteConfig, target: &Target) -> Result<Reply> {
    let path = source_path(config, target);
    if path.exists() {
        return Ok(Reply::text(409, "already exists"));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, stub_source(target.kind))
        .with_context(|| format!("failed to write {}", path.display()))?;
    log!("admin"; "created {} {}", target.kind, target.id);

    site.build(config, true)?;
    Ok(Reply::created(target.kind.uri(&target.id)))
}

fn read_source(config: &SiteConfig, target: &Target) -> Result<Reply> {
    let path = source_path(config, target);
    if !path.is_file() {
        return Ok(not_found(target));
    }
    let source = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Reply::new(200, "text/markdown; charset=utf-8", source))
}

fn edit(site: &Site, config: &SiteConfig, target: &Target, markdown: &[u8]) -> Result<Reply> {
    let path = source_path(config, target);
    if !path.is_file() {
        return Ok(not_found(target));
    }
    fs::write(&path, markdown).with_context(|| format!("failed to write {}", path.display()))?;
    site.cache().invalidate(target.kind, &format!("{}.md", target.id));
    log!("admin"; "edited {} {}", target.kind, target.id);

    site.build(config, true)?;

    let deployed = deployed_file(config, target);
    let html = fs::read_to_string(&deployed)
        .with_context(|| format!("failed to read {}", deployed.display()))?;
    Ok(Reply::html(200, main_content(&html)))
}

fn delete(site: &Site, config: &SiteConfig, target: &Target) -> Result<Reply> {
    let path = source_path(config, target);
    if !path.is_file() {
        return Ok(not_found(target));
    }
    fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
    site.cache().invalidate(target.kind, &format!("{}.md", target.id));
    log!("admin"; "deleted {} {}", target.kind, target.id);

    site.build(config, true)?;
    remove_content_file(config, target.kind, &target.id)?;
    remove_media_dir(config, target.kind, &target.id)?;
    Ok(Reply::text(204, ""))
}

/// `deploy/<kind>/<id>.html`, or `deploy/index.html` for the home page.
fn deployed_file(config: &SiteConfig, target: &Target) -> PathBuf {
    let deploy = config.paths().deploy_dir();
    let home = config.site.home_page.trim();
    if target.kind == EntityKind::Page && !home.is_empty() && home == target.id {
        return deploy.join("index.html");
    }
    deploy.join(target.kind.as_str()).join(format!("{}.html", target.id))
}

/// Inner markup of the first `<main>`, or the whole document.
fn main_content(html: &str) -> &str {
    let Some(start) = html.find(MAIN_OPEN).map(|idx| idx + MAIN_OPEN.len()) else {
        return html;
    };
    match html[start..].find(MAIN_CLOSE) {
        Some(len) => &html[start..start + len],
        None => &html[start..],
    }
}

fn not_found(target: &Target) -> Reply {
    Reply::text(404, format!("Not found: {}/{}", target.kind, target.id))
}

// ============================================================================
// Media
// ============================================================================

#[derive(Serialize)]
struct MediaList<'a> {
    media: &'a [MediaItem],
}

fn list_media(site: &Site, config: &SiteConfig, target: &Target, status: u16) -> Result<Reply> {
    let dir = config.paths().media_dir(target.kind, &target.id);
    let names = list_all_media(&dir, &FxHashSet::default())?;
    if names.is_empty() {
        return Ok(Reply::html(status, ""));
    }

    let media = parse_media_file_names(
        &names,
        target.kind,
        &target.id,
        &dir,
        &config.build.media.thumb_sizes,
    );
    let templates = site.templates();
    let html = templates.render(templates.media()?, MediaList { media: &media })?;
    Ok(Reply::html(status, html))
}

fn file_name_of(target: &Target) -> Result<&str, Reply> {
    target
        .file_name
        .as_deref()
        .ok_or_else(|| Reply::text(400, "fileName is required"))
}

fn upload_media(site: &Site, config: &SiteConfig, target: &Target, bytes: &[u8]) -> Result<Reply> {
    let name = match file_name_of(target) {
        Ok(name) => name,
        Err(reply) => return Ok(reply),
    };
    if !is_image(name) && !is_video(name) {
        return Ok(Reply::text(422, format!("Skipped (file type not supported): {name}")));
    }

    let dir = config.paths().media_dir(target.kind, &target.id);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(name);
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    log!("admin"; "uploaded {name} to {} {}", target.kind, target.id);

    let media = &config.build.media;
    let resizable = extension(name).is_some_and(|ext| crate::media::THUMBNAIL_SOURCE_EXTENSIONS.contains(&ext.as_str()));
    if media.resize_originals && media.max_image_size > 0 && resizable {
        thumbs::resize_original(&path, media, false)?;
    }

    regenerate(site, config, target)?;
    list_media(site, config, target, 201)
}

fn delete_media(site: &Site, config: &SiteConfig, target: &Target) -> Result<Reply> {
    let name = match file_name_of(target) {
        Ok(name) => name,
        Err(reply) => return Ok(reply),
    };
    let dir = config.paths().media_dir(target.kind, &target.id);
    let path = dir.join(name);
    if !path.is_file() {
        return Ok(Reply::text(404, format!("Not found: {name}")));
    }

    fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
    thumbs::delete_thumbnails_of(&dir, name)?;
    log!("admin"; "deleted {name} of {} {}", target.kind, target.id);
    if list_all_media(&dir, &FxHashSet::default())?.is_empty() {
        fs::remove_dir_all(&dir).with_context(|| format!("failed to remove {}", dir.display()))?;
    }

    regenerate(site, config, target)?;
    list_media(site, config, target, 200)
}

/// Re-parse the owning entity, if it has a source, so thumbnails and
/// `{media}` output follow the media directory.
fn regenerate(site: &Site, config: &SiteConfig, target: &Target) -> Result<()> {
    if !source_path(config, target).is_file() {
        return Ok(());
    }
    site.cache().invalidate(target.kind, &format!("{}.md", target.id));
    site.build(config, true)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let templates = root.join("theme/templates");
        fs::create_dir_all(&templates).unwrap();
        for (name, body) in [
            ("main.html", "<title>{{ title }}</title><main>{{@ sub-template @}}</main>"),
            ("page.html", "<section>{{ content.body }}</section>"),
            ("post.html", "<article>{{ content.body }}</article>"),
            ("pager.html", ""),
            ("media.html", "{% for m in media %}[{{ m.uri }}]{% endfor %}"),
        ] {
            fs::write(templates.join(name), body).unwrap();
        }
        fs::create_dir_all(root.join("pages")).unwrap();
        fs::create_dir_all(root.join("posts")).unwrap();

        let mut config = SiteConfig::from_str("[site]\ntheme = \"theme\"").unwrap();
        config.set_root(root);
        config.build.enable_search = false;
        config.build.generate_archive = false;
        config.build.generate_tag_index = false;
        config.build.generate_feeds.clear();
        config.build.media.use_thumbs = false;
        (dir, config)
    }

    impl Reply {
        fn body_text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    fn call(site: &Site, config: &SiteConfig, method: Method, url: &str, body: &str) -> Reply {
        dispatch(site, config, &method, url, &mut body.as_bytes())
    }

    #[test]
    fn test_query_params() {
        let params = query_params("type=post&id=2024-05-01%20ride&flag");
        assert_eq!(params["type"], "post");
        assert_eq!(params["id"], "2024-05-01 ride");
        assert_eq!(params["flag"], "");
    }

    #[test]
    fn test_rejects_bad_targets() {
        let (_dir, config) = fixture();
        let site = Site::new(&config);

        let reply = call(&site, &config, Method::Post, "/admin-create?type=post", "");
        assert_eq!((reply.status, reply.body_text().as_str()), (400, "ID is required"));
        assert_eq!(call(&site, &config, Method::Post, "/admin-create?type=draft&id=a", "").status, 400);
        assert_eq!(call(&site, &config, Method::Post, "/admin-create?type=post&id=..%2Fx", "").status, 400);
        assert_eq!(call(&site, &config, Method::Post, "/admin-create?type=post&id=.hidden", "").status, 400);
        assert_eq!(call(&site, &config, Method::Put, "/admin-edit?type=post&id=a", "").status, 405);
        assert_eq!(call(&site, &config, Method::Get, "/admin-other?type=post&id=a", "").status, 404);
    }

    #[test]
    fn test_create_writes_stub_and_builds() {
        let (dir, config) = fixture();
        let site = Site::new(&config);

        let reply = call(&site, &config, Method::Post, "/admin-create?type=post&id=ride", "");
        assert_eq!(reply.status, 201);
        assert_eq!(reply.location.as_deref(), Some("/post/ride.html"));

        let source = fs::read_to_string(dir.path().join("posts/ride.md")).unwrap();
        assert!(source.starts_with("---\ndate: "));
        assert!(source.contains("title: New post title\n---\n"));
        assert!(dir.path().join("deploy/post/ride.html").is_file());

        let again = call(&site, &config, Method::Post, "/admin-create?type=post&id=ride", "");
        assert_eq!(again.status, 409);
    }

    #[test]
    fn test_page_stub_has_no_date() {
        let stub = stub_source(EntityKind::Page);
        assert!(stub.starts_with("---\ntitle: New page title\n---\n"));
        assert!(stub.ends_with("{media}\n"));
    }

    #[test]
    fn test_edit_roundtrip_renders_main() {
        let (dir, config) = fixture();
        let site = Site::new(&config);
        fs::write(dir.path().join("pages/about.md"), "Old text.").unwrap();
        site.build(&config, true).unwrap();

        let reply = call(&site, &config, Method::Get, "/admin-edit?type=page&id=about", "");
        assert_eq!((reply.status, reply.body_text().as_str()), (200, "Old text."));

        let reply = call(&site, &config, Method::Post, "/admin-edit?type=page&id=about", "New *text*.");
        assert_eq!(reply.status, 200);
        let main = reply.body_text();
        assert!(main.starts_with("<section><p>New <em>text</em>.</p>"), "{main}");
        assert!(!main.contains("<title>"));
        assert_eq!(fs::read_to_string(dir.path().join("pages/about.md")).unwrap(), "New *text*.");

        let missing = call(&site, &config, Method::Get, "/admin-edit?type=page&id=none", "");
        assert_eq!((missing.status, missing.body_text().as_str()), (404, "Not found: page/none"));
    }

    #[test]
    fn test_delete_removes_source_output_and_media() {
        let (dir, config) = fixture();
        let root = dir.path();
        let site = Site::new(&config);
        fs::write(root.join("posts/ride.md"), "Out and back.").unwrap();
        fs::create_dir_all(root.join("deploy/media/post/ride")).unwrap();
        fs::write(root.join("deploy/media/post/ride/a.jpg"), "x").unwrap();
        site.build(&config, true).unwrap();
        assert!(root.join("deploy/post/ride.html").is_file());

        let reply = call(&site, &config, Method::Post, "/admin-delete?type=post&id=ride", "");
        assert_eq!(reply.status, 204);
        assert!(!root.join("posts/ride.md").exists());
        assert!(!root.join("deploy/post/ride.html").exists());
        assert!(!root.join("deploy/media/post/ride").exists());
        assert_eq!(site.cache().len(), 0);

        let again = call(&site, &config, Method::Post, "/admin-delete?type=post&id=ride", "");
        assert_eq!(again.status, 404);
    }

    #[test]
    fn test_media_upload_list_and_delete() {
        let (dir, config) = fixture();
        let root = dir.path();
        let site = Site::new(&config);
        fs::write(root.join("posts/ride.md"), "Out and back.").unwrap();

        let base = "/admin-media?type=post&id=ride";
        let reply = call(&site, &config, Method::Post, &format!("{base}&fileName=notes.txt"), "x");
        assert_eq!(reply.status, 422);

        let reply = call(&site, &config, Method::Post, &format!("{base}&fileName=clip.mp4"), "video");
        assert_eq!(reply.status, 201);
        assert_eq!(reply.body_text(), "[/media/post/ride/clip.mp4]");
        assert!(root.join("deploy/post/ride.html").is_file());

        let media_dir = root.join("deploy/media/post/ride");
        fs::write(media_dir.join("b.gif"), "x").unwrap();
        let reply = call(&site, &config, Method::Get, base, "");
        assert_eq!(reply.body_text(), "[/media/post/ride/clip.mp4][/media/post/ride/b.gif]");

        let reply = call(&site, &config, Method::Delete, &format!("{base}&fileName=clip.mp4"), "");
        assert_eq!((reply.status, reply.body_text().as_str()), (200, "[/media/post/ride/b.gif]"));

        call(&site, &config, Method::Delete, &format!("{base}&fileName=b.gif"), "");
        assert!(!media_dir.exists());

        let reply = call(&site, &config, Method::Delete, &format!("{base}&fileName=b.gif"), "");
        assert_eq!(reply.status, 404);
        assert_eq!(call(&site, &config, Method::Delete, base, "").status, 400);
    }

    #[test]
    fn test_main_content() {
        assert_eq!(main_content("<h1>x</h1><main><p>y</p></main>"), "<p>y</p>");
        assert_eq!(main_content("<p>no main</p>"), "<p>no main</p>");
        assert_eq!(main_content("<main>open"), "open");
    }

    #[test]
    fn test_deployed_file_for_home_page() {
        let (_dir, mut config) = fixture();
        config.site.home_page = "about".into();
        let deploy = config.paths().deploy_dir();
        let target = |kind, id: &str| Target { kind, id: id.into(), file_name: None };

        assert_eq!(deployed_file(&config, &target(EntityKind::Page, "about")), deploy.join("index.html"));
        assert_eq!(
            deployed_file(&config, &target(EntityKind::Post, "about")),
            deploy.join(Path::new("post/about.html"))
        );
    }
}
