//! Development server with live reload support.
//!
//! This module provides a lightweight HTTP server for local development,
//! built on `tiny_http` with the following features:
//!
//! - Static file serving from `deploy/`
//! - Automatic `index.html` resolution for directories
//! - Redirect of extension-less paths to their trailing-slash form
//! - Live-reload script injection into HTML responses (watch mode)
//! - Authoring endpoints and their script (`--admin`, see [`crate::admin`])
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │   Main Thread   │   │ Watcher Threads  │   │   Reload Hub     │
//! │  (HTTP Server)  │   │ (pages, posts,   │──▶│ (WebSocket on    │
//! │                 │   │  media, site)    │   │  reload_port)    │
//! └────────┬────────┘   └────────┬─────────┘   └────────┬─────────┘
//!          │                     │                      │
//!          ▼                     ▼                      ▼
//!    serve deploy/         rebuild deploy/        push {type,id,op}
//! ```

use crate::{
    admin::{self, ADMIN_PREFIX, Reply},
    build::Site,
    config::cfg,
    log,
    reload::ReloadHub,
    watch::spawn_watchers,
};
use anyhow::{Context, Result, anyhow, bail};
use std::{
    borrow::Cow,
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

// ============================================================================
// Constants
// ============================================================================

/// Reload client, `__RELOAD_PORT__` is replaced at startup.
const WATCH_RELOAD_JS: &str = include_str!("embed/watch-reload.js");
const RELOAD_PORT_PLACEHOLDER: &str = "__RELOAD_PORT__";
const BODY_CLOSING_TAG: &str = "</body>";

/// Authoring toolbar injected with `--admin`.
const ADMIN_JS: &str = include_str!("embed/admin.js");

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Start the development server with optional file watching.
///
/// This function:
/// 1. Binds to the configured interface and port (with auto-retry on port conflict)
/// 2. Sets up Ctrl+C handler for graceful shutdown
/// 3. Starts the reload socket and watcher threads (if enabled)
/// 4. Enters the main request handling loop
///
/// The server blocks until Ctrl+C is received.
pub fn serve_site(site: Arc<Site>) -> Result<()> {
    let c = cfg();
    let interface: IpAddr = c
        .serve
        .interface
        .parse()
        .with_context(|| format!("invalid [serve.interface]: {}", c.serve.interface))?;

    let (server, addr) = try_bind_port(interface, c.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    // Set up Ctrl+C handler for graceful shutdown
    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut script = String::new();
    if c.serve.watch {
        let hub = ReloadHub::new();
        let ws_addr = hub.start(SocketAddr::new(interface, c.serve.reload_port))?;
        spawn_watchers(Arc::clone(&site), hub)?;
        script.push_str(&reload_script(ws_addr.port()));
    }
    if c.serve.admin {
        script.push_str(&format!("<script>{ADMIN_JS}</script>"));
        log!("serve"; "authoring endpoints enabled");
    }
    let script = (!script.is_empty()).then_some(script);

    log!("serve"; "http://{}", addr);

    let deploy = c.paths().deploy_dir();
    for request in server.incoming_requests() {
        let result = if c.serve.admin && request.url().starts_with(ADMIN_PREFIX) {
            handle_admin(request, &site)
        } else {
            handle_request(request, &deploy, script.as_deref())
        };
        if let Err(e) = result {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    let last_port = base_port.saturating_add(max_retries.saturating_sub(1));
    match last_error {
        Some(e) => bail!(
            "Failed to bind after {} attempts (ports {}-{}): {}",
            max_retries,
            base_port,
            last_port,
            e
        ),
        None => bail!("no port to bind"),
    }
}

fn reload_script(port: u16) -> String {
    format!(
        "<script>{}</script>",
        WATCH_RELOAD_JS.replace(RELOAD_PORT_PLACEHOLDER, &port.to_string())
    )
}

// ============================================================================
// Request Handling
// ============================================================================

/// Where a request URL leads inside the deploy directory.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    File(PathBuf),
    Redirect(String),
    NotFound,
}

/// Resolve a request URL.
///
/// Resolution order:
/// 1. Extension-less path without trailing slash → redirect to `<path>/`
/// 2. Directory → its `index.html`
/// 3. Exact file match
/// 4. Nothing found → 404
fn resolve(deploy: &Path, url: &str) -> Target {
    // Strip query string (e.g., ?t=123456) before resolving path
    let (raw_path, query) = url.split_once('?').unwrap_or((url, ""));
    let url_path = urlencoding::decode(raw_path).unwrap_or(Cow::Borrowed(raw_path));

    let last_segment = url_path.rsplit('/').next().unwrap_or_default();
    if !url_path.ends_with('/') && !last_segment.contains('.') {
        let location = if query.is_empty() {
            format!("{raw_path}/")
        } else {
            format!("{raw_path}/?{query}")
        };
        return Target::Redirect(location);
    }

    let rel = Path::new(url_path.trim_start_matches('/'));
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Target::NotFound;
    }

    let mut local = deploy.join(rel);
    if local.is_dir() {
        local = local.join("index.html");
    }
    if local.is_file() {
        Target::File(local)
    } else {
        Target::NotFound
    }
}

fn handle_request(request: Request, deploy: &Path, script: Option<&str>) -> Result<()> {
    match resolve(deploy, request.url()) {
        Target::File(path) => serve_file(request, &path, script),
        Target::Redirect(location) => serve_redirect(request, &location),
        Target::NotFound => serve_not_found(request),
    }
}

fn handle_admin(mut request: Request, site: &Site) -> Result<()> {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let reply = admin::dispatch(site, &cfg(), &method, &url, request.as_reader());
    log!("admin"; "{method} {url} -> {}", reply.status);
    request.respond(admin_response(reply)?)?;
    Ok(())
}

/// Insert `script` before the last `</body>`, or append it.
fn inject_script(html: &str, script: &str) -> String {
    match html.rfind(BODY_CLOSING_TAG) {
        Some(idx) => format!("{}{script}{}", &html[..idx], &html[idx..]),
        None => format!("{html}{script}"),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("invalid header {name}: {value}"))
}

/// Serve a file with appropriate content type, injecting the reload script into HTML.
fn serve_file(request: Request, path: &Path, script: Option<&str>) -> Result<()> {
    let mut content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(path);

    if let Some(script) = script
        && content_type.starts_with("text/html")
    {
        content = inject_script(&String::from_utf8_lossy(&content), script).into_bytes();
    }

    let response = Response::from_data(content)
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-store")?);

    request.respond(response)?;
    Ok(())
}

fn admin_response(reply: Reply) -> Result<Response<Cursor<Vec<u8>>>> {
    let mut response = Response::from_data(reply.body)
        .with_status_code(StatusCode(reply.status))
        .with_header(header("Content-Type", reply.content_type)?)
        .with_header(header("Cache-Control", "no-store")?);
    if let Some(location) = &reply.location {
        response = response.with_header(header("Location", location)?);
    }
    Ok(response)
}

fn serve_redirect(request: Request, location: &str) -> Result<()> {
    let response = Response::empty(StatusCode(302)).with_header(header("Location", location)?);
    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let body = "404 Not Found";
    let response = Response::new(
        StatusCode(404),
        vec![header("Content-Type", "text/plain")?],
        Cursor::new(body),
        Some(body.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Video
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn deploy() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("tags/gravel")).unwrap();
        fs::create_dir_all(dir.path().join("post")).unwrap();
        fs::write(dir.path().join("index.html"), "<body>home</body>").unwrap();
        fs::write(dir.path().join("tags/gravel/index.html"), "gravel").unwrap();
        fs::write(dir.path().join("post/2024-05-01-ride.html"), "ride").unwrap();
        dir
    }

    #[test]
    fn test_resolve_directories_and_files() {
        let dir = deploy();
        let root = dir.path();

        assert_eq!(resolve(root, "/"), Target::File(root.join("index.html")));
        assert_eq!(resolve(root, "/tags/gravel/"), Target::File(root.join("tags/gravel/index.html")));
        assert_eq!(
            resolve(root, "/post/2024-05-01-ride.html?t=1"),
            Target::File(root.join("post/2024-05-01-ride.html"))
        );
        assert_eq!(resolve(root, "/post/missing.html"), Target::NotFound);
    }

    #[test]
    fn test_resolve_redirects_extensionless_paths() {
        let dir = deploy();
        assert_eq!(resolve(dir.path(), "/tags/gravel"), Target::Redirect("/tags/gravel/".into()));
        assert_eq!(resolve(dir.path(), "/archive?x=1"), Target::Redirect("/archive/?x=1".into()));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = deploy();
        assert_eq!(resolve(dir.path(), "/../secret.txt"), Target::NotFound);
        assert_eq!(resolve(dir.path(), "/post/%2e%2e/%2e%2e/x.txt"), Target::NotFound);
    }

    #[test]
    fn test_inject_script() {
        assert_eq!(inject_script("<body>x</body>", "<s/>"), "<body>x<s/></body>");
        assert_eq!(inject_script("<p>no body</p>", "<s/>"), "<p>no body</p><s/>");
    }

    #[test]
    fn test_reload_script_port() {
        let script = reload_script(9001);
        assert!(script.starts_with("<script>"));
        assert!(script.contains(":9001/--ws--"));
        assert!(!script.contains(RELOAD_PORT_PLACEHOLDER));
    }

    #[test]
    fn test_admin_response_headers() {
        let reply = Reply {
            status: 201,
            content_type: "text/plain; charset=utf-8",
            location: Some("/post/ride.html".into()),
            body: Vec::new(),
        };
        let response = admin_response(reply).unwrap();
        assert_eq!(response.status_code(), StatusCode(201));
        let location = response.headers().iter().find(|h| h.field.equiv("Location")).unwrap();
        assert_eq!(location.value.as_str(), "/post/ride.html");
    }

    #[test]
    fn test_admin_script_is_embedded() {
        assert!(ADMIN_JS.contains("/admin-"));
        assert!(ADMIN_JS.contains("fileName"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(guess_content_type(Path::new("a.HTML")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(guess_content_type(Path::new("a.bin")), "application/octet-stream");
    }
}
