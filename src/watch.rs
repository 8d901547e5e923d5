//! File system watcher for live reload.
//!
//! One watcher thread per root turns raw notify events into typed
//! [`DirWatchEvent`]s, batches them and hands them to a shared controller
//! that rebuilds through [`Site`] and pushes a [`ReloadMessage`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                      Event Loop (per root)                            │
//! │                                                                       │
//! │  ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐          │
//! │  │ notify   │──▶│ classify │──▶│ Correlator │──▶│ Debouncer│──┐       │
//! │  │ events   │   │          │   │  (500ms)   │   │ (200ms)  │  │       │
//! │  └──────────┘   └──────────┘   └────────────┘   └──────────┘  │       │
//! └───────────────────────────────────────────────────────────────┼───────┘
//!                                                                 ▼
//!                        Controller (one rebuild at a time)
//!                 ┌───────────────┬──────────────┬─────────────┐
//!                 │ pages / posts │ deploy/media │ config/theme│
//!                 │ invalidate    │ thumbnails   │ reset       │
//!                 │ clean up      │ invalidate   │ full build  │
//!                 │ build, push   │ build, push  │             │
//!                 └───────────────┴──────────────┴─────────────┘
//! ```
//!
//! # Renames
//!
//! notify reports a rename with both paths when the platform correlates them
//! (`Modify(Name(Both))`). Otherwise a delete followed within 500 ms by a
//! create in the same directory is taken as a rename. When that pairing is
//! missed the change is handled as a delete plus a create.

use crate::{
    build::Site,
    config::{SiteConfig, cfg, reload_config},
    content::{EntityKind, entity_id},
    log,
    media::{is_thumbnail, thumbs},
    reload::{ReloadHub, ReloadMessage},
    template::IncludeScope,
    utils::category::{FileCategory, categorize_path, media_entry},
};
use anyhow::{Context, Result, bail};
use notify::{
    Event, EventKind, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use serde::Serialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 200;
const RENAME_WINDOW_MS: u64 = 500;
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Events
// =============================================================================

/// Kind of change to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchOp {
    Create,
    Update,
    Rename,
    Delete,
}

impl fmt::Display for WatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Rename => "rename",
            Self::Delete => "delete",
        })
    }
}

/// A classified change. Only a rename carries `original_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirWatchEvent {
    pub path: PathBuf,
    pub original_path: Option<PathBuf>,
    pub op: WatchOp,
}

impl DirWatchEvent {
    pub fn new(path: impl Into<PathBuf>, op: WatchOp) -> Self {
        Self { path: path.into(), original_path: None, op }
    }

    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            path: to.into(),
            original_path: Some(from.into()),
            op: WatchOp::Rename,
        }
    }
}

/// Translate a notify event into zero or more classified events.
pub fn classify(event: &Event) -> Vec<DirWatchEvent> {
    let each = |op: WatchOp| -> Vec<DirWatchEvent> {
        event
            .paths
            .iter()
            .map(|path| DirWatchEvent::new(path, op))
            .collect()
    };

    match event.kind {
        EventKind::Create(_) => each(WatchOp::Create),
        EventKind::Remove(_) => each(WatchOp::Delete),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![DirWatchEvent::rename(from, to)],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(WatchOp::Delete),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(WatchOp::Create),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                let op = if path.exists() { WatchOp::Create } else { WatchOp::Delete };
                DirWatchEvent::new(path, op)
            })
            .collect(),
        EventKind::Modify(_) => each(WatchOp::Update),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Check if path is a temp/backup file (editor artifacts) or a generated thumbnail.
fn is_ignored(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || is_thumbnail(name)
}

/// Drop ignored paths. A rename with one ignored side keeps the other side:
/// `tmp → file` is an atomic save, `file → file~` a backup move.
fn skip_ignored(event: DirWatchEvent) -> Option<DirWatchEvent> {
    let DirWatchEvent { path, original_path, op } = event;
    let path_ignored = is_ignored(&path);
    match original_path {
        Some(original) if is_ignored(&original) => {
            (!path_ignored).then(|| DirWatchEvent::new(path, WatchOp::Update))
        }
        Some(original) if path_ignored => Some(DirWatchEvent::new(original, WatchOp::Delete)),
        _ if path_ignored => None,
        original_path => Some(DirWatchEvent { path, original_path, op }),
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("md")
}

/// Narrow an event in a source directory to markdown files.
///
/// `notes.txt → notes.md` is a create, `notes.md → notes.txt` a delete.
fn markdown_only(event: DirWatchEvent) -> Option<DirWatchEvent> {
    let DirWatchEvent { path, original_path, op } = event;
    let current = is_markdown(&path);
    match original_path {
        Some(original) => match (is_markdown(&original), current) {
            (true, true) => Some(DirWatchEvent::rename(original, path)),
            (true, false) => Some(DirWatchEvent::new(original, WatchOp::Delete)),
            (false, true) => Some(DirWatchEvent::new(path, WatchOp::Create)),
            (false, false) => None,
        },
        None => current.then(|| DirWatchEvent::new(path, op)),
    }
}

// =============================================================================
// Rename Correlation
// =============================================================================

/// Pairs a delete with a following same-directory create into a rename.
///
/// Deletes are held back for the correlation window. A create of the very
/// same path within the window is a replacement and becomes an update.
pub struct RenameCorrelator {
    window: Duration,
    pending: Vec<(DirWatchEvent, Instant)>,
}

impl RenameCorrelator {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: Vec::new() }
    }

    /// Feed one event. Returns the events ready for handling, in order.
    pub fn push(&mut self, event: DirWatchEvent, now: Instant) -> Vec<DirWatchEvent> {
        let mut ready = self.expire(now);
        match event.op {
            WatchOp::Delete => self.pending.push((event, now)),
            WatchOp::Create => ready.push(self.pair(event)),
            _ => ready.push(event),
        }
        ready
    }

    fn pair(&mut self, created: DirWatchEvent) -> DirWatchEvent {
        let sibling = self
            .pending
            .iter()
            .position(|(deleted, _)| deleted.path == created.path)
            .or_else(|| {
                self.pending
                    .iter()
                    .position(|(deleted, _)| deleted.path.parent() == created.path.parent())
            });

        match sibling {
            Some(idx) => {
                let (deleted, _) = self.pending.remove(idx);
                if deleted.path == created.path {
                    DirWatchEvent::new(created.path, WatchOp::Update)
                } else {
                    DirWatchEvent::rename(deleted.path, created.path)
                }
            }
            None => created,
        }
    }

    /// Release deletes whose window has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<DirWatchEvent> {
        let window = self.window;
        let (expired, kept) = self
            .pending
            .drain(..)
            .partition::<Vec<_>, _>(|(_, at)| now.duration_since(*at) >= window);
        self.pending = kept;
        expired.into_iter().map(|(event, _)| event).collect()
    }

    /// Time until the oldest held delete expires.
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        self.pending
            .iter()
            .map(|(_, at)| (*at + self.window).saturating_duration_since(now))
            .min()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid events per path until the root goes quiet.
#[derive(Default)]
struct Debouncer {
    pending: Vec<DirWatchEvent>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn add(&mut self, event: DirWatchEvent, now: Instant) {
        self.last_event = Some(now);
        let Some(existing) = self.pending.iter_mut().find(|e| e.path == event.path) else {
            self.pending.push(event);
            return;
        };

        match (existing.op, event.op) {
            (WatchOp::Create | WatchOp::Rename, WatchOp::Update) => {}
            (WatchOp::Delete, WatchOp::Create | WatchOp::Update) => existing.op = WatchOp::Update,
            _ => *existing = event,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| now.duration_since(t) >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<DirWatchEvent> {
        self.last_event = None;
        std::mem::take(&mut self.pending)
    }

    fn timeout(&self, now: Instant) -> Option<Duration> {
        if self.pending.is_empty() {
            return None;
        }
        let elapsed = self.last_event.map_or(Duration::ZERO, |t| now.duration_since(t));
        Some(Duration::from_millis(DEBOUNCE_MS).saturating_sub(elapsed))
    }
}

// =============================================================================
// Controller
// =============================================================================

/// What a watcher thread observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchRoot {
    Source(EntityKind),
    Media,
    Site,
}

impl fmt::Display for WatchRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(kind) => write!(f, "{kind}s"),
            Self::Media => f.write_str("media"),
            Self::Site => f.write_str("site"),
        }
    }
}

/// Applies classified events. Rebuilds never overlap.
struct Controller {
    site: Arc<Site>,
    hub: Arc<ReloadHub>,
}

impl Controller {
    fn handle(&self, root: WatchRoot, event: DirWatchEvent) {
        let _rebuild = self.site.exclusive();
        let trigger = event.path.display().to_string();
        let result = match root {
            WatchRoot::Source(kind) => self.on_source(kind, event),
            WatchRoot::Media => self.on_media(event),
            WatchRoot::Site => self.on_site(event),
        };
        if let Err(err) = result {
            log_build_error(&trigger, &err);
        }
    }

    /// Markdown source created, changed, renamed or deleted.
    fn on_source(&self, kind: EntityKind, event: DirWatchEvent) -> Result<()> {
        let Some(event) = markdown_only(event) else {
            return Ok(());
        };
        let Some(file) = file_name(&event.path) else {
            return Ok(());
        };
        let original = event.original_path.as_deref().and_then(file_name);
        log!("watch"; "{kind} {file}: {}", event.op);

        let config = cfg();
        let cache = self.site.cache();
        cache.invalidate(kind, file);
        if let Some(original) = original {
            cache.invalidate(kind, original);
        }

        let id = entity_id(file);
        match (event.op, original) {
            (WatchOp::Delete, _) => {
                remove_content_file(&config, kind, id)?;
                remove_media_dir(&config, kind, id)?;
            }
            (WatchOp::Rename, Some(original)) => {
                let old_id = entity_id(original);
                remove_content_file(&config, kind, old_id)?;
                rename_media_dir(&config, kind, old_id, id)?;
            }
            _ => {}
        }

        self.site.build(&config, true)?;

        let reported = match (event.op, original) {
            (WatchOp::Rename, Some(original)) => entity_id(original),
            _ => id,
        };
        self.hub.broadcast(&ReloadMessage::new(kind, reported, event.op));
        Ok(())
    }

    /// Media file uploaded, replaced or removed under `deploy/media/`.
    fn on_media(&self, event: DirWatchEvent) -> Result<()> {
        let config = cfg();
        let Some((kind, id, file)) = media_entry(&event.path, &config) else {
            return Ok(());
        };
        let paths = config.paths();
        let media_dir = paths.media_dir(kind, &id);

        let removed = match event.op {
            WatchOp::Delete => Some(file),
            WatchOp::Rename => event
                .original_path
                .as_deref()
                .and_then(|p| media_entry(p, &config))
                .map(|(_, _, original)| original),
            _ => None,
        };
        if let Some(removed) = removed
            && media_dir.is_dir()
        {
            let deleted = thumbs::delete_thumbnails_of(&media_dir, &removed)?;
            if deleted > 0 {
                log!("thumbs"; "{kind} {id}: {deleted} thumbnails of {removed} deleted");
            }
        }

        if !paths.source_file(kind, &id).is_file() {
            log!("watch"; "{kind} {id} has no source yet, skipping");
            return Ok(());
        }

        // Re-parsing the entity regenerates its thumbnails.
        self.site.cache().invalidate(kind, &format!("{id}.md"));
        self.site.build(&config, true)?;
        self.hub.broadcast(&ReloadMessage::new(kind, id, WatchOp::Update));
        Ok(())
    }

    /// Config file or theme changed: everything cached may be stale.
    fn on_site(&self, event: DirWatchEvent) -> Result<()> {
        let current = cfg();
        match categorize_path(&event.path, &current) {
            FileCategory::Config => {
                if !reload_config()? {
                    return Ok(());
                }
                log!("watch"; "config changed, rebuilding...");
            }
            FileCategory::Theme => log!("watch"; "theme changed, rebuilding..."),
            _ => return Ok(()),
        }

        let config = cfg();
        config.validate()?;
        self.site.reset(&config);
        self.site.build(&config, true)?;
        Ok(())
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// `deploy/<kind>/<id>.html`
pub fn remove_content_file(config: &SiteConfig, kind: EntityKind, id: &str) -> Result<()> {
    let path = config
        .paths()
        .deploy_dir()
        .join(kind.as_str())
        .join(format!("{id}.html"));
    if path.is_file() {
        fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
        log!("watch"; "removed {kind}/{id}.html");
    }
    Ok(())
}

pub fn remove_media_dir(config: &SiteConfig, kind: EntityKind, id: &str) -> Result<()> {
    let dir = config.paths().media_dir(kind, id);
    if dir.is_dir() {
        fs::remove_dir_all(&dir).with_context(|| format!("failed to remove {}", dir.display()))?;
        log!("watch"; "removed media of {kind} {id}");
    }
    Ok(())
}

fn rename_media_dir(config: &SiteConfig, kind: EntityKind, from: &str, to: &str) -> Result<()> {
    let paths = config.paths();
    let (old, new) = (paths.media_dir(kind, from), paths.media_dir(kind, to));
    if !old.is_dir() || new.exists() {
        return Ok(());
    }
    fs::rename(&old, &new)
        .with_context(|| format!("failed to move {} to {}", old.display(), new.display()))?;
    log!("watch"; "moved media of {kind} {from} to {to}");
    Ok(())
}

/// Log a build failure with error details.
fn log_build_error(trigger: &str, err: &anyhow::Error) {
    log!("watch"; "build failed ({trigger})");
    log!("error"; "{err:#}");
}

// =============================================================================
// Watcher Setup
// =============================================================================

fn roots(config: &SiteConfig) -> Result<Vec<(WatchRoot, Vec<(PathBuf, RecursiveMode)>)>> {
    let paths = config.paths();

    let media_root = paths.media_root();
    fs::create_dir_all(&media_root)
        .with_context(|| format!("failed to create {}", media_root.display()))?;

    let mut roots: Vec<_> = EntityKind::ALL
        .into_iter()
        .map(|kind| {
            let dir = paths.source_dir(kind);
            (WatchRoot::Source(kind), vec![(dir, RecursiveMode::NonRecursive)])
        })
        .collect();
    roots.push((WatchRoot::Media, vec![(media_root, RecursiveMode::Recursive)]));
    roots.push((
        WatchRoot::Site,
        vec![
            (config.config_path.clone(), RecursiveMode::NonRecursive),
            (paths.theme_dir(), RecursiveMode::Recursive),
            (paths.include_dir(IncludeScope::Global), RecursiveMode::Recursive),
        ],
    ));

    for (_, targets) in &mut roots {
        targets.retain(|(path, _)| path.exists());
    }
    roots.retain(|(_, targets)| !targets.is_empty());
    Ok(roots)
}

/// Block on one root's events until the watch primitive fails.
fn run(controller: &Controller, root: WatchRoot, targets: &[(PathBuf, RecursiveMode)]) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    for (path, mode) in targets {
        watcher
            .watch(path, *mode)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    let mut correlator = RenameCorrelator::new(Duration::from_millis(RENAME_WINDOW_MS));
    let mut debouncer = Debouncer::default();

    loop {
        let now = Instant::now();
        let timeout = [correlator.timeout(now), debouncer.timeout(now)]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(IDLE_TIMEOUT);

        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                let now = Instant::now();
                for event in classify(&event).into_iter().filter_map(skip_ignored) {
                    for ready in correlator.push(event, now) {
                        debouncer.add(ready, now);
                    }
                }
            }
            Ok(Err(err)) => return Err(err).context("watch failed"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => bail!("watch channel closed"),
        }

        let now = Instant::now();
        for expired in correlator.expire(now) {
            debouncer.add(expired, now);
        }
        if debouncer.ready(now) {
            for event in debouncer.take() {
                controller.handle(root, event);
            }
        }
    }
}

/// Spawn one watcher thread per root. Errors end that thread only.
pub fn spawn_watchers(site: Arc<Site>, hub: Arc<ReloadHub>) -> Result<()> {
    let config = cfg();
    let roots = roots(&config)?;
    let controller = Arc::new(Controller { site, hub });

    let root_dir = config.get_root();
    for (root, targets) in roots {
        let watched: Vec<_> = targets
            .iter()
            .map(|(path, _)| path.strip_prefix(root_dir).unwrap_or(path).display().to_string())
            .collect();
        log!("watch"; "{root}: {}", watched.join(", "));

        let controller = Arc::clone(&controller);
        thread::spawn(move || {
            if let Err(err) = run(&controller, root, &targets) {
                log!("watch"; "{root} watcher stopped: {err:#}");
            }
        });
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_classify_basic_ops() {
        let created = classify(&event(EventKind::Create(CreateKind::File), &["/s/posts/a.md"]));
        assert_eq!(created, [DirWatchEvent::new("/s/posts/a.md", WatchOp::Create)]);

        let updated = classify(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/s/posts/a.md"],
        ));
        assert_eq!(updated, [DirWatchEvent::new("/s/posts/a.md", WatchOp::Update)]);

        let removed = classify(&event(EventKind::Remove(RemoveKind::File), &["/s/posts/a.md"]));
        assert_eq!(removed, [DirWatchEvent::new("/s/posts/a.md", WatchOp::Delete)]);

        let accessed = classify(&event(EventKind::Access(notify::event::AccessKind::Any), &["/s/a.md"]));
        assert!(accessed.is_empty());
    }

    #[test]
    fn test_classify_rename_both_carries_paths() {
        let events = classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/s/posts/old.md", "/s/posts/new.md"],
        ));
        assert_eq!(events, [DirWatchEvent::rename("/s/posts/old.md", "/s/posts/new.md")]);
        assert_eq!(events[0].original_path.as_deref(), Some(Path::new("/s/posts/old.md")));
    }

    #[test]
    fn test_classify_rename_halves() {
        let from = classify(&event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/s/a.md"]));
        assert_eq!(from[0].op, WatchOp::Delete);
        let to = classify(&event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/s/b.md"]));
        assert_eq!(to[0].op, WatchOp::Create);
        let any = classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &["/definitely/not/here.md"],
        ));
        assert_eq!(any[0].op, WatchOp::Delete);
    }

    #[test]
    fn test_correlator_pairs_same_directory() {
        let t0 = Instant::now();
        let mut correlator = RenameCorrelator::new(Duration::from_millis(500));

        assert!(correlator.push(DirWatchEvent::new("/s/posts/old.md", WatchOp::Delete), t0).is_empty());
        let ready = correlator.push(
            DirWatchEvent::new("/s/posts/new.md", WatchOp::Create),
            t0 + Duration::from_millis(20),
        );
        assert_eq!(ready, [DirWatchEvent::rename("/s/posts/old.md", "/s/posts/new.md")]);
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_correlator_same_path_is_update() {
        let t0 = Instant::now();
        let mut correlator = RenameCorrelator::new(Duration::from_millis(500));
        correlator.push(DirWatchEvent::new("/s/posts/a.md", WatchOp::Delete), t0);
        let ready = correlator.push(
            DirWatchEvent::new("/s/posts/a.md", WatchOp::Create),
            t0 + Duration::from_millis(5),
        );
        assert_eq!(ready, [DirWatchEvent::new("/s/posts/a.md", WatchOp::Update)]);
    }

    #[test]
    fn test_correlator_degrades_to_delete_and_create() {
        let t0 = Instant::now();
        let mut correlator = RenameCorrelator::new(Duration::from_millis(500));
        correlator.push(DirWatchEvent::new("/s/posts/old.md", WatchOp::Delete), t0);

        let other_dir = correlator.push(
            DirWatchEvent::new("/s/pages/new.md", WatchOp::Create),
            t0 + Duration::from_millis(10),
        );
        assert_eq!(other_dir, [DirWatchEvent::new("/s/pages/new.md", WatchOp::Create)]);

        let late = t0 + Duration::from_millis(600);
        let ready = correlator.push(DirWatchEvent::new("/s/posts/new.md", WatchOp::Create), late);
        assert_eq!(
            ready,
            [
                DirWatchEvent::new("/s/posts/old.md", WatchOp::Delete),
                DirWatchEvent::new("/s/posts/new.md", WatchOp::Create),
            ]
        );
    }

    #[test]
    fn test_correlator_timeout_and_expire() {
        let t0 = Instant::now();
        let mut correlator = RenameCorrelator::new(Duration::from_millis(500));
        assert_eq!(correlator.timeout(t0), None);

        correlator.push(DirWatchEvent::new("/s/a.md", WatchOp::Delete), t0);
        assert_eq!(
            correlator.timeout(t0 + Duration::from_millis(200)),
            Some(Duration::from_millis(300))
        );
        assert!(correlator.expire(t0 + Duration::from_millis(499)).is_empty());
        assert_eq!(correlator.expire(t0 + Duration::from_millis(500)).len(), 1);
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_skip_ignored() {
        assert_eq!(skip_ignored(DirWatchEvent::new("/s/posts/.a.md.swp", WatchOp::Update)), None);
        assert_eq!(skip_ignored(DirWatchEvent::new("/m/post/x/a.jpg_480_thumb.jpg", WatchOp::Create)), None);

        let atomic_save = skip_ignored(DirWatchEvent::rename("/s/posts/a.md.tmp", "/s/posts/a.md"));
        assert_eq!(atomic_save, Some(DirWatchEvent::new("/s/posts/a.md", WatchOp::Update)));

        let backup = skip_ignored(DirWatchEvent::rename("/s/posts/a.md", "/s/posts/a.md~"));
        assert_eq!(backup, Some(DirWatchEvent::new("/s/posts/a.md", WatchOp::Delete)));
    }

    #[test]
    fn test_markdown_only() {
        assert_eq!(markdown_only(DirWatchEvent::new("/s/posts/a.txt", WatchOp::Update)), None);
        assert_eq!(
            markdown_only(DirWatchEvent::rename("/s/posts/a.txt", "/s/posts/a.md")),
            Some(DirWatchEvent::new("/s/posts/a.md", WatchOp::Create))
        );
        assert_eq!(
            markdown_only(DirWatchEvent::rename("/s/posts/a.md", "/s/posts/a.txt")),
            Some(DirWatchEvent::new("/s/posts/a.md", WatchOp::Delete))
        );
        let rename = DirWatchEvent::rename("/s/posts/a.md", "/s/posts/b.md");
        assert_eq!(markdown_only(rename.clone()), Some(rename));
    }

    #[test]
    fn test_debouncer_merges_per_path() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();
        debouncer.add(DirWatchEvent::new("/s/a.md", WatchOp::Create), t0);
        debouncer.add(DirWatchEvent::new("/s/a.md", WatchOp::Update), t0);
        debouncer.add(DirWatchEvent::new("/s/b.md", WatchOp::Update), t0);
        debouncer.add(DirWatchEvent::new("/s/b.md", WatchOp::Delete), t0);

        assert!(!debouncer.ready(t0 + Duration::from_millis(DEBOUNCE_MS - 1)));
        assert!(debouncer.ready(t0 + Duration::from_millis(DEBOUNCE_MS)));
        assert_eq!(
            debouncer.take(),
            [
                DirWatchEvent::new("/s/a.md", WatchOp::Create),
                DirWatchEvent::new("/s/b.md", WatchOp::Delete),
            ]
        );
        assert_eq!(debouncer.timeout(t0), None);
    }

    #[test]
    fn test_op_display_matches_wire_name() {
        for op in [WatchOp::Create, WatchOp::Update, WatchOp::Rename, WatchOp::Delete] {
            assert_eq!(serde_json::to_string(&op).unwrap(), format!("\"{op}\""));
        }
    }
}
