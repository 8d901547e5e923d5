//! Thumbnail generation and original-image downscaling.
//!
//! # Pipeline (per media directory)
//!
//! ```text
//! use_thumbs = false ──► delete every thumbnail
//!
//! use_thumbs = true
//!   1. delete thumbnails whose size is no longer configured
//!   2. for each original (.jpg/.jpeg/.png) × each size:
//!        thumbnail exists?              ── yes ─► skip
//!        file size < threshold (MB)?    ── yes ─► skip
//!        fits within size × size?       ── yes ─► skip
//!        resize (longer edge = size) ─► <file>_<size>_thumb<ext>
//! ```
//!
//! Originals are processed in parallel with rayon.

use super::{THUMBNAIL_SOURCE_EXTENSIONS, extension, is_thumbnail, thumb_file_name, thumb_size};
use crate::config::{MediaConfig, PngCompression};
use crate::log;
use anyhow::{Context, Result, bail};
use image::{
    DynamicImage, GenericImageView,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilter, PngEncoder},
    },
    imageops::FilterType,
};
use rayon::prelude::*;
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};
use walkdir::WalkDir;

const BYTES_PER_MB: f64 = 1_000_000.0;

/// Counts of a thumbnail pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ThumbReport {
    pub generated: usize,
    pub deleted: usize,
}

// ============================================================================
// Geometry
// ============================================================================

/// Target dimensions for fitting `(width, height)` into a `size` box.
///
/// Returns `None` when the image already fits.
pub fn target_dimensions(width: u32, height: u32, size: u32) -> Option<(u32, u32)> {
    if width <= size && height <= size {
        return None;
    }

    let scale = |a: u32, b: u32| (u64::from(size) * u64::from(a) / u64::from(b).max(1)) as u32;
    Some(if width == height {
        (size, size)
    } else if width > height {
        (size, scale(height, width).max(1))
    } else {
        (scale(width, height).max(1), size)
    })
}

// ============================================================================
// Thumbnails
// ============================================================================

/// Bring the thumbnails of one media directory in line with the config.
pub fn process_dir(dir: &Path, media: &MediaConfig) -> Result<ThumbReport> {
    if !dir.is_dir() {
        return Ok(ThumbReport::default());
    }

    if !media.use_thumbs {
        let deleted = delete_thumbnails(dir, |_| true)?;
        return Ok(ThumbReport { generated: 0, deleted });
    }

    let sizes = media.sorted_thumb_sizes();
    let deleted = delete_thumbnails(dir, |size| !sizes.contains(&size))?;

    let originals: Vec<PathBuf> = list_thumbnail_sources(dir)?;
    let generated = AtomicUsize::new(0);

    originals.par_iter().for_each(|path| {
        match generate_for_image(path, &sizes, media) {
            Ok(count) => {
                generated.fetch_add(count, Ordering::Relaxed);
            }
            Err(err) => log!("thumbs"; "{}: {err:#}", path.display()),
        }
    });

    Ok(ThumbReport {
        generated: generated.into_inner(),
        deleted,
    })
}

/// Delete thumbnails in `dir` whose encoded size matches `should_delete`.
pub fn delete_thumbnails(dir: &Path, should_delete: impl Fn(u32) -> bool) -> Result<usize> {
    let mut deleted = 0;
    for path in list_images(dir)? {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Some(size) = thumb_size(&name)
            && should_delete(size)
        {
            fs::remove_file(&path)
                .with_context(|| format!("failed to delete {}", path.display()))?;
            log!("thumbs"; "deleted {}", path.display());
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Delete every thumbnail derived from the original `file` in `dir`.
pub fn delete_thumbnails_of(dir: &Path, file: &str) -> Result<usize> {
    let prefix = format!("{file}_");
    let mut deleted = 0;
    for path in list_images(dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with(&prefix) && thumb_size(&name).is_some() {
            fs::remove_file(&path)?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

fn generate_for_image(path: &Path, sizes: &[u32], media: &MediaConfig) -> Result<usize> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = extension(&name).unwrap_or_default();

    let missing: Vec<(u32, PathBuf)> = sizes
        .iter()
        .map(|&size| (size, path.with_file_name(thumb_file_name(&name, size))))
        .filter(|(_, thumb)| !thumb.exists())
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let size_mb = fs::metadata(path)?.len() as f64 / BYTES_PER_MB;
    if size_mb < media.thumb_threshold {
        return Ok(0);
    }

    let img = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let (iw, ih) = img.dimensions();

    let mut generated = 0;
    for (size, thumb_path) in missing {
        let Some((tw, th)) = target_dimensions(iw, ih, size) else {
            continue;
        };
        let thumb = img.resize_exact(tw, th, FilterType::Lanczos3);
        save_via_tmp(&thumb, &thumb_path, &ext, media)?;
        log!("thumbs"; "{} ({iw}x{ih} → {tw}x{th})", thumb_path.display());
        generated += 1;
    }
    Ok(generated)
}

// ============================================================================
// Originals
// ============================================================================

/// Downscale originals larger than `max_image_size` across all media dirs.
///
/// Returns the number of images resized (or, in dry-run mode, that would be).
pub fn resize_originals(media_root: &Path, media: &MediaConfig, dry_run: bool) -> Result<usize> {
    if !media.resize_originals || media.max_image_size == 0 || !media_root.is_dir() {
        return Ok(0);
    }

    // media/<kind>/<id>/<file>
    let originals: Vec<PathBuf> = WalkDir::new(media_root)
        .min_depth(3)
        .max_depth(3)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_thumbnail_source(p))
        .collect();

    let resized = AtomicUsize::new(0);
    originals.par_iter().for_each(|path| {
        match resize_original(path, media, dry_run) {
            Ok(true) => {
                resized.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {}
            Err(err) => log!("thumbs"; "{}: {err:#}", path.display()),
        }
    });

    let resized = resized.into_inner();
    if resized > 0 {
        if dry_run {
            log!("thumbs"; "{resized} original image(s) exceed {}px", media.max_image_size);
        } else {
            log!("thumbs"; "resized {resized} original image(s)");
        }
    }
    Ok(resized)
}

/// Downscale one original in place. Returns whether it was (or would be) resized.
pub fn resize_original(path: &Path, media: &MediaConfig, dry_run: bool) -> Result<bool> {
    let img = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let (ow, oh) = img.dimensions();
    let Some((tw, th)) = target_dimensions(ow, oh, media.max_image_size) else {
        return Ok(false);
    };

    if dry_run {
        log!("thumbs"; "would resize {} ({ow}x{oh} → {tw}x{th})", path.display());
        return Ok(true);
    }

    let ext = path
        .file_name()
        .and_then(|n| extension(&n.to_string_lossy()))
        .unwrap_or_default();
    let resized = img.resize_exact(tw, th, FilterType::Lanczos3);

    save_via_tmp(&resized, path, &ext, media)?;
    log!("thumbs"; "resized {} ({ow}x{oh} → {tw}x{th})", path.display());
    Ok(true)
}

// ============================================================================
// Helpers
// ============================================================================

fn is_thumbnail_source(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    !is_thumbnail(&name)
        && extension(&name).is_some_and(|ext| THUMBNAIL_SOURCE_EXTENSIONS.contains(&ext.as_str()))
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        let is_source_type = path
            .file_name()
            .and_then(|n| extension(&n.to_string_lossy()))
            .is_some_and(|ext| THUMBNAIL_SOURCE_EXTENSIONS.contains(&ext.as_str()));
        if path.is_file() && is_source_type {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn list_thumbnail_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_images(dir)?
        .into_iter()
        .filter(|p| is_thumbnail_source(p))
        .collect())
}

fn png_compression(level: PngCompression) -> CompressionType {
    match level {
        PngCompression::Default => CompressionType::Default,
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Best => CompressionType::Best,
    }
}

/// Encode into `<path>.tmp` and rename over `path`, so a failed encode never
/// leaves a partial file under the final name.
fn save_via_tmp(img: &DynamicImage, path: &Path, ext: &str, media: &MediaConfig) -> Result<()> {
    let tmp = path.with_extension(format!("{ext}.tmp"));
    if let Err(err) = save_image(img, &tmp, ext, media) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))
}

fn save_image(img: &DynamicImage, path: &Path, ext: &str, media: &MediaConfig) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    match ext {
        "jpg" | "jpeg" => {
            let encoder = JpegEncoder::new_with_quality(&mut writer, media.jpeg_quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        "png" => {
            let encoder = PngEncoder::new_with_quality(
                &mut writer,
                png_compression(media.png_compression),
                PngFilter::Adaptive,
            );
            img.write_with_encoder(encoder)?;
        }
        other => bail!("unsupported thumbnail format `{other}`"),
    }

    writer.flush()?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
