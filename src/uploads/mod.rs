//! Issue media uploads
//!
//! Files arrive as `images` / `videos` multipart fields, are checked against
//! their declared type and their magic bytes, and are written flat into the
//! upload directory under a generated name. They are served back from
//! `/uploads/<name>`.

use crate::error::AppError;
use crate::models::{Media, MediaItem};
use crate::validation::{validate_filename_extensions, validate_media_upload, ValidationError};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MAX_IMAGES: usize = 5;
pub const MAX_VIDEOS: usize = 2;
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Maps a multipart field name to the media it carries.
    pub fn from_field(name: &str) -> Option<Self> {
        match name {
            "images" => Some(MediaKind::Image),
            "videos" => Some(MediaKind::Video),
            _ => None,
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }

    fn mime_kind(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn max_files(self) -> usize {
        match self {
            MediaKind::Image => MAX_IMAGES,
            MediaKind::Video => MAX_VIDEOS,
        }
    }
}

/// A file received from the client, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub kind: MediaKind,
    pub original_filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Validate name, size, declared type and sniffed type.
    pub fn check(&self, max_size: usize) -> Result<(), ValidationError> {
        validate_filename_extensions(&self.original_filename)?;
        let detected = infer::get(&self.data).map(|t| t.mime_type());
        validate_media_upload(
            self.kind.mime_kind(),
            &self.content_type,
            detected,
            self.data.len(),
            max_size,
        )
    }
}

/// Enforce the per-field file count limits.
pub fn check_counts(files: &[UploadedFile]) -> Result<(), ValidationError> {
    for kind in [MediaKind::Image, MediaKind::Video] {
        if files.iter().filter(|f| f.kind == kind).count() > kind.max_files() {
            return Err(ValidationError::TooManyFiles {
                field: kind.field_name().to_string(),
                max: kind.max_files(),
            });
        }
    }
    Ok(())
}

/// `<field>-<unix millis>-<random><.ext>`; the extension is taken from the client's filename.
pub fn storage_name(kind: MediaKind, original_filename: &str, now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let extension = extension_of(original_filename)
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    format!(
        "{}-{}-{}{}",
        kind.field_name(),
        now.timestamp_millis(),
        suffix,
        extension
    )
}

fn extension_of(filename: &str) -> Option<String> {
    let safe = sanitize_filename(filename);
    let (stem, ext) = safe.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn sanitize_filename(filename: &str) -> String {
    let basename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    sanitized.trim_start_matches('.').to_string()
}

/// Write validated files to `upload_dir`. If any write fails, the files
/// already written by this call are removed again.
pub async fn store_files(upload_dir: &Path, files: Vec<UploadedFile>) -> Result<Media, AppError> {
    let mut media = Media::default();
    if files.is_empty() {
        return Ok(media);
    }

    fs::create_dir_all(upload_dir).await.map_err(|e| {
        tracing::error!(dir = ?upload_dir, error = %e, "Failed to create upload directory");
        AppError::Upload(e.to_string())
    })?;

    for file in files {
        let now = Utc::now();
        let name = storage_name(file.kind, &file.original_filename, now);
        let path = upload_dir.join(&name);

        if let Err(e) = fs::write(&path, &file.data).await {
            tracing::error!(path = ?path, error = %e, kind = ?e.kind(), "Failed to write upload");
            remove_files(upload_dir, media.filenames()).await;
            return Err(AppError::Upload(e.to_string()));
        }
        tracing::info!(
            filename = %name,
            original = %file.original_filename,
            size = file.data.len(),
            "Upload stored"
        );

        let item = MediaItem {
            url: format!("{}/{}", PUBLIC_PREFIX, name),
            filename: name,
            uploaded_at: now,
        };
        match file.kind {
            MediaKind::Image => media.images.push(item),
            MediaKind::Video => media.videos.push(item),
        }
    }
    Ok(media)
}

/// Best-effort removal. Names that would escape `upload_dir` are skipped.
pub async fn remove_files<'a>(upload_dir: &Path, names: impl IntoIterator<Item = &'a str>) {
    for name in names {
        let Some(path) = resolve(upload_dir, name) else {
            tracing::warn!(filename = %name, "Refusing to remove file outside upload directory");
            continue;
        };
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!(path = ?path, error = %e, "Failed to clean up media file");
        }
    }
}

fn resolve(upload_dir: &Path, name: &str) -> Option<PathBuf> {
    let plain = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && sanitize_filename(name) == name;
    plain.then(|| upload_dir.join(name))
}
