//! Thumbnails rendered from resolved attachment content.

use cirrus_cache::RetrievalCache;
use cirrus_storage::{AttachmentRecord, is_thumbnailable};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Edge length used when none is requested.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 100;

/// Largest edge length rendered.
pub const MAX_THUMBNAIL_SIZE: u32 = 800;

const SIZE_STEP: u32 = 50;

/// Renders a thumbnail of `source` into `target`.
///
/// Implementations usually shell out to an image tool and may block; they are
/// run on the blocking thread pool.
pub trait ThumbnailRenderer: Send + Sync + std::fmt::Debug {
    /// Render a thumbnail at most `size` pixels on its longest edge.
    fn render(&self, source: &Path, target: &Path, size: u32) -> bool;
}

/// Round a requested size up to a multiple of 50, capped at 800.
///
/// Absent or zero sizes fall back to 100.
pub fn normalize_size(requested: Option<u32>) -> u32 {
    match requested {
        None | Some(0) => DEFAULT_THUMBNAIL_SIZE,
        Some(size) => size.div_ceil(SIZE_STEP).saturating_mul(SIZE_STEP).min(MAX_THUMBNAIL_SIZE),
    }
}

/// Produces and reuses thumbnails of attachments.
#[derive(Debug, Clone)]
pub struct ThumbnailService {
    root: PathBuf,
    renderer: Arc<dyn ThumbnailRenderer>,
    cache: Arc<RetrievalCache>,
}

impl ThumbnailService {
    /// Service writing under `root` with `renderer`.
    pub fn new(
        root: impl Into<PathBuf>,
        renderer: Arc<dyn ThumbnailRenderer>,
        cache: Arc<RetrievalCache>,
    ) -> Self {
        Self {
            root: root.into(),
            renderer,
            cache,
        }
    }

    /// Where the thumbnail of `record` at `size` lives.
    ///
    /// `None` until the record's content has been hashed.
    pub fn thumbnail_path(&self, record: &impl AttachmentRecord, size: u32) -> Option<PathBuf> {
        if record.content_hash().is_empty() {
            return None;
        }
        Some(self.root.join(format!(
            "{}_{}_{}.thumb",
            record.content_hash(),
            record.size(),
            size
        )))
    }

    /// Thumbnail of `record`, rendering it if needed.
    ///
    /// Returns `None` for content that cannot be thumbnailed or has no hash yet,
    /// when the source is unavailable, or when rendering fails.
    #[tracing::instrument(skip(self, record), fields(record_id = record.id()))]
    pub async fn thumbnail(
        &self,
        record: &impl AttachmentRecord,
        requested: Option<u32>,
    ) -> Option<PathBuf> {
        if !is_thumbnailable(record.content_type()) {
            return None;
        }

        let size = normalize_size(requested);
        let Some(target) = self.thumbnail_path(record, size) else {
            tracing::debug!("Content not hashed yet, no thumbnail");
            return None;
        };
        if non_empty(&target).await {
            tracing::debug!(path = %target.display(), "Reusing thumbnail");
            return Some(target);
        }

        let source = self.cache.resolve(record).await;
        if !non_empty(&source).await {
            tracing::debug!(source = %source.display(), "No source for thumbnail");
            return None;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
            tracing::warn!(path = %self.root.display(), error = %e, "Failed to create thumbnail directory");
            return None;
        }

        let renderer = Arc::clone(&self.renderer);
        let render_target = target.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            renderer.render(&source, &render_target, size)
        })
        .await
        .unwrap_or(false);

        if rendered && non_empty(&target).await {
            tracing::info!(path = %target.display(), size, "Rendered thumbnail");
            Some(target)
        } else {
            tracing::warn!(path = %target.display(), "Thumbnail rendering failed");
            None
        }
    }
}

async fn non_empty(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
