//! Download every network image of the active note into the attachment
//! folder and point its links at the local copies.
//!
//! ## Stages
//!
//! 1. Fetch all network references, `concurrency` at a time, preserving order.
//! 2. For each payload in reference order: sniff the image type, allocate a
//!    file name that collides with nothing on disk or earlier in this batch,
//!    and write it with `create_new` so an existing file is never replaced.
//! 3. Rewrite the successful links to note-relative, percent-encoded paths,
//!    provided the same note is still active.
//!
//! Files written in stage 2 stay on disk even if stage 3 aborts.

use crate::assets::{
    decode_link_path, encode_link_path, is_url, random_token, relative_path, sanitize_file_name,
    url_asset,
};
use crate::config::UploaderConfig;
use crate::error::{ImageError, UploadError};
use crate::host::{ensure_same_document, require_active, Workspace};
use crate::output::{BatchOutput, ImageOutcome};
use crate::pipeline::extract::{self, ImageReference};
use crate::pipeline::{rewrite, sniff};
use crate::upload::elapsed_ms;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Download all network images linked from the active note.
///
/// # Returns
/// `Ok(BatchOutput)` whenever the note could be rewritten, even if some
/// images failed (check `output.stats.failed`).
///
/// # Errors
/// - No active note, or the attachment folder cannot be created
/// - [`UploadError::DocumentChanged`] if another note became active meanwhile
pub async fn download_all_images(
    workspace: &dyn Workspace,
    config: &UploaderConfig,
) -> Result<BatchOutput, UploadError> {
    let start = Instant::now();

    // ── Step 1: Capture identity and collect network images ──────────────
    let identity = require_active(workspace)?;
    let text = workspace.get_value()?;
    let references: Vec<ImageReference> = extract::scan(&text)
        .into_iter()
        .filter(|r| is_url(&r.path))
        .collect();

    let total = references.len();
    if total == 0 {
        info!("No network images in {}", identity);
        return Ok(BatchOutput::from_outcomes(Vec::new(), elapsed_ms(start)));
    }

    let folder = workspace.attachment_folder()?;
    tokio::fs::create_dir_all(&folder)
        .await
        .map_err(|e| UploadError::WriteFailed {
            path: folder.clone(),
            source: e,
        })?;
    let note_folder = workspace.active_folder()?;
    info!(
        "Downloading {} image(s) from {} into {}",
        total,
        identity,
        folder.display()
    );

    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_batch_start(total);
    }

    // ── Step 2: Fetch concurrently ───────────────────────────────────────
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.download_timeout_secs))
        .build()
        .map_err(|e| UploadError::Internal(format!("HTTP client: {e}")))?;

    let fetched: Vec<Result<Vec<u8>, ImageError>> = stream::iter(references.iter().enumerate())
        .map(|(i, reference)| {
            if let Some(cb) = cb {
                cb.on_image_start(i, total, &reference.path);
            }
            let client = &client;
            async move { fetch(client, &reference.path).await }
        })
        .buffered(config.concurrency)
        .collect()
        .await;

    // ── Step 3: Name and store, in reference order ───────────────────────
    let mut taken: HashSet<String> = HashSet::new();
    let mut replacements = Vec::new();
    let mut outcomes = Vec::with_capacity(total);

    for (i, (reference, payload)) in references.iter().zip(fetched).enumerate() {
        let stored = match payload {
            Ok(bytes) => store(&folder, &reference.path, &bytes, &mut taken).await,
            Err(e) => Err(e),
        };

        match stored {
            Ok((name, path)) => {
                let target = encode_link_path(&relative_path(&note_folder, &path));
                debug!("{} -> {}", reference.path, target);
                replacements.push(rewrite::Replacement::image_link(
                    reference.source.clone(),
                    &config.describe(&name),
                    &target,
                ));
                if let Some(cb) = cb {
                    cb.on_image_complete(i, total, &target);
                }
                outcomes.push(ImageOutcome {
                    source: reference.source.clone(),
                    target: Some(target),
                    error: None,
                });
            }
            Err(error) => {
                warn!("{}", error);
                if let Some(cb) = cb {
                    cb.on_image_error(i, total, &error.to_string());
                }
                outcomes.push(ImageOutcome {
                    source: reference.source.clone(),
                    target: None,
                    error: Some(error),
                });
            }
        }
    }

    // ── Step 4: Rewrite the note ─────────────────────────────────────────
    ensure_same_document(workspace, &identity)?;
    let current = workspace.get_value()?;
    let (value, applied) = rewrite::apply(&current, &replacements);
    if applied > 0 {
        workspace.set_value(&value)?;
    }

    let output = BatchOutput::from_outcomes(outcomes, elapsed_ms(start));
    if let Some(cb) = cb {
        cb.on_batch_complete(total, output.stats.succeeded);
    }
    info!(
        "Download finished: {}/{} succeeded in {}ms",
        output.stats.succeeded, total, output.stats.duration_ms
    );
    Ok(output)
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, ImageError> {
    let failed = |reason: String| ImageError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Sniff, name and write one payload. Returns `(name, absolute path)`.
async fn store(
    folder: &Path,
    url: &str,
    bytes: &[u8],
    taken: &mut HashSet<String>,
) -> Result<(String, PathBuf), ImageError> {
    let kind = sniff::image_type(bytes).ok_or_else(|| ImageError::NotAnImage {
        url: url.to_string(),
    })?;
    let ext = kind.ext();

    let name = allocate_name(&base_name(url), |candidate| {
        let file_name = format!("{candidate}.{ext}");
        taken.contains(&file_name) || folder.join(&file_name).exists()
    });
    let file_name = format!("{name}.{ext}");
    let path = folder.join(&file_name);

    let write_failed = |e: std::io::Error| ImageError::WriteFailed {
        path: path.display().to_string(),
        detail: e.to_string(),
    };
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
        .map_err(write_failed)?;
    file.write_all(bytes).await.map_err(write_failed)?;
    file.flush().await.map_err(write_failed)?;

    taken.insert(file_name);
    Ok((name, path))
}

/// File stem for a URL: last path segment without extension, percent-decoded,
/// with characters illegal in file names replaced by `-`.
pub fn base_name(url: &str) -> String {
    let asset = decode_link_path(&url_asset(url));
    let stem = Path::new(&asset)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_file_name(&stem)
}

/// First name derived from `base` for which `collides` is false.
///
/// An empty or colliding `base` is replaced by a random 5-character token;
/// while that still collides a further `-<token>` suffix is appended.
pub fn allocate_name(base: &str, mut collides: impl FnMut(&str) -> bool) -> String {
    if !base.is_empty() && !collides(base) {
        return base.to_string();
    }
    let mut name = random_token(5);
    while collides(&name) {
        name = format!("{}-{}", name, random_token(5));
    }
    name
}
