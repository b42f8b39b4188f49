//! Upload every local image of the active note and point its links at the
//! hosted copies.

use crate::assets::{is_asset_type_an_image, is_url};
use crate::config::UploaderConfig;
use crate::error::{ImageError, UploadError};
use crate::host::{ensure_same_document, require_active, Workspace};
use crate::output::{BatchOutput, ImageOutcome};
use crate::pipeline::{extract, rewrite};
use crate::uploader::{UploadItem, UploaderManager};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Upload all local images linked from the active note.
///
/// Local references with an image extension that resolve to an existing
/// file are uploaded in one batch; `result[i]` replaces reference `i`.
///
/// # Returns
/// `Ok(BatchOutput)` even when the backend rejected the batch; in that case
/// every image is marked failed, `message` carries the backend's reason and
/// the note is left untouched.
///
/// # Errors
/// - No active note
/// - Platform precondition or transport failure from the uploader
/// - [`UploadError::DocumentChanged`] if another note became active meanwhile
pub async fn upload_all_images(
    workspace: &dyn Workspace,
    manager: &UploaderManager,
    config: &UploaderConfig,
) -> Result<BatchOutput, UploadError> {
    let start = Instant::now();

    // ── Step 1: Capture identity and collect local images ────────────────
    let identity = require_active(workspace)?;
    let text = workspace.get_value()?;

    let items: Vec<UploadItem> = extract::scan(&text)
        .into_iter()
        .filter(|r| !is_url(&r.path) && is_asset_type_an_image(&r.path))
        .filter_map(|reference| match workspace.resolve_local(&reference.path) {
            Some(file) => Some(UploadItem::Image { reference, file }),
            None => {
                debug!("Skipping unresolved image link: {}", reference.path);
                None
            }
        })
        .collect();

    let total = items.len();
    if total == 0 {
        info!("No local images in {}", identity);
        return Ok(BatchOutput::from_outcomes(Vec::new(), elapsed_ms(start)));
    }
    info!("Uploading {} local image(s) from {}", total, identity);

    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_batch_start(total);
        for (i, item) in items.iter().enumerate() {
            cb.on_image_start(i, total, &item.file().to_string_lossy());
        }
    }

    // ── Step 2: Upload ───────────────────────────────────────────────────
    let response = manager.upload(&items).await?;

    if !response.success {
        warn!("Upload rejected: {}", response.msg);
        let outcomes = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let error = ImageError::UploadFailed {
                    path: item.file().display().to_string(),
                    detail: response.msg.clone(),
                };
                if let Some(cb) = cb {
                    cb.on_image_error(i, total, &error.to_string());
                }
                ImageOutcome {
                    source: source_of(item),
                    target: None,
                    error: Some(error),
                }
            })
            .collect();
        let mut output = BatchOutput::from_outcomes(outcomes, elapsed_ms(start));
        output.message = Some(response.msg);
        if let Some(cb) = cb {
            cb.on_batch_complete(total, 0);
        }
        return Ok(output);
    }

    // ── Step 3: Pair results with references ─────────────────────────────
    let mut replacements = Vec::new();
    let mut outcomes = Vec::with_capacity(total);
    for (i, item) in items.iter().enumerate() {
        let source = source_of(item);
        match response.result.get(i) {
            Some(url) => {
                if let UploadItem::Image { reference, .. } = item {
                    replacements.push(rewrite::Replacement::image_link(
                        reference.source.clone(),
                        &config.describe(&reference.name),
                        url,
                    ));
                }
                if let Some(cb) = cb {
                    cb.on_image_complete(i, total, url);
                }
                outcomes.push(ImageOutcome {
                    source,
                    target: Some(url.clone()),
                    error: None,
                });
            }
            None => {
                let error = ImageError::UploadFailed {
                    path: item.file().display().to_string(),
                    detail: format!("backend returned {} URL(s)", response.result.len()),
                };
                if let Some(cb) = cb {
                    cb.on_image_error(i, total, &error.to_string());
                }
                outcomes.push(ImageOutcome {
                    source,
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
        "Upload finished: {}/{} succeeded in {}ms",
        output.stats.succeeded, total, output.stats.duration_ms
    );
    Ok(output)
}

fn source_of(item: &UploadItem) -> String {
    match item {
        UploadItem::Image { reference, .. } => reference.source.clone(),
        UploadItem::Path(path) => path.display().to_string(),
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
