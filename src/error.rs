//! Error types for the image-autoupload library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`UploadError`]: **Fatal**: the operation cannot proceed at all
//!   (unsupported host, unknown uploader, unreachable server, the active
//!   note changed under us). Returned as `Err(UploadError)` from the
//!   uploaders, the manager and the batch entry points.
//!
//! * [`ImageError`]: **Non-fatal**: a single image failed (bad download,
//!   payload is not an image, write refused) while the rest of the batch is
//!   fine. Stored inside [`crate::output::ImageOutcome`] so callers can report
//!   partial success.
//!
//! Backend-level failures reported by the image host itself (HTTP status
//! other than 200, `PicGo ERROR` in the tool output) are neither: they come
//! back as an [`crate::output::UploadResponse`] with `success == false`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the image-autoupload library.
#[derive(Debug, Error)]
pub enum UploadError {
    // ── Precondition errors ───────────────────────────────────────────────
    /// The host cannot run the requested backend/mode combination.
    #[error("Unsupported on this platform: {reason}")]
    UnsupportedPlatform { reason: String },

    /// The configured uploader identifier is not one of the known backends.
    #[error("Invalid uploader '{name}'\nSupported uploaders: PicGo, PicGo-Core.")]
    UnknownUploader { name: String },

    /// Builder or settings validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Transport errors ──────────────────────────────────────────────────
    /// The HTTP request could not be sent or its body could not be read.
    #[error("Request to '{url}' failed: {reason}")]
    RequestFailed { url: String, reason: String },

    /// The image host answered with a body we could not interpret.
    #[error("Invalid response from '{url}': {detail}")]
    InvalidResponse { url: String, detail: String },

    /// The uploader executable could not be started.
    #[error("Failed to start '{program}': {source}\nCheck the PicGo-Core path setting.")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The uploader executable did not exit in time.
    #[error("'{program}' did not finish within {secs}s")]
    ProcessTimeout { program: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A local image or note could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The note or a settings file could not be written.
    #[error("Failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Consistency errors ────────────────────────────────────────────────
    /// There is no active note to operate on.
    #[error("No active file")]
    NoActiveFile,

    /// The active note changed while a batch was in flight.
    #[error("File has been changed, rewrite aborted (started on '{expected}', now on '{actual}')")]
    DocumentChanged { expected: String, actual: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// `true` for errors raised before any I/O was attempted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform { .. } | Self::UnknownUploader { .. } | Self::InvalidConfig(_)
        )
    }
}

/// A non-fatal error for a single image of a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// HTTP fetch failed or returned a non-success status.
    #[error("Download of '{url}' failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The fetched payload does not start with a known image signature.
    #[error("'{url}' is not a recognised image")]
    NotAnImage { url: String },

    /// The image could not be stored in the attachment folder.
    #[error("Failed to write '{path}': {detail}")]
    WriteFailed { path: String, detail: String },

    /// The uploader returned no URL for this image.
    #[error("No upload result for '{path}': {detail}")]
    UploadFailed { path: String, detail: String },
}
