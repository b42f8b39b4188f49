//! Result types returned by the uploaders and the batch operations.

use crate::error::ImageError;
use serde::{Deserialize, Serialize};

/// What an uploader reports back for one call.
///
/// `result` is order-aligned with the submitted items: `result[i]` is the
/// hosted URL of item `i`. `full_result` carries the extended per-file
/// records some servers (PicList) return alongside the bare URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub msg: String,
    pub result: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub full_result: Vec<serde_json::Value>,
}

impl UploadResponse {
    pub fn success(result: Vec<String>) -> Self {
        Self {
            success: true,
            msg: "success".to_string(),
            result,
            full_result: Vec::new(),
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
            result: Vec::new(),
            full_result: Vec::new(),
        }
    }

    /// The first hosted URL, as used by clipboard uploads.
    pub fn first_url(&self) -> Option<&str> {
        self.result.first().map(String::as_str)
    }
}

/// Outcome for one image of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOutcome {
    /// The verbatim link that was (or would have been) rewritten.
    pub source: String,
    /// New URL or note-relative path; None on failure.
    pub target: Option<String>,
    /// Why this image failed; None on success.
    pub error: Option<ImageError>,
}

impl ImageOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.target.is_some()
    }
}

/// Aggregate counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Images the batch tried to process.
    pub attempted: usize,
    /// Images uploaded or stored and rewritten.
    pub succeeded: usize,
    /// Images that failed; their links were left untouched.
    pub failed: usize,
    /// Wall-clock duration of the whole batch.
    pub duration_ms: u64,
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    pub images: Vec<ImageOutcome>,
    pub stats: BatchStats,
    /// Backend message for a batch-level failure (e.g. server error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchOutput {
    pub(crate) fn from_outcomes(images: Vec<ImageOutcome>, duration_ms: u64) -> Self {
        let succeeded = images.iter().filter(|i| i.is_success()).count();
        let stats = BatchStats {
            attempted: images.len(),
            succeeded,
            failed: images.len() - succeeded,
            duration_ms,
        };
        Self {
            images,
            stats,
            message: None,
        }
    }

    /// A one-line summary suitable for a notice.
    pub fn summary(&self) -> String {
        format!(
            "all: {}\nsuccess: {}\nfailed: {}",
            self.stats.attempted, self.stats.succeeded, self.stats.failed
        )
    }
}
