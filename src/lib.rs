//! # image-autoupload
//!
//! Move the images of a Markdown note between the local vault and an image
//! host, rewriting the note's links to match.
//!
//! ## Why this crate?
//!
//! Notes collect images from two directions: pasted screenshots that live in
//! the vault, and links copied from the web. Publishing wants the former on a
//! CDN; archiving wants the latter on disk. This crate does both directions
//! against a PicGo server or the PicGo-Core CLI, and only ever replaces the
//! exact link text it matched, so the rest of the note is left alone.
//!
//! ## Pipeline Overview
//!
//! ```text
//! note text
//!  │
//!  ├─ 1. Extract   ![alt](path), ![alt](<path>), ![[path|alt]]
//!  ├─ 2a. Upload   local files ─▶ PicGo (JSON / multipart) or PicGo-Core
//!  ├─ 2b. Download network URLs ─▶ sniff ─▶ unique name ─▶ attachment folder
//!  ├─ 3. Guard     abort if another note became active meanwhile
//!  └─ 4. Rewrite   replace each matched span with the new link
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use image_autoupload::{
//!     download_all_images, upload_all_images, FileWorkspace, MemoryHistory, UploaderConfig,
//!     UploaderManager,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workspace = FileWorkspace::new("/home/me/vault", "daily/today.md")?;
//!     let config = UploaderConfig::default();
//!
//!     let output = download_all_images(&workspace, &config).await?;
//!     eprintln!("{}", output.summary());
//!
//!     let manager = UploaderManager::new(config.clone(), Arc::new(MemoryHistory::new()))?;
//!     let output = upload_all_images(&workspace, &manager, &config).await?;
//!     eprintln!("{}", output.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `imgup` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! image-autoupload = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assets;
pub mod config;
pub mod download;
pub mod error;
pub mod host;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod settings;
pub mod upload;
pub mod uploader;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{LinkDescription, Platform, UploaderConfig, UploaderConfigBuilder, UploaderKind};
pub use download::download_all_images;
pub use error::{ImageError, UploadError};
pub use host::{FileWorkspace, Workspace};
pub use output::{BatchOutput, BatchStats, ImageOutcome, UploadResponse};
pub use pipeline::extract::{scan, ImageReference};
pub use pipeline::multipart::{NamedBlob, PayloadData, PayloadValue};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use settings::{MemoryHistory, PluginSettings, SettingsFile, UploadHistory};
pub use upload::upload_all_images;
pub use uploader::{create_uploader, UploadItem, Uploader, UploaderManager};
