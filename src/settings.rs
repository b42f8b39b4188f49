//! Persisted plugin settings and the extended-result history.
//!
//! [`PluginSettings`] mirrors the plugin's `data.json`. The only field the
//! core writes is `uploadedImages`, and only by appending through an
//! [`UploadHistory`]; appends are serialized by a mutex so concurrent
//! uploads cannot lose each other's entries. Keys this crate does not model
//! are kept in [`PluginSettings::extra`] and written back unchanged.

use crate::config::{LinkDescription, UploaderConfig, UploaderKind, DEFAULT_UPLOAD_SERVER};
use crate::error::UploadError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// The plugin's persisted settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginSettings {
    /// Backend identifier: `PicGo` or `PicGo-Core`.
    pub uploader: String,
    pub upload_server: String,
    pub remote_server_mode: bool,
    pub picgo_core_path: String,
    pub image_desc: LinkDescription,
    pub image_size_suffix: String,
    /// Extended upload records, append-only.
    pub uploaded_images: Vec<Value>,
    /// Every other key of `data.json`, preserved on save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            uploader: UploaderKind::PicGo.as_str().to_string(),
            upload_server: DEFAULT_UPLOAD_SERVER.to_string(),
            remote_server_mode: false,
            picgo_core_path: String::new(),
            image_desc: LinkDescription::Origin,
            image_size_suffix: String::new(),
            uploaded_images: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl PluginSettings {
    /// Read settings from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, UploadError> {
        let raw = std::fs::read_to_string(path).map_err(|e| UploadError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            UploadError::InvalidConfig(format!("settings file '{}': {}", path.display(), e))
        })
    }

    /// Like [`PluginSettings::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, UploadError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write settings as pretty JSON, atomically.
    pub fn save(&self, path: &Path) -> Result<(), UploadError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| UploadError::Internal(format!("serialise settings: {e}")))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let write_err = |e: std::io::Error| UploadError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    /// Start an [`UploaderConfig`] builder from these settings.
    ///
    /// Fails fast on an unknown uploader identifier.
    pub fn to_builder(&self) -> Result<crate::config::UploaderConfigBuilder, UploadError> {
        let kind: UploaderKind = self.uploader.parse()?;
        let mut builder = UploaderConfig::builder()
            .uploader(kind)
            .upload_server(self.upload_server.clone())
            .remote_server_mode(self.remote_server_mode)
            .link_description(self.image_desc)
            .image_size_suffix(self.image_size_suffix.clone());
        if !self.picgo_core_path.trim().is_empty() {
            builder = builder.picgo_core_path(self.picgo_core_path.clone());
        }
        Ok(builder)
    }

    /// Validated [`UploaderConfig`] from these settings.
    pub fn to_config(&self) -> Result<UploaderConfig, UploadError> {
        self.to_builder()?.build()
    }
}

/// Append-only store for extended upload results.
pub trait UploadHistory: Send + Sync {
    /// Append `entries` after a successful upload batch.
    ///
    /// May block on file I/O; async callers run it on the blocking pool.
    fn append(&self, entries: Vec<Value>) -> Result<(), UploadError>;

    /// A snapshot of all stored entries.
    fn entries(&self) -> Vec<Value>;
}

/// In-memory history.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<Value>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UploadHistory for MemoryHistory {
    fn append(&self, entries: Vec<Value>) -> Result<(), UploadError> {
        lock(&self.entries).extend(entries);
        Ok(())
    }

    fn entries(&self) -> Vec<Value> {
        lock(&self.entries).clone()
    }
}

/// History stored in the settings file; each append is saved immediately.
#[derive(Debug)]
pub struct SettingsFile {
    path: PathBuf,
    settings: Mutex<PluginSettings>,
}

impl SettingsFile {
    /// Open `path`, falling back to default settings when it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let path = path.into();
        let settings = PluginSettings::load_or_default(&path)?;
        Ok(Self {
            path,
            settings: Mutex::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current settings.
    pub fn settings(&self) -> PluginSettings {
        lock(&self.settings).clone()
    }
}

impl UploadHistory for SettingsFile {
    fn append(&self, entries: Vec<Value>) -> Result<(), UploadError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut settings = lock(&self.settings);
        let count = entries.len();
        settings.uploaded_images.extend(entries);
        settings.save(&self.path)?;
        info!(
            "Recorded {} upload result(s) in {}",
            count,
            self.path.display()
        );
        Ok(())
    }

    fn entries(&self) -> Vec<Value> {
        lock(&self.settings).uploaded_images.clone()
    }
}

// A poisoned lock only means another append panicked; the vec is still valid.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
