//! Configuration types for uploading and downloading note images.
//!
//! All behaviour is controlled through [`UploaderConfig`], built via its
//! [`UploaderConfigBuilder`]. The persisted plugin settings
//! ([`crate::settings::PluginSettings`]) convert into this type; the core
//! reads it and never mutates it.

use crate::error::UploadError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default PicGo server endpoint.
pub const DEFAULT_UPLOAD_SERVER: &str = "http://127.0.0.1:36677/upload";

/// Default PicGo-Core executable, resolved through `PATH`.
pub const DEFAULT_PICGO_CORE: &str = "picgo";

/// Configuration for the upload and download operations.
///
/// # Example
/// ```rust
/// use image_autoupload::{UploaderConfig, UploaderKind};
///
/// let config = UploaderConfig::builder()
///     .uploader(UploaderKind::PicGoCore)
///     .picgo_core_path("/usr/local/bin/picgo")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct UploaderConfig {
    /// Which backend performs the upload. Default: [`UploaderKind::PicGo`].
    pub uploader: UploaderKind,

    /// PicGo server endpoint. Default: [`DEFAULT_UPLOAD_SERVER`].
    pub upload_server: String,

    /// Send image bytes (multipart) instead of local paths (JSON). Default: false.
    ///
    /// JSON mode only works when the server can read the client's filesystem,
    /// so mobile hosts must enable this.
    pub remote_server_mode: bool,

    /// PicGo-Core executable. If None, uses [`DEFAULT_PICGO_CORE`].
    pub picgo_core_path: Option<String>,

    /// Host the core is running inside. Default: [`Platform::Desktop`].
    pub platform: Platform,

    /// Timeout for a PicGo server request in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Timeout for fetching one remote image in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Timeout for one PicGo-Core invocation in seconds. Default: 120.
    pub cli_timeout_secs: u64,

    /// Number of concurrent image fetches in a download batch. Default: 4.
    pub concurrency: usize,

    /// How the alt text of rewritten links is produced. Default: Origin.
    pub link_description: LinkDescription,

    /// Appended to the alt text in `Origin` mode, e.g. `|300`. Default: None.
    pub image_size_suffix: Option<String>,

    /// Receives per-image events during a batch.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            uploader: UploaderKind::default(),
            upload_server: DEFAULT_UPLOAD_SERVER.to_string(),
            remote_server_mode: false,
            picgo_core_path: None,
            platform: Platform::default(),
            request_timeout_secs: 60,
            download_timeout_secs: 30,
            cli_timeout_secs: 120,
            concurrency: 4,
            link_description: LinkDescription::default(),
            image_size_suffix: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("uploader", &self.uploader)
            .field("upload_server", &self.upload_server)
            .field("remote_server_mode", &self.remote_server_mode)
            .field("picgo_core_path", &self.picgo_core_path)
            .field("platform", &self.platform)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("cli_timeout_secs", &self.cli_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("link_description", &self.link_description)
            .field("image_size_suffix", &self.image_size_suffix)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl UploaderConfig {
    /// Create a new builder for `UploaderConfig`.
    pub fn builder() -> UploaderConfigBuilder {
        UploaderConfigBuilder {
            config: Self::default(),
        }
    }

    /// The PicGo-Core executable to invoke.
    pub fn picgo_core_command(&self) -> &str {
        self.picgo_core_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_PICGO_CORE)
    }

    /// Produce the alt text for a rewritten link.
    pub fn describe(&self, name: &str) -> String {
        match self.link_description {
            LinkDescription::Origin => {
                format!("{}{}", name, self.image_size_suffix.as_deref().unwrap_or(""))
            }
            LinkDescription::None => String::new(),
        }
    }
}

/// Builder for [`UploaderConfig`].
#[derive(Debug)]
pub struct UploaderConfigBuilder {
    config: UploaderConfig,
}

impl UploaderConfigBuilder {
    pub fn uploader(mut self, kind: UploaderKind) -> Self {
        self.config.uploader = kind;
        self
    }

    pub fn upload_server(mut self, url: impl Into<String>) -> Self {
        self.config.upload_server = url.into();
        self
    }

    pub fn remote_server_mode(mut self, v: bool) -> Self {
        self.config.remote_server_mode = v;
        self
    }

    pub fn picgo_core_path(mut self, path: impl Into<String>) -> Self {
        self.config.picgo_core_path = Some(path.into());
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.platform = platform;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn cli_timeout_secs(mut self, secs: u64) -> Self {
        self.config.cli_timeout_secs = secs.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn link_description(mut self, mode: LinkDescription) -> Self {
        self.config.link_description = mode;
        self
    }

    pub fn image_size_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        self.config.image_size_suffix = if suffix.is_empty() { None } else { Some(suffix) };
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<UploaderConfig, UploadError> {
        let c = &self.config;
        if c.uploader == UploaderKind::PicGo {
            let url = reqwest::Url::parse(&c.upload_server).map_err(|e| {
                UploadError::InvalidConfig(format!(
                    "upload server '{}' is not a valid URL: {}",
                    c.upload_server, e
                ))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(UploadError::InvalidConfig(format!(
                    "upload server must use http or https, got '{}'",
                    url.scheme()
                )));
            }
        }
        if c.concurrency == 0 {
            return Err(UploadError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The closed set of upload backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UploaderKind {
    /// A PicGo (or PicList) HTTP server.
    #[default]
    #[serde(rename = "PicGo")]
    PicGo,
    /// The PicGo-Core command line tool.
    #[serde(rename = "PicGo-Core")]
    PicGoCore,
}

impl UploaderKind {
    /// The identifier stored in the settings file.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploaderKind::PicGo => "PicGo",
            UploaderKind::PicGoCore => "PicGo-Core",
        }
    }
}

impl fmt::Display for UploaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploaderKind {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PicGo" => Ok(UploaderKind::PicGo),
            "PicGo-Core" => Ok(UploaderKind::PicGoCore),
            other => Err(UploadError::UnknownUploader {
                name: other.to_string(),
            }),
        }
    }
}

/// The host the core runs inside.
///
/// Mobile hosts have no subprocesses and no shared filesystem with a
/// PicGo server, which rules out PicGo-Core and JSON mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    Desktop,
    Mobile,
}

impl Platform {
    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Mobile)
    }
}

/// Alt text of links written back into the note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDescription {
    /// Keep the original alt text (plus the size suffix, if any). (default)
    #[default]
    Origin,
    /// Write an empty alt text.
    #[serde(alias = "remove")]
    None,
}
