//! Front door for uploads: picks the configured backend and enforces the
//! platform precondition before any backend runs.

use super::{create_uploader, UploadItem, Uploader};
use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::output::UploadResponse;
use crate::pipeline::multipart::NamedBlob;
use crate::settings::UploadHistory;
use std::sync::Arc;
use tracing::warn;

/// Dispatches uploads to the backend named in the configuration.
pub struct UploaderManager {
    config: UploaderConfig,
    uploader: Arc<dyn Uploader>,
}

impl UploaderManager {
    /// Build the manager for `config.uploader`.
    pub fn new(
        config: UploaderConfig,
        history: Arc<dyn UploadHistory>,
    ) -> Result<Self, UploadError> {
        let uploader = create_uploader(config.uploader, &config, history)?;
        Ok(Self { config, uploader })
    }

    /// Wrap an existing backend.
    pub fn with_uploader(config: UploaderConfig, uploader: Arc<dyn Uploader>) -> Self {
        Self { config, uploader }
    }

    /// The active backend.
    pub fn uploader(&self) -> &dyn Uploader {
        self.uploader.as_ref()
    }

    fn check_platform(&self) -> Result<(), UploadError> {
        if self.config.platform.is_mobile() && !self.config.remote_server_mode {
            warn!("Refusing upload: mobile host without remote server mode");
            return Err(UploadError::UnsupportedPlatform {
                reason: "Mobile App must use remote server mode.".to_string(),
            });
        }
        Ok(())
    }

    pub async fn upload(&self, items: &[UploadItem]) -> Result<UploadResponse, UploadError> {
        self.check_platform()?;
        self.uploader.upload(items).await
    }

    pub async fn upload_by_clipboard(
        &self,
        data: Option<&[NamedBlob]>,
    ) -> Result<UploadResponse, UploadError> {
        self.check_platform()?;
        self.uploader.upload_by_clipboard(data).await
    }
}
