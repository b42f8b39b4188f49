//! Upload backends.
//!
//! The set of backends is closed ([`UploaderKind`]); [`create_uploader`] maps a
//! kind to its implementation. Every backend answers with an
//! [`UploadResponse`] whose `result` is aligned with the submitted items.
//!
//! | Kind         | Module     | Transport                              |
//! |--------------|------------|----------------------------------------|
//! | `PicGo`      | [`remote`] | HTTP POST, JSON paths or multipart     |
//! | `PicGo-Core` | [`cli`]    | `<picgo> upload <paths…>` subprocess   |
//!
//! [`manager::UploaderManager`] sits in front of the backends and enforces the
//! platform preconditions.

pub mod cli;
pub mod manager;
pub mod remote;

use crate::config::{UploaderConfig, UploaderKind};
use crate::error::UploadError;
use crate::output::UploadResponse;
use crate::pipeline::extract::ImageReference;
use crate::pipeline::multipart::NamedBlob;
use crate::settings::UploadHistory;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use cli::PicGoCoreUploader;
pub use manager::UploaderManager;
pub use remote::PicGoUploader;

/// One thing to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadItem {
    /// An image link from the note, resolved to a local file.
    Image {
        reference: ImageReference,
        file: PathBuf,
    },
    /// A bare file path.
    Path(PathBuf),
}

impl UploadItem {
    /// The local file to upload.
    pub fn file(&self) -> &Path {
        match self {
            UploadItem::Image { file, .. } => file,
            UploadItem::Path(path) => path,
        }
    }
}

impl From<PathBuf> for UploadItem {
    fn from(path: PathBuf) -> Self {
        UploadItem::Path(path)
    }
}

/// An image-hosting backend.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// The backend identifier, as stored in the settings.
    fn name(&self) -> &'static str;

    /// Upload `items`; on success `result[i]` is the URL of `items[i]`.
    async fn upload(&self, items: &[UploadItem]) -> Result<UploadResponse, UploadError>;

    /// Upload clipboard content.
    ///
    /// `data` carries the image blobs when the host read the clipboard itself;
    /// `None` asks the backend to read its own clipboard.
    async fn upload_by_clipboard(
        &self,
        data: Option<&[NamedBlob]>,
    ) -> Result<UploadResponse, UploadError>;
}

/// Build the backend for `kind`.
pub fn create_uploader(
    kind: UploaderKind,
    config: &UploaderConfig,
    history: Arc<dyn UploadHistory>,
) -> Result<Arc<dyn Uploader>, UploadError> {
    Ok(match kind {
        UploaderKind::PicGo => Arc::new(PicGoUploader::new(config.clone(), history)?),
        UploaderKind::PicGoCore => Arc::new(PicGoCoreUploader::new(config.clone())),
    })
}

/// Like [`create_uploader`], from a settings identifier (`PicGo`, `PicGo-Core`).
pub fn create_uploader_by_name(
    name: &str,
    config: &UploaderConfig,
    history: Arc<dyn UploadHistory>,
) -> Result<Arc<dyn Uploader>, UploadError> {
    create_uploader(name.parse()?, config, history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryHistory;

    #[test]
    fn factory_covers_every_kind() {
        let config = UploaderConfig::default();
        let history: Arc<dyn UploadHistory> = Arc::new(MemoryHistory::new());

        let picgo = create_uploader(UploaderKind::PicGo, &config, history.clone()).unwrap();
        assert_eq!(picgo.name(), "PicGo");

        let core = create_uploader(UploaderKind::PicGoCore, &config, history.clone()).unwrap();
        assert_eq!(core.name(), "PicGo-Core");
    }

    #[test]
    fn factory_rejects_unknown_names() {
        let config = UploaderConfig::default();
        let history: Arc<dyn UploadHistory> = Arc::new(MemoryHistory::new());
        let err = create_uploader_by_name("Imgur", &config, history)
            .err()
            .unwrap();
        assert!(matches!(err, UploadError::UnknownUploader { .. }));
        assert!(err.is_precondition());
    }

    #[test]
    fn item_file_path() {
        let item = UploadItem::Image {
            reference: ImageReference {
                path: "a.png".into(),
                name: "a".into(),
                source: "![a](a.png)".into(),
            },
            file: PathBuf::from("/vault/a.png"),
        };
        assert_eq!(item.file(), Path::new("/vault/a.png"));
        assert_eq!(
            UploadItem::from(PathBuf::from("/b.png")).file(),
            Path::new("/b.png")
        );
    }
}
