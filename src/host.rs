//! The editor/workspace surface the batch operations run against.
//!
//! The core never reaches for ambient host state: everything it needs from
//! the editor (note text, which note is active, where attachments live, how
//! a link target maps to a file) comes through a [`Workspace`].
//! [`FileWorkspace`] implements it over a Markdown file inside a vault
//! directory, which is what the CLI uses.

use crate::assets::decode_link_path;
use crate::error::UploadError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Host editor capabilities consumed by the batch operations.
pub trait Workspace: Send + Sync {
    /// Identity of the active note (its vault path), or None if no note is open.
    fn active_file(&self) -> Option<String>;

    /// Absolute folder of the active note.
    fn active_folder(&self) -> Result<PathBuf, UploadError>;

    /// Current text of the active note.
    fn get_value(&self) -> Result<String, UploadError>;

    /// Replace the text of the active note.
    fn set_value(&self, value: &str) -> Result<(), UploadError>;

    /// Absolute folder where downloaded images are stored.
    fn attachment_folder(&self) -> Result<PathBuf, UploadError>;

    /// Absolute path of an existing local file a link target points at.
    fn resolve_local(&self, link_path: &str) -> Option<PathBuf>;
}

/// Identity of the active note, or [`UploadError::NoActiveFile`].
pub fn require_active(workspace: &dyn Workspace) -> Result<String, UploadError> {
    workspace.active_file().ok_or(UploadError::NoActiveFile)
}

/// Fail with [`UploadError::DocumentChanged`] unless `expected` is still active.
pub fn ensure_same_document(workspace: &dyn Workspace, expected: &str) -> Result<(), UploadError> {
    match workspace.active_file() {
        Some(actual) if actual == expected => Ok(()),
        actual => Err(UploadError::DocumentChanged {
            expected: expected.to_string(),
            actual: actual.unwrap_or_else(|| "<none>".to_string()),
        }),
    }
}

/// A [`Workspace`] backed by the filesystem.
///
/// The attachment folder follows the editor rule: a setting starting with
/// `./` is relative to the active note's folder, anything else is relative to
/// the vault root (`/` means the root itself).
#[derive(Debug)]
pub struct FileWorkspace {
    vault_root: PathBuf,
    attachment_setting: String,
    active: RwLock<Option<PathBuf>>,
}

impl FileWorkspace {
    /// Open `note` (absolute, or relative to `vault_root`) inside `vault_root`.
    pub fn new(
        vault_root: impl Into<PathBuf>,
        note: impl AsRef<Path>,
    ) -> Result<Self, UploadError> {
        let vault_root = vault_root.into();
        let vault_root = std::fs::canonicalize(&vault_root).map_err(|e| UploadError::ReadFailed {
            path: vault_root.clone(),
            source: e,
        })?;
        let workspace = Self {
            vault_root,
            attachment_setting: "/".to_string(),
            active: RwLock::new(None),
        };
        workspace.open(note)?;
        Ok(workspace)
    }

    /// Set the attachment folder rule (`./assets`, `attachments`, `/`).
    pub fn with_attachment_folder(mut self, setting: impl Into<String>) -> Self {
        self.attachment_setting = setting.into();
        self
    }

    /// Make another note the active one.
    pub fn open(&self, note: impl AsRef<Path>) -> Result<(), UploadError> {
        let note = note.as_ref();
        let note = if note.is_absolute() {
            note.to_path_buf()
        } else {
            self.vault_root.join(note)
        };
        let note = std::fs::canonicalize(&note).map_err(|e| UploadError::ReadFailed {
            path: note.clone(),
            source: e,
        })?;
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(note);
        Ok(())
    }

    /// Close the active note.
    pub fn close(&self) {
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    fn active_path(&self) -> Result<PathBuf, UploadError> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(UploadError::NoActiveFile)
    }
}

impl Workspace for FileWorkspace {
    fn active_file(&self) -> Option<String> {
        let path = self.active.read().unwrap_or_else(|e| e.into_inner()).clone()?;
        let relative = path.strip_prefix(&self.vault_root).unwrap_or(&path);
        Some(relative.to_string_lossy().replace('\\', "/"))
    }

    fn active_folder(&self) -> Result<PathBuf, UploadError> {
        let path = self.active_path()?;
        Ok(path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.vault_root.clone()))
    }

    fn get_value(&self) -> Result<String, UploadError> {
        let path = self.active_path()?;
        std::fs::read_to_string(&path).map_err(|e| UploadError::ReadFailed { path, source: e })
    }

    fn set_value(&self, value: &str) -> Result<(), UploadError> {
        let path = self.active_path()?;
        let dir = path.parent().unwrap_or(&self.vault_root);
        let write_err = |e: std::io::Error| UploadError::WriteFailed {
            path: path.clone(),
            source: e,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(value.as_bytes()).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    fn attachment_folder(&self) -> Result<PathBuf, UploadError> {
        let setting = self.attachment_setting.trim();
        if let Some(sub) = setting.strip_prefix("./") {
            Ok(self.active_folder()?.join(sub))
        } else {
            Ok(self.vault_root.join(setting.trim_start_matches('/')))
        }
    }

    fn resolve_local(&self, link_path: &str) -> Option<PathBuf> {
        let decoded = decode_link_path(link_path);
        let target = Path::new(&decoded);

        let mut candidates = Vec::new();
        if target.is_absolute() {
            candidates.push(target.to_path_buf());
        } else {
            if let Ok(folder) = self.active_folder() {
                candidates.push(folder.join(target));
            }
            candidates.push(self.vault_root.join(target));
            if let Ok(attachments) = self.attachment_folder() {
                candidates.push(attachments.join(target));
            }
        }

        candidates
            .into_iter()
            .find(|p| p.is_file())
            .and_then(|p| std::fs::canonicalize(p).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> (tempfile::TempDir, FileWorkspace) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("notes/img")).unwrap();
        std::fs::write(dir.path().join("notes/day.md"), "# Day\n").unwrap();
        std::fs::write(dir.path().join("notes/img/a b.png"), b"png").unwrap();
        std::fs::write(dir.path().join("root.png"), b"png").unwrap();
        let ws = FileWorkspace::new(dir.path(), "notes/day.md").unwrap();
        (dir, ws)
    }

    #[test]
    fn identity_is_vault_relative() {
        let (_dir, ws) = vault();
        assert_eq!(ws.active_file().as_deref(), Some("notes/day.md"));
        ws.close();
        assert_eq!(ws.active_file(), None);
        assert!(matches!(ws.get_value(), Err(UploadError::NoActiveFile)));
        assert!(matches!(
            ensure_same_document(&ws, "notes/day.md"),
            Err(UploadError::DocumentChanged { .. })
        ));
    }

    #[test]
    fn switching_notes_changes_identity() {
        let (dir, ws) = vault();
        std::fs::write(dir.path().join("other.md"), "").unwrap();
        let id = require_active(&ws).unwrap();
        ensure_same_document(&ws, &id).unwrap();
        ws.open("other.md").unwrap();
        let err = ensure_same_document(&ws, &id).unwrap_err();
        assert!(err.to_string().contains("other.md"));
    }

    #[test]
    fn read_and_write() {
        let (_dir, ws) = vault();
        assert_eq!(ws.get_value().unwrap(), "# Day\n");
        ws.set_value("changed").unwrap();
        assert_eq!(ws.get_value().unwrap(), "changed");
    }

    #[test]
    fn attachment_folder_rules() {
        let (_dir, ws) = vault();
        let root = ws.vault_root().to_path_buf();
        assert_eq!(ws.attachment_folder().unwrap(), root);

        let ws = ws.with_attachment_folder("./assets");
        assert_eq!(ws.attachment_folder().unwrap(), root.join("notes/assets"));

        let ws = ws.with_attachment_folder("attachments");
        assert_eq!(ws.attachment_folder().unwrap(), root.join("attachments"));
    }

    #[test]
    fn resolves_encoded_and_root_relative_links() {
        let (_dir, ws) = vault();
        let root = ws.vault_root().to_path_buf();
        assert_eq!(
            ws.resolve_local("img/a%20b.png"),
            Some(root.join("notes/img/a b.png"))
        );
        assert_eq!(ws.resolve_local("root.png"), Some(root.join("root.png")));
        assert_eq!(ws.resolve_local("missing.png"), None);
    }
}
