//! PicGo-Core command line backend.
//!
//! Runs `<picgo> upload <path…>` with each path passed as its own argument
//! (no shell), waits for exit and buffers stdout. PicGo-Core prints the hosted
//! URLs as the last lines of its output, one per input, in input order; any
//! failure is announced with a `PicGo ERROR` line.

use super::{UploadItem, Uploader};
use crate::assets::last_image;
use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::output::UploadResponse;
use crate::pipeline::multipart::NamedBlob;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Marker PicGo-Core prints when an upload fails.
pub const ERROR_MARKER: &str = "PicGo ERROR";

/// Uploads by invoking the PicGo-Core executable.
#[derive(Debug)]
pub struct PicGoCoreUploader {
    config: UploaderConfig,
}

/// Buffered result of one PicGo-Core run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl PicGoCoreUploader {
    pub fn new(config: UploaderConfig) -> Self {
        Self { config }
    }

    fn ensure_desktop(&self) -> Result<(), UploadError> {
        if self.config.platform.is_mobile() {
            return Err(UploadError::UnsupportedPlatform {
                reason: "PicGo-Core needs a desktop host; Mobile App must use remote server mode."
                    .to_string(),
            });
        }
        Ok(())
    }

    async fn run(&self, args: Vec<String>) -> Result<CliOutput, UploadError> {
        let program = self.config.picgo_core_command().to_string();
        let secs = self.config.cli_timeout_secs;
        debug!("Running {} {:?}", program, args);

        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(secs), child)
            .await
            .map_err(|_| UploadError::ProcessTimeout {
                program: program.clone(),
                secs,
            })?
            .map_err(|e| UploadError::ProcessSpawn {
                program: program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            warn!("{} exited with {}", program, output.status);
        }
        Ok(CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }
}

#[async_trait]
impl Uploader for PicGoCoreUploader {
    fn name(&self) -> &'static str {
        "PicGo-Core"
    }

    async fn upload(&self, items: &[UploadItem]) -> Result<UploadResponse, UploadError> {
        self.ensure_desktop()?;
        if items.is_empty() {
            return Ok(UploadResponse::success(Vec::new()));
        }

        info!("Uploading {} image(s) with PicGo-Core", items.len());
        let mut args = vec!["upload".to_string()];
        args.extend(
            items
                .iter()
                .map(|i| i.file().to_string_lossy().into_owned()),
        );
        let output = self.run(args).await?;
        Ok(parse_upload_output(&output, items.len()))
    }

    async fn upload_by_clipboard(
        &self,
        data: Option<&[NamedBlob]>,
    ) -> Result<UploadResponse, UploadError> {
        self.ensure_desktop()?;
        if data.is_some() {
            debug!("PicGo-Core reads the system clipboard itself; ignoring host data");
        }
        let output = self.run(vec!["upload".to_string()]).await?;
        Ok(parse_clipboard_output(&output))
    }
}

// ── Output convention ────────────────────────────────────────────────────

fn raw_output(output: &CliOutput) -> String {
    if output.stderr.trim().is_empty() {
        output.stdout.clone()
    } else {
        format!("{}\n{}", output.stdout.trim_end(), output.stderr.trim_end())
    }
}

/// Extract `count` URLs from the output of `picgo upload <paths…>`.
pub fn parse_upload_output(output: &CliOutput, count: usize) -> UploadResponse {
    if !output.success || output.stdout.contains(ERROR_MARKER) {
        return UploadResponse::failure(raw_output(output));
    }

    let lines: Vec<&str> = output.stdout.trim_end().lines().collect();
    if lines.len() < count {
        return UploadResponse::failure(format!(
            "expected {} URL line(s) from PicGo-Core, got {}\n{}",
            count,
            lines.len(),
            output.stdout
        ));
    }

    let urls = lines[lines.len() - count..]
        .iter()
        .map(|l| l.trim().to_string())
        .collect();
    UploadResponse::success(urls)
}

/// Pick the uploaded URL from the output of a bare `picgo upload`.
pub fn parse_clipboard_output(output: &CliOutput) -> UploadResponse {
    if output.success {
        if let Some(url) = last_image(output.stdout.lines()) {
            return UploadResponse::success(vec![url]);
        }
    }
    UploadResponse::failure(format!(
        "Please check PicGo-Core config\n{}",
        raw_output(output)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Platform;
    use std::path::PathBuf;

    fn out(stdout: &str) -> CliOutput {
        CliOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            success: true,
        }
    }

    #[test]
    fn takes_last_lines_in_order() {
        let stdout = "[PicGo INFO]: Before transform\n\
                      [PicGo INFO]: Uploading...\n\
                      [PicGo SUCCESS]:\n\
                      https://cdn/a.png\n\
                      https://cdn/b.png  \n";
        let r = parse_upload_output(&out(stdout), 2);
        assert!(r.success);
        assert_eq!(r.result, vec!["https://cdn/a.png", "https://cdn/b.png"]);
    }

    #[test]
    fn error_marker_is_failure_with_raw_output() {
        let stdout = "[PicGo ERROR]: upload failed\nhttps://cdn/a.png\n";
        let r = parse_upload_output(&out(stdout), 1);
        assert!(!r.success);
        assert!(r.msg.contains("PicGo ERROR"));
    }

    #[test]
    fn short_output_is_failure() {
        let r = parse_upload_output(&out("https://cdn/a.png\n"), 3);
        assert!(!r.success);
        assert!(r.msg.contains("expected 3"));
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let output = CliOutput {
            stdout: "https://cdn/a.png\n".into(),
            stderr: "boom".into(),
            success: false,
        };
        let r = parse_upload_output(&output, 1);
        assert!(!r.success);
        assert!(r.msg.contains("boom"));
    }

    #[test]
    fn clipboard_picks_last_image_line() {
        let stdout = "[PicGo SUCCESS]:\nhttps://cdn/first.png\nhttps://cdn/last.jpg\nDone\n";
        let r = parse_clipboard_output(&out(stdout));
        assert_eq!(r.first_url(), Some("https://cdn/last.jpg"));

        let r = parse_clipboard_output(&out("[PicGo WARN]: nothing in clipboard\n"));
        assert!(!r.success);
        assert!(r.msg.starts_with("Please check PicGo-Core config\n"));
        assert!(r.msg.contains("nothing in clipboard"));
    }

    #[tokio::test]
    async fn mobile_is_rejected() {
        let config = UploaderConfig::builder()
            .platform(Platform::Mobile)
            .build()
            .unwrap();
        let up = PicGoCoreUploader::new(config);
        let err = up
            .upload(&[UploadItem::Path(PathBuf::from("/a.png"))])
            .await
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(up.upload_by_clipboard(None).await.unwrap_err().is_precondition());
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use once_cell::sync::Lazy;
        use std::os::unix::fs::PermissionsExt;

        // Writing an executable while another thread forks can fail with
        // ETXTBSY; keep script creation and spawning serialized.
        static SPAWN: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

        fn script(dir: &std::path::Path, body: &str) -> String {
            let path = dir.join("picgo");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn uploader(path: String, timeout: u64) -> PicGoCoreUploader {
            PicGoCoreUploader::new(
                UploaderConfig::builder()
                    .picgo_core_path(path)
                    .cli_timeout_secs(timeout)
                    .build()
                    .unwrap(),
            )
        }

        #[tokio::test]
        async fn missing_executable_is_spawn_error() {
            let _guard = SPAWN.lock().await;
            let err = uploader("/definitely/not/a/picgo".to_string(), 10)
                .upload(&[UploadItem::Path(PathBuf::from("/a.png"))])
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::ProcessSpawn { .. }));
        }

        #[tokio::test]
        async fn passes_paths_as_separate_arguments() {
            let _guard = SPAWN.lock().await;
            let dir = tempfile::tempdir().unwrap();
            // Echo one fake URL per argument after "upload".
            let exe = script(
                dir.path(),
                r#"echo "[PicGo SUCCESS]:"
shift
for f in "$@"; do echo "https://cdn/$(basename "$f")"; done"#,
            );
            let items = vec![
                UploadItem::Path(PathBuf::from("/vault/my cat.png")),
                UploadItem::Path(PathBuf::from("/vault/dog.jpg")),
            ];
            let r = uploader(exe, 10).upload(&items).await.unwrap();
            assert!(r.success, "{}", r.msg);
            assert_eq!(r.result, vec!["https://cdn/my cat.png", "https://cdn/dog.jpg"]);
        }

        #[tokio::test]
        async fn error_output_from_tool() {
            let _guard = SPAWN.lock().await;
            let dir = tempfile::tempdir().unwrap();
            let exe = script(dir.path(), r#"echo "[PicGo ERROR]: no uploader configured""#);
            let r = uploader(exe, 10)
                .upload(&[UploadItem::Path(PathBuf::from("/a.png"))])
                .await
                .unwrap();
            assert!(!r.success);
            assert!(r.msg.contains("no uploader configured"));
        }

        #[tokio::test]
        async fn clipboard_upload() {
            let _guard = SPAWN.lock().await;
            let dir = tempfile::tempdir().unwrap();
            let exe = script(
                dir.path(),
                r#"echo "[PicGo SUCCESS]:"; echo "https://cdn/clip.png""#,
            );
            let r = uploader(exe, 10).upload_by_clipboard(None).await.unwrap();
            assert_eq!(r.first_url(), Some("https://cdn/clip.png"));
        }

        #[tokio::test]
        async fn slow_tool_times_out() {
            let _guard = SPAWN.lock().await;
            let dir = tempfile::tempdir().unwrap();
            let exe = script(dir.path(), "sleep 5");
            let err = uploader(exe, 1)
                .upload(&[UploadItem::Path(PathBuf::from("/a.png"))])
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::ProcessTimeout { secs: 1, .. }));
        }
    }
}
