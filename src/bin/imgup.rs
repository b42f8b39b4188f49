//! CLI binary for image-autoupload.
//!
//! A thin shim over the library crate that maps CLI flags and the plugin's
//! `data.json` to an `UploaderConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image_autoupload::{
    download_all_images, scan, upload_all_images, BatchOutput, BatchProgressCallback,
    FileWorkspace, NamedBlob, Platform, ProgressCallback, SettingsFile, UploadHistory,
    UploaderConfig, UploaderManager, Workspace,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per image.
/// Downloads complete in order but start concurrently, so the bar only
/// advances on completion or error.
struct CliProgressCallback {
    bar: ProgressBar,
    verb: &'static str,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(verb: &'static str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning note…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            verb,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix(self.verb);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{} {total} image(s)…", self.verb))
        ));
    }

    fn on_image_start(&self, _index: usize, _total: usize, source: &str) {
        self.bar.set_message(source.to_string());
    }

    fn on_image_complete(&self, index: usize, total: usize, target: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(target)
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(success_count);
        if failed == 0 {
            eprintln!("{} {} image(s) done", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} image(s) done  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # List the image links of a note
  imgup --vault ~/notes scan daily/today.md

  # Upload local images through the PicGo server and rewrite the links
  imgup --vault ~/notes upload daily/today.md

  # Same, but with PicGo-Core
  imgup --uploader PicGo-Core --picgo-core-path /usr/local/bin/picgo upload today.md

  # Pull web images into ./assets next to the note
  imgup --vault ~/notes --attachments ./assets download daily/today.md

  # Upload whatever is on the clipboard (or the given files, in remote mode)
  imgup clipboard
  imgup --remote-server-mode clipboard shot.png

SETTINGS:
  Defaults come from the plugin's data.json (--settings); flags override it.
  Extended upload results returned by PicList are appended to that file.
"#;

/// Upload and download the images of Markdown notes via PicGo.
#[derive(Parser, Debug)]
#[command(
    name = "imgup",
    version,
    about = "Upload and download the images of Markdown notes via PicGo",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Plugin settings file (data.json).
    #[arg(long, global = true, env = "IMGUP_SETTINGS", default_value = "data.json")]
    settings: PathBuf,

    /// Vault root directory.
    #[arg(long, global = true, env = "IMGUP_VAULT", default_value = ".")]
    vault: PathBuf,

    /// Attachment folder: `./sub` is relative to the note, anything else to the vault.
    #[arg(long, global = true, env = "IMGUP_ATTACHMENTS", default_value = "/")]
    attachments: String,

    /// Uploader: PicGo or PicGo-Core.
    #[arg(long, global = true, env = "IMGUP_UPLOADER")]
    uploader: Option<String>,

    /// PicGo server endpoint.
    #[arg(long, global = true, env = "IMGUP_SERVER")]
    server: Option<String>,

    /// Send image bytes instead of local paths.
    #[arg(long, global = true, env = "IMGUP_REMOTE_SERVER_MODE")]
    remote_server_mode: bool,

    /// PicGo-Core executable.
    #[arg(long, global = true, env = "IMGUP_PICGO_CORE_PATH")]
    picgo_core_path: Option<String>,

    /// Concurrent downloads.
    #[arg(short, long, global = true, env = "IMGUP_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Behave as a mobile host (no subprocesses, no shared filesystem).
    #[arg(long, global = true, env = "IMGUP_MOBILE")]
    mobile: bool,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "IMGUP_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "IMGUP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "IMGUP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "IMGUP_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the image links of a note.
    Scan {
        /// Note path, relative to the vault.
        note: PathBuf,
    },
    /// Upload the local images of a note and rewrite their links.
    Upload {
        /// Note path, relative to the vault.
        note: PathBuf,
    },
    /// Download the network images of a note and rewrite their links.
    Download {
        /// Note path, relative to the vault.
        note: PathBuf,
    },
    /// Upload clipboard content and print the URL.
    Clipboard {
        /// Image files to send as clipboard data (remote server mode).
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let batch = matches!(cli.command, Command::Upload { .. } | Command::Download { .. });
    let show_progress = batch && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Scan needs no backend ────────────────────────────────────────────
    if let Command::Scan { ref note } = cli.command {
        let workspace = open_workspace(&cli, note)?;
        let text = workspace.get_value().context("Failed to read note")?;
        let refs = scan(&text);
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&refs).context("Failed to serialise links")?
            );
        } else {
            for r in &refs {
                println!("{}\t{}\t{}", r.path, r.name, r.source);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let history = Arc::new(
        SettingsFile::open(&cli.settings)
            .with_context(|| format!("Failed to load settings from {:?}", cli.settings))?,
    );
    let verb = match cli.command {
        Command::Download { .. } => "Downloading",
        _ => "Uploading",
    };
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new(verb) as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, &history, progress)?;

    // ── Run ──────────────────────────────────────────────────────────────
    match cli.command {
        Command::Scan { .. } => {}
        Command::Upload { ref note } => {
            let workspace = open_workspace(&cli, note)?;
            let manager = UploaderManager::new(config.clone(), history.clone())
                .context("Failed to create uploader")?;
            let output = upload_all_images(&workspace, &manager, &config)
                .await
                .context("Upload failed")?;
            report(&cli, &output, show_progress)?;
        }
        Command::Download { ref note } => {
            let workspace = open_workspace(&cli, note)?;
            let output = download_all_images(&workspace, &config)
                .await
                .context("Download failed")?;
            report(&cli, &output, show_progress)?;
        }
        Command::Clipboard { ref files } => {
            let manager = UploaderManager::new(config.clone(), history.clone())
                .context("Failed to create uploader")?;
            let mut blobs = Vec::with_capacity(files.len());
            for file in files {
                let data = tokio::fs::read(file)
                    .await
                    .with_context(|| format!("Failed to read {:?}", file))?;
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image.png".to_string());
                blobs.push(NamedBlob::new(name, data));
            }
            let data = if blobs.is_empty() { None } else { Some(blobs.as_slice()) };
            let response = manager
                .upload_by_clipboard(data)
                .await
                .context("Clipboard upload failed")?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&response).context("Failed to serialise output")?
                );
            } else if let Some(url) = response.first_url().filter(|_| response.success) {
                println!("{url}");
            } else {
                anyhow::bail!("Upload failed: {}", response.msg);
            }
        }
    }

    if !cli.quiet && cli.verbose {
        eprintln!(
            "{}",
            dim(&format!(
                "{} history entries in {}",
                history.entries().len(),
                history.path().display()
            ))
        );
    }
    Ok(())
}

fn open_workspace(cli: &Cli, note: &Path) -> Result<FileWorkspace> {
    Ok(FileWorkspace::new(&cli.vault, note)
        .with_context(|| format!("Failed to open {:?} in vault {:?}", note, cli.vault))?
        .with_attachment_folder(cli.attachments.clone()))
}

/// Merge `data.json` with CLI overrides.
fn build_config(
    cli: &Cli,
    settings: &SettingsFile,
    progress: Option<ProgressCallback>,
) -> Result<UploaderConfig> {
    let mut settings = settings.settings();
    if let Some(ref uploader) = cli.uploader {
        settings.uploader = uploader.clone();
    }
    if let Some(ref server) = cli.server {
        settings.upload_server = server.clone();
    }
    if cli.remote_server_mode {
        settings.remote_server_mode = true;
    }
    if let Some(ref path) = cli.picgo_core_path {
        settings.picgo_core_path = path.clone();
    }

    let mut builder = settings.to_builder().context("Invalid settings")?;
    if cli.mobile {
        builder = builder.platform(Platform::Mobile);
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn report(cli: &Cli, output: &BatchOutput, show_progress: bool) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(output).context("Failed to serialise output")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }
    if let Some(ref msg) = output.message {
        eprintln!("{} {}", red("✘"), msg);
    }
    if !show_progress {
        for image in &output.images {
            match (&image.target, &image.error) {
                (Some(target), _) => eprintln!("  {} {}", green("✓"), target),
                (None, Some(e)) => eprintln!("  {} {}", red("✗"), e),
                (None, None) => {}
            }
        }
    }
    eprintln!(
        "{}  {}",
        output.summary().replace('\n', "  "),
        dim(&format!("{}ms", output.stats.duration_ms))
    );
    Ok(())
}
