//! # Files CLI
//!
//! Command-line front end for the files controller, talking to a node's
//! `files/*` RPC API.
//!
//! ## Usage
//!
//! ```bash
//! # List a folder
//! files-cli ls /photos --sort size
//!
//! # Download two entries as one archive
//! files-cli download /photos/a.jpg /photos/trip -o ./downloads
//!
//! # Rename, share, delete
//! files-cli rename /docs/draft.md final.md
//! files-cli share /docs/final.md
//! files-cli rm /tmp/old /tmp/older.txt
//!
//! # Upload local files and folders
//! files-cli add ./report.pdf ./assets -d /docs
//! ```
//!
//! ## Configuration
//!
//! Node endpoints come from `--config <file.json>`, then `--api-url` /
//! `--gateway-url`, which also read `FILES_API_URL` / `FILES_GATEWAY_URL`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use files_controller::{
    path, DirectoryEntry, DownloadToggle, FilesController, NodeClient, NodeConfig, Notification,
    ShareLink, SortBy, TransferOutcome, UploadEntry,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit code indicating successful completion.
const EXIT_SUCCESS: u8 = 0;
/// Exit code indicating a general error occurred.
const EXIT_ERROR: u8 = 1;

// =============================================================================
// CLI Definition
// =============================================================================

#[derive(Parser)]
#[command(name = "files-cli")]
#[command(author, version, about = "Browse and manage the file tree of a remote node")]
struct Cli {
    /// Enable verbose logging (can also use RUST_LOG env var)
    #[arg(short, long)]
    verbose: bool,

    /// JSON config file with node endpoints
    #[arg(short, long, env = "FILES_CONFIG")]
    config: Option<String>,

    /// Node RPC API base URL
    #[arg(long, env = "FILES_API_URL")]
    api_url: Option<String>,

    /// Gateway base URL used for downloads
    #[arg(long, env = "FILES_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Number of parallel uploads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortKey {
    Name,
    Size,
}

#[derive(Subcommand)]
enum Commands {
    /// List folder contents
    Ls {
        #[arg(default_value = "/")]
        path: String,

        /// Sort key
        #[arg(long, value_enum, default_value = "name")]
        sort: SortKey,

        /// Sort descending
        #[arg(long)]
        desc: bool,
    },

    /// Download entries as a single file or archive
    Download {
        paths: Vec<String>,

        /// Local destination folder
        #[arg(short = 'o', long, default_value = ".")]
        local_path: String,
    },

    /// Print a public link for entries
    Share { paths: Vec<String> },

    /// Rename an entry in place
    Rename { path: String, new_name: String },

    /// Delete entries
    Rm {
        paths: Vec<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Create a folder
    Mkdir {
        name: String,

        /// Parent folder
        #[arg(short = 'd', long, default_value = "/")]
        remote_path: String,
    },

    /// Upload local files or folders
    Add {
        files: Vec<String>,

        /// Remote folder path
        #[arg(short = 'd', long, default_value = "/")]
        remote_path: String,
    },

    /// Link existing content (e.g. /ipfs/<cid>) into a folder
    Import {
        source: String,

        #[arg(short = 'd', long, default_value = "/")]
        remote_path: String,
    },

    /// Move an entry
    Mv { from: String, to: String },

    /// Print the explorer route of an entry
    Inspect { path: String },
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(file) => NodeConfig::load_from_file(file)
            .with_context(|| format!("Failed to load config {file}"))?,
        None => NodeConfig::default(),
    };
    if let Some(url) = &cli.api_url {
        config.api_url.clone_from(url);
    }
    if let Some(url) = &cli.gateway_url {
        config.gateway_url.clone_from(url);
    }
    Ok(config)
}

fn format_size(size: u64) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}

/// Looks up each remote path so the controller gets a typed selection.
async fn select(client: &NodeClient, paths: &[String]) -> anyhow::Result<Vec<DirectoryEntry>> {
    if paths.is_empty() {
        bail!("No paths given");
    }
    let mut selection = Vec::with_capacity(paths.len());
    for p in paths {
        let entry = client
            .stat_entry(p)
            .await
            .with_context(|| format!("Cannot select {p}"))?;
        if !selection.iter().any(|e: &DirectoryEntry| e.path == entry.path) {
            selection.push(entry);
        }
    }
    Ok(selection)
}

/// Collects (remote relative path, local file) pairs, keeping folder names.
fn collect_uploads(files: &[String]) -> anyhow::Result<Vec<UploadEntry>> {
    let mut entries = Vec::new();
    for file in files {
        let local = Path::new(file);
        if !local.exists() {
            eprintln!("✗ Not found: {file}");
            continue;
        }
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {file}"))?;

        if local.is_dir() {
            println!("📁 Scanning directory: {file}");
            for entry in walkdir::WalkDir::new(local).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(local)?;
                let relative = relative.to_string_lossy().replace('\\', "/");
                entries.push(UploadEntry::local(path::resolve(name, &relative), entry.path()));
            }
        } else {
            entries.push(UploadEntry::local(name, local));
        }
    }
    Ok(entries)
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    eprintln!("⚠️  {prompt}");
    eprint!("Type 'yes' to confirm: ");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("yes"))
}

fn drain_notifications(rx: &mut UnboundedReceiver<Notification>) {
    while let Ok(notification) = rx.try_recv() {
        match notification {
            Notification::OperationFailed { op, message } => eprintln!("✗ {op} failed: {message}"),
            Notification::FetchFailed { path, message } => eprintln!("✗ Could not list {path}: {message}"),
            Notification::DownloadFinished { filename } => println!("✓ Downloaded {filename}"),
            Notification::DownloadFailed { message } => eprintln!("✗ Download failed: {message}"),
            Notification::ShareFailed { message } => eprintln!("✗ Share failed: {message}"),
        }
    }
}

/// Application entry point.
#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Main application logic.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("files_controller=debug,files_cli=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("files_controller=warn,files_cli=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let config = load_config(&cli)?;
    let client = NodeClient::new(&config, cli.workers);

    match cli.command {
        Commands::Ls { path, sort, desc } => {
            let (mut controller, mut rx) = FilesController::new(client);
            let by = match sort {
                SortKey::Name => SortBy::Name,
                SortKey::Size => SortBy::Size,
            };
            controller.update_sorting(by);
            if desc {
                controller.update_sorting(by);
            }
            let mounted = controller.mount(&path).await;
            drain_notifications(&mut rx);
            mounted?;

            let Some(listing) = controller.listing() else {
                return Ok(());
            };
            if !listing.is_dir() {
                println!("{} (file, {})", listing.path, listing.hash.as_deref().unwrap_or("-"));
                return Ok(());
            }
            if listing.is_empty() {
                println!("Folder '{path}' is empty");
                return Ok(());
            }

            println!("\nContents of '{path}':");
            if !listing.is_root() {
                println!("(parent: {})", path::parent(&listing.path));
            }
            println!();
            println!("{:<10} {:<40} {:<15}", "Type", "Name", "Size");
            println!("{}", "-".repeat(70));
            for item in controller.sorted_entries() {
                let item_type = if item.is_dir() { "DIR" } else { "FILE" };
                let size_str = item.size.map_or_else(|| "-".to_string(), format_size);
                println!("{:<10} {:<40} {:<15}", item_type, item.name(), size_str);
            }
            println!();
            Ok(())
        }

        Commands::Download { paths, local_path } => {
            let mut client = client;
            client.set_download_dir(&local_path);
            let selection = select(&client, &paths).await?;
            let (mut controller, mut rx) = FilesController::new(client);
            let result = download(&mut controller, &selection).await;
            drain_notifications(&mut rx);
            result
        }

        Commands::Share { paths } => {
            let selection = select(&client, &paths).await?;
            let (mut controller, mut rx) = FilesController::new(client);
            let shared = controller.share(&selection).await;
            drain_notifications(&mut rx);
            if let ShareLink::Ready(link) = shared? {
                println!("{link}");
            }
            controller.close_share();
            Ok(())
        }

        Commands::Rename { path, new_name } => {
            let selection = select(&client, &[path]).await?;
            let (mut controller, mut rx) = FilesController::new(client);
            controller.show_rename(&selection)?;
            let from = controller.rename_modal().payload().path.clone();
            let result = match controller.submit_rename(&new_name) {
                Some(op) => op.await.map(|()| {
                    println!("✓ Renamed {from} -> {}", path::replace_basename(&from, &new_name));
                }),
                None => {
                    println!("Nothing to rename");
                    Ok(())
                }
            };
            drain_notifications(&mut rx);
            result?;
            Ok(())
        }

        Commands::Rm { paths, yes } => {
            let selection = select(&client, &paths).await?;
            let (mut controller, mut rx) = FilesController::new(client);
            controller.show_delete(&selection)?;

            let prompt = {
                let payload = controller.delete_modal().payload();
                format!(
                    "Delete {} file(s) and {} folder(s)? Folders are removed with their contents.",
                    payload.files, payload.folders
                )
            };
            if !yes && !confirm(&prompt)? {
                controller.cancel_delete();
                println!("Aborted.");
                return Ok(());
            }

            let result = match controller.confirm_delete() {
                Some(op) => op.await,
                None => Ok(()),
            };
            drain_notifications(&mut rx);
            result?;
            println!("✓ Deleted {} entries", selection.len());
            Ok(())
        }

        Commands::Mkdir { name, remote_path } => {
            let (mut controller, mut rx) = FilesController::new(client);
            let result = async {
                controller.mount(&remote_path).await?;
                controller.make_dir(&name).await
            }
            .await;
            drain_notifications(&mut rx);
            result?;
            println!("✓ Created folder: {}", path::resolve(&remote_path, &name));
            Ok(())
        }

        Commands::Add { files, remote_path } => {
            let entries = collect_uploads(&files)?;
            if entries.is_empty() {
                bail!("No files to upload");
            }
            let count = entries.len();
            println!("\n📤 Uploading {count} files...\n");

            let (mut controller, mut rx) = FilesController::new(client);
            let mounted = controller.mount(&remote_path).await;
            if mounted.is_err() {
                drain_notifications(&mut rx);
            }
            mounted?;

            let bar = ProgressBar::new(100);
            bar.set_style(ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")?);
            let upload = controller.add(entries, "");
            tokio::pin!(upload);
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            let result = loop {
                tokio::select! {
                    result = &mut upload => break result,
                    _ = ticker.tick() => {
                        if let Some(progress) = controller.write_progress() {
                            bar.set_position(progress);
                        }
                    }
                }
            };
            match &result {
                Ok(()) => bar.finish_and_clear(),
                Err(_) => bar.abandon(),
            }
            drain_notifications(&mut rx);
            result?;
            println!("✓ Upload complete: {count} files");
            Ok(())
        }

        Commands::Import { source, remote_path } => {
            let (mut controller, mut rx) = FilesController::new(client);
            let result = async {
                controller.mount(&remote_path).await?;
                controller.add_by_path(&source).await
            }
            .await;
            drain_notifications(&mut rx);
            result?;
            println!("✓ Imported {source} into {remote_path}");
            Ok(())
        }

        Commands::Mv { from, to } => {
            let (controller, mut rx) = FilesController::new(client);
            let result = controller.move_entries(&from, &to).await;
            drain_notifications(&mut rx);
            result?;
            println!("✓ Moved: {from} -> {to}");
            Ok(())
        }

        Commands::Inspect { path } => {
            let selection = select(&client, &[path]).await?;
            let (controller, _rx) = FilesController::new(client);
            match controller.inspect(&selection) {
                Some(route) => println!("{route}"),
                None => bail!("Entry has no content hash"),
            }
            Ok(())
        }
    }
}

/// Runs one download to the end, cancelling it on Ctrl-C.
async fn download(
    controller: &mut FilesController<NodeClient>,
    selection: &[DirectoryEntry],
) -> anyhow::Result<()> {
    let DownloadToggle::Started { filename } = controller.toggle_download(selection).await? else {
        return Ok(());
    };

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_millis(100));

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                if controller.cancel_download() {
                    bar.abandon_with_message(format!("Cancelled {filename}"));
                    bail!("Download cancelled");
                }
                // Ended before the signal arrived; keep what was written.
                match controller.wait_download().await {
                    Some(outcome) => break outcome,
                    None => bail!("Download cancelled"),
                }
            }
            _ = ticker.tick() => {
                if let Some(outcome) = controller.reap_download() {
                    break outcome;
                }
                if let Some(progress) = controller.download_state().progress {
                    bar.set_message(format!("{filename}: {progress}"));
                }
            }
        }
    };

    match outcome {
        TransferOutcome::Completed => {
            bar.finish_with_message(format!("{filename} done"));
            Ok(())
        }
        TransferOutcome::Failed(message) => {
            bar.abandon_with_message(format!("{filename} failed"));
            bail!("Download failed: {message}")
        }
        TransferOutcome::Cancelled => bail!("Download cancelled"),
    }
}
