//! Media Protector - CLI
//!
//! Command-line interface for protecting, listing and streaming media.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use media_protector::scan::scan_media;
use media_protector::{BatchHandle, DisplaySlot, MediaProtector, ProtectorConfig, ScanMode};

#[derive(Parser)]
#[command(name = "mprot")]
#[command(version = media_protector::VERSION)]
#[command(about = "Media Protector - hide photos and videos, preview them in place")]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Protect files (directories are scanned for media)
    Protect {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Unprotect containers in place
    Unprotect {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Export plaintext copies of containers
    Export {
        /// Destination folder
        #[arg(long)]
        to: PathBuf,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List media below a folder
    List {
        root: PathBuf,

        /// List containers instead of plain media
        #[arg(short, long)]
        protected: bool,
    },

    /// Show container details
    Inspect {
        container: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the logical bytes of a file to stdout
    Cat {
        path: PathBuf,

        #[arg(long, default_value_t = 0)]
        offset: u64,

        #[arg(long)]
        length: Option<u64>,
    },

    /// Decode a preview and save it as an image
    Thumb {
        path: PathBuf,
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ProtectorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ProtectorConfig::default(),
    };
    let protector = MediaProtector::from_config(config)?;

    match cli.command {
        Commands::Protect { paths } => {
            let files = expand(&paths, ScanMode::Plain);
            println!("🔐 Protecting {} file(s)...", files.len());
            report(protector.protect_files(files)?)?;
        }

        Commands::Unprotect { paths } => {
            let files = expand(&paths, ScanMode::Protected);
            println!("🔓 Unprotecting {} file(s)...", files.len());
            report(protector.unprotect_files(files)?)?;
        }

        Commands::Export { to, paths } => {
            let files = expand(&paths, ScanMode::Protected);
            println!("📤 Exporting {} file(s) to {}...", files.len(), to.display());
            report(protector.export_files(files, &to)?)?;
        }

        Commands::List { root, protected } => {
            let files = if protected {
                protector.list_protected(&root)
            } else {
                protector.list_plain(&root)
            };

            if files.is_empty() {
                println!("📭 Nothing found under {}", root.display());
            } else {
                for file in files {
                    println!("{}", file.display());
                }
            }
        }

        Commands::Inspect { container, json } => {
            let info = protector.inspect(&container)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("📦 {}", info.path.display());
                println!("{:-<40}", "");
                println!("Nonce:           {}", info.nonce);
                println!("Container size:  {} bytes", info.container_size);
                println!("Logical size:    {} bytes", info.logical_size);
                println!("Media kind:      {:?}", info.kind);
            }
        }

        Commands::Cat { path, offset, length } => {
            let mut source = protector.open_source(&path)?;
            source.seek(SeekFrom::Start(offset))?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            match length {
                Some(length) => io::copy(&mut source.take(length), &mut out)?,
                None => io::copy(&mut source, &mut out)?,
            };
            out.flush()?;
        }

        Commands::Thumb { path, output } => {
            let slot = DisplaySlot::new();
            protector.request_preview(&path, &slot);

            let preview = match slot.wait_for_preview(Duration::from_secs(30)) {
                Some(preview) => preview,
                None => bail!("no preview could be decoded from {}", path.display()),
            };
            preview
                .image()
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;

            let (width, height) = preview.dimensions();
            println!("🖼️ Preview {}x{} written to {}", width, height, output.display());
        }
    }

    protector.shutdown();
    Ok(())
}

/// Replace directories by the matching files below them
fn expand(paths: &[PathBuf], mode: ScanMode) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(scan_media(path, mode));
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn report(handle: BatchHandle) -> anyhow::Result<()> {
    let summary = handle.wait_with(|done, total| {
        eprint!("\r   {}/{}", done, total);
    })?;
    eprintln!();

    println!("✅ {} succeeded", summary.succeeded);
    if !summary.is_clean() {
        println!("⚠️ {} failed (see log)", summary.failed);
    }
    Ok(())
}

