//! Modlayer CLI - inspect and export a resolved overlay namespace.
//!
//! Builds a one-shot overlay from the given sources (registration order
//! decides override precedence: directories first, then archives) and
//! either lists the merged namespace or exports every resolved asset to an
//! output directory.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use modlayer::{
    ArchiveSource, DirectorySource, Overlay, OverlayConfig, SourceId,
};

#[derive(Parser)]
#[command(
    name = "modlayer",
    about = "Inspect and export a merged mod content namespace",
    version
)]
struct Cli {
    /// Directory sources, in override order (later wins).
    #[arg(long = "dir", value_name = "PATH", global = true)]
    dirs: Vec<PathBuf>,

    /// Zip archive sources, registered after directories (later wins).
    #[arg(long = "zip", value_name = "PATH", global = true)]
    zips: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every record in the merged namespace.
    List {
        /// Emit machine-readable JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Write every resolved asset to an output directory.
    Export {
        /// Output directory (created if missing).
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.dirs.is_empty() && cli.zips.is_empty() {
        return Err("no sources given; pass at least one --dir or --zip".into());
    }

    // One-shot tool: no file watching needed.
    let config = OverlayConfig {
        watch_sources: false,
        ..OverlayConfig::default()
    };
    let overlay = Overlay::start(config)?;

    for (index, dir) in cli.dirs.iter().enumerate() {
        let source = Arc::new(DirectorySource::new(
            SourceId::new(format!("dir-{}", index)),
            dir,
        ));
        let stats = overlay.register_source(source)?;
        info!(dir = %dir.display(), entries = stats.entries, "registered directory source");
    }
    for (index, zip) in cli.zips.iter().enumerate() {
        let source = Arc::new(ArchiveSource::new(
            SourceId::new(format!("zip-{}", index)),
            zip,
        ));
        let stats = overlay.register_source(source)?;
        info!(zip = %zip.display(), entries = stats.entries, "registered archive source");
    }

    match cli.command {
        Command::List { json } => list(&overlay, json)?,
        Command::Export { out } => export(&overlay, &out)?,
    }

    let metrics = overlay.metrics();
    if metrics.conflicts > 0 {
        info!(conflicts = metrics.conflicts, "override conflicts resolved (later source wins)");
    }

    overlay.shutdown();
    Ok(())
}

#[derive(serde::Serialize)]
struct ListEntry {
    path: String,
    kind: String,
    format: String,
    source: String,
}

fn list(overlay: &Overlay, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let mut entries = Vec::new();
        overlay.for_each_asset(|record| {
            entries.push(ListEntry {
                path: record.path.as_str().to_string(),
                kind: record.kind.to_string(),
                format: record.format.clone(),
                source: record.source.to_string(),
            });
        });
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        overlay.for_each_asset(|record| {
            println!("{:<16} {:<8} {}", record.kind.to_string(), record.source, record.path);
        });
    }
    Ok(())
}

fn export(overlay: &Overlay, out: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut exported = 0usize;
    let mut failed = 0usize;

    let mut result: Result<(), Box<dyn std::error::Error>> = Ok(());
    overlay.for_each_asset(|record| {
        if record.is_directory() || result.is_err() {
            return;
        }
        let target = out.join(record.path.as_str());
        if let Some(parent) = target.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                result = Err(Box::new(err));
                return;
            }
        }
        match record.accessor.read_bytes() {
            Ok(bytes) => match std::fs::write(&target, &bytes) {
                Ok(()) => exported += 1,
                Err(err) => {
                    result = Err(Box::new(err));
                }
            },
            Err(err) => {
                warn!(path = %record.path, error = %err, "skipping unreadable asset");
                failed += 1;
            }
        }
    });
    result?;

    info!(exported, failed, out = %out.display(), "export complete");
    Ok(())
}
