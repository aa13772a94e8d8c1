//! transpack - Track changed documents and package them for translation.
//!
//! Usage:
//!   transpack milestone ROOT            Record the current state of ROOT
//!   transpack changes ROOT              List files changed since the milestone
//!   transpack pack ROOT --output ZIP    Package the changed files
//!   transpack unpack ZIP DEST           Extract a translated package
//!   transpack info ROOT                 Show the stored milestone
//!   transpack --help                    Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transpack_core::{ProgressChannel, ProgressUpdate, TranspackConfig};
use transpack_milestone::{ChangeDetector, SnapshotStore};
use transpack_ops::ArchiveBuilder;
use transpack_scan::{DirectoryNode, LocalFileNode, ResourceNode};

#[derive(Parser)]
#[command(
    name = "transpack",
    version,
    about = "Track changed documents and package them for translation",
    long_about = "transpack records a milestone of every file reachable from a root \
                  document or directory, reports what changed since, and packages \
                  the changed files into a zip archive for translators."
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate and store a milestone for ROOT
    Milestone {
        /// Root document or directory
        root: PathBuf,
    },

    /// List resources changed since the last milestone
    Changes {
        /// Root document or directory
        root: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Package the changed resources into a zip archive
    Pack {
        /// Root document or directory
        root: PathBuf,

        /// Archive to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Extract a package into a directory
    Unpack {
        /// Archive to read
        archive: PathBuf,

        /// Destination directory
        destination: PathBuf,
    },

    /// Show the milestone stored for ROOT
    Info {
        /// Root document or directory
        root: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => TranspackConfig::load(path)
            .wrap_err_with(|| format!("Invalid configuration {}", path.display()))?,
        None => TranspackConfig::default(),
    };

    match cli.command {
        Command::Milestone { root } => run_milestone(&root, config).await?,
        Command::Changes { root, format } => run_changes(&root, config, format).await?,
        Command::Pack { root, output } => run_pack(&root, &output, config).await?,
        Command::Unpack {
            archive,
            destination,
        } => run_unpack(archive, destination, config).await?,
        Command::Info { root } => run_info(&root, &config)?,
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Build the root node: a directory is walked entry by entry, a file stands alone.
fn root_node(path: &Path, config: &TranspackConfig) -> Result<Arc<dyn ResourceNode>> {
    let metadata =
        std::fs::metadata(path).wrap_err_with(|| format!("Invalid root {}", path.display()))?;

    if metadata.is_dir() {
        let node = DirectoryNode::new(path)
            .and_then(|node| node.with_follow_symlinks(config.follow_symlinks))
            .wrap_err("Invalid root directory")?
            .with_exclusions([config.staging_dir_name.clone()]);
        Ok(Arc::new(node))
    } else {
        Ok(Arc::new(LocalFileNode::new(path).wrap_err("Invalid root document")?))
    }
}

/// Run a blocking core operation while rendering its progress.
///
/// Ctrl-C cancels the operation at its next poll point. Returns the result
/// together with any failures reported through the channel.
async fn run_blocking<T, F>(op: F) -> Result<(T, Vec<String>)>
where
    T: Send + 'static,
    F: FnOnce(ProgressChannel) -> Result<T> + Send + 'static,
{
    let token = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = ProgressChannel::with_token(token.clone()).with_sink(Arc::new(tx));

    let mut task = tokio::task::spawn_blocking(move || op(channel));
    let mut failures = Vec::new();

    loop {
        tokio::select! {
            result = &mut task => {
                while let Ok(update) = rx.try_recv() {
                    render_update(update, &mut failures);
                }
                let value = result.wrap_err("Worker task failed")??;
                return Ok((value, failures));
            }
            Some(update) = rx.recv() => render_update(update, &mut failures),
            Ok(()) = tokio::signal::ctrl_c(), if !token.is_cancelled() => {
                eprintln!("Canceling...");
                token.cancel();
            }
        }
    }
}

fn render_update(update: ProgressUpdate, failures: &mut Vec<String>) {
    match update {
        ProgressUpdate::Progress(event) => eprintln!("{event}"),
        ProgressUpdate::Done => tracing::debug!("operation complete"),
        ProgressUpdate::Failed(message) => failures.push(message),
    }
}

/// Generate and store a milestone.
async fn run_milestone(root: &Path, config: TranspackConfig) -> Result<()> {
    let node = root_node(root, &config)?;
    let detector = ChangeDetector::from_config(&config)?;
    let path = detector
        .store()
        .snapshot_path(&ChangeDetector::root_path(node.as_ref())?);

    let (snapshot, _) = run_blocking(move |channel| {
        detector
            .generate_milestone(node.as_ref(), &channel)
            .wrap_err("Failed to generate milestone")
    })
    .await?;

    println!(
        "Milestone of {} resource(s) written to {}",
        snapshot.len(),
        path.display()
    );
    Ok(())
}

/// List changed resources.
async fn run_changes(root: &Path, config: TranspackConfig, format: OutputFormat) -> Result<()> {
    let node = root_node(root, &config)?;
    let detector = ChangeDetector::from_config(&config)?;

    let (changes, _) = run_blocking(move |channel| {
        detector
            .collect_changes(node.as_ref(), &channel)
            .wrap_err("Failed to collect changes")
    })
    .await?;

    match format {
        OutputFormat::Text => {
            if changes.is_empty() {
                println!("No changes since the last milestone ({} examined).", changes.examined);
            } else {
                println!("{} of {} resource(s) changed:", changes.len(), changes.examined);
                for path in changes.relative_paths() {
                    println!("  {path}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&changes)?);
        }
    }

    Ok(())
}

/// Collect changes and package them.
async fn run_pack(root: &Path, output: &Path, config: TranspackConfig) -> Result<()> {
    let node = root_node(root, &config)?;
    let detector = ChangeDetector::from_config(&config)?;
    let builder = ArchiveBuilder::from_config(&config);
    let output = output.to_path_buf();
    let destination = output.clone();

    let (result, _) = run_blocking(move |channel| {
        let changes = detector
            .collect_changes(node.as_ref(), &channel)
            .wrap_err("Failed to collect changes")?;

        let source_dir = match changes.base.clone() {
            Some(base) => base,
            None => ChangeDetector::root_path(node.as_ref())?
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };

        builder
            .pack(&source_dir, &changes.relative_paths(), &destination, &channel)
            .wrap_err_with(|| format!("Failed to write {}", destination.display()))
    })
    .await?;

    if result.packaged == 0 && result.uncopyable.is_empty() {
        println!("No changes to package.");
        return Ok(());
    }

    let size = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
    println!(
        "{} -> {} ({})",
        result.summary(),
        output.display(),
        format_size(size)
    );
    for entry in &result.uncopyable {
        println!("  not copied: {entry}");
    }

    Ok(())
}

/// Extract a package.
async fn run_unpack(archive: PathBuf, destination: PathBuf, config: TranspackConfig) -> Result<()> {
    let builder = ArchiveBuilder::from_config(&config);
    let target = destination.clone();

    let (files, failures) = run_blocking(move |channel| {
        builder
            .unpack(&archive, &target, &channel)
            .wrap_err("Extraction canceled")
    })
    .await?;

    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("error: {failure}");
        }
        bail!("Extraction failed");
    }

    println!("Extracted {} file(s) to {}", files.len(), destination.display());
    Ok(())
}

/// Show the stored milestone.
fn run_info(root: &Path, config: &TranspackConfig) -> Result<()> {
    let node = root_node(root, config)?;
    let root_path = ChangeDetector::root_path(node.as_ref())?;
    let store = SnapshotStore::from_config(config);
    let path = store.snapshot_path(&root_path);

    let created = store
        .created_at(&root_path)
        .wrap_err_with(|| format!("Cannot read milestone for {}", root.display()))?;
    println!("Milestone: {}", path.display());
    println!("Created:   {created}");

    let snapshot = store.load(&root_path)?;
    println!("Entries:   {}", snapshot.len());

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
