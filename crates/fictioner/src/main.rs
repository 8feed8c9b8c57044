//! fictioner - Check that every question in a manuscript gets answered
//!
//! fictioner reads `fiction.json` to put a workspace's files in document
//! order, collects `<!-- #tag? -->` / `<!-- #tag! -->` annotations and
//! reports questions that are never answered, answered too early, or
//! answered twice.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use fictioner::engine::{Engine, ScanOutcome};
use fictioner::output::{OutputFormat, render_check, render_lines, render_related, render_tree};
use fictioner::watcher::{CorpusWatcher, DEBOUNCE, next_batch};
use fictioner_core::{Cursor, FictionConfig, Snapshot};
use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fictioner")]
#[command(about = "Cross-reference checking for manuscripts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Workspace root (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Path to config file (default: <root>/fiction.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the corpus and report tag problems (exit 1 on errors)
    Check {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Also list plain mentions
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print sections, files and their tags in document order
    Tree,

    /// Print the tags related to a cursor position
    Related {
        /// File containing the cursor
        file: PathBuf,

        /// Line number (1-based)
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        line: u64,

        /// Column (1-based)
        #[arg(default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        column: u64,
    },

    /// Print every tag identifier, sorted
    Ids,

    /// Print corpus files in document order
    Files {
        /// Print paths relative to the workspace root
        #[arg(long)]
        relative: bool,
    },

    /// Rescan and report whenever the corpus or config changes
    Watch,

    /// Write a starter config named after the workspace directory
    Init,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().wrap_err("Failed to get current directory")?,
    };
    let root = root
        .canonicalize()
        .wrap_err_with(|| format!("Failed to resolve workspace root {}", root.display()))?;
    let config_path = fictioner::config_path(&root, cli.config);

    if let Command::Init = cli.command {
        if fictioner::init_config(&root, &config_path)? {
            println!("Created {}", config_path.display());
        } else {
            println!("{} already exists", config_path.display());
        }
        return Ok(());
    }
    let engine = Arc::new(Engine::new(root, config_path));

    match cli.command {
        Command::Check { format, verbose } => {
            let snapshot = scan_once(&engine).await?;
            print!("{}", render_check(&snapshot, format, verbose));
            if snapshot.diagnostics().has_errors() {
                std::process::exit(1);
            }
        }
        Command::Tree => {
            let snapshot = scan_once(&engine).await?;
            print!("{}", render_tree(&snapshot));
        }
        Command::Related { file, line, column } => {
            let snapshot = scan_once(&engine).await?;
            let cursor = Cursor::new(file, (line - 1) as usize, (column - 1) as usize);
            if snapshot.file_by_path(&cursor.path).is_none() {
                eyre::bail!("{} is not part of the document", cursor.path.display());
            }
            print!("{}", render_related(&snapshot, &engine.related(&cursor)));
        }
        Command::Ids => {
            let snapshot = scan_once(&engine).await?;
            print!("{}", render_lines(snapshot.identifiers()));
        }
        Command::Files { relative } => {
            let snapshot = scan_once(&engine).await?;
            let paths = snapshot.file_paths(relative);
            print!("{}", render_lines(paths.iter().map(|p| p.display())));
        }
        Command::Watch => run_watch(engine).await?,
        Command::Init => {}
    }

    Ok(())
}

/// Scan once, turning a failed scan into an error.
async fn scan_once(engine: &Engine) -> Result<Arc<Snapshot>> {
    if let ScanOutcome::Failed { message, .. } = engine.scan().await {
        eyre::bail!(message);
    }
    Ok(engine.current())
}

async fn run_watch(engine: Arc<Engine>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = CorpusWatcher::new(engine.root(), engine.config_path(), tx)?;
    reconfigure(&engine, &mut watcher);
    report(&engine, engine.scan().await);

    while let Some(batch) = next_batch(&mut rx, DEBOUNCE).await {
        if batch.config_changed {
            reconfigure(&engine, &mut watcher);
        }
        eprintln!(
            "{} {} changed, rescanning...",
            "->".blue().bold(),
            if batch.config_changed {
                "config".to_string()
            } else {
                format!("{} files", batch.paths.len())
            }
        );
        report(&engine, engine.scan().await);
    }

    Ok(())
}

fn reconfigure(engine: &Engine, watcher: &mut CorpusWatcher) {
    match FictionConfig::load(engine.config_path()) {
        Ok(config) => watcher.reconfigure(&config),
        Err(e) => warn!("Keeping watched directories: {}", e),
    }
}

fn report(engine: &Engine, outcome: ScanOutcome) {
    match outcome {
        ScanOutcome::Published { .. } => {
            print!("{}", render_check(&engine.current(), OutputFormat::Text, false));
        }
        ScanOutcome::Superseded { .. } => {}
        ScanOutcome::Failed { message, .. } => {
            eprintln!("{} {}", "✗".red().bold(), message);
        }
    }
}
