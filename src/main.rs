//! Trellis CLI entry point

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Keep a code and documentation knowledge graph in sync with a project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root path (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Namespace token, overriding the one derived from the root directory name
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Append logs to .trellis/trellis.log instead of stderr
    #[arg(long, global = true)]
    log_file: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync one file (absolute or project-relative) and wait for the result
    Sync {
        path: PathBuf,
        /// Hand the sync to a background process logging to .trellis/trellis.log and return at once
        #[arg(long)]
        detach: bool,
    },
    /// Read changed paths or hook payloads from stdin, one per line.
    /// Editor and agent hooks should run `trellis listen --detach`
    Listen {
        /// Start one background sync per path and exit when stdin closes
        #[arg(long)]
        detach: bool,
    },
    /// Watch the project and sync files as they change
    Watch,
    /// Reconcile the whole project with the graph
    Reindex {
        /// Extract into an in-memory graph and print counts instead of writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove entities whose files no longer exist
    Prune,
    /// Populate the graph only if the namespace is empty
    Ensure,
    /// Show entity counts for the namespace
    Status,
    /// Print the namespace token
    Namespace,
    /// Remove the .trellis state directory
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env: {}", e);
        }
    }
    init_logging(&cli)?;

    tracing::debug!("Trellis v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Project root: {}", cli.root.display());

    let root = cli.root;
    let namespace = cli.namespace;
    let verbose = cli.verbose;
    let detach = move |on: bool| on.then_some(verbose);
    match cli.command {
        Commands::Sync { path, detach: on } => {
            commands::sync(root, namespace, path, detach(on)).await
        }
        Commands::Listen { detach: on } => commands::listen(root, namespace, detach(on)).await,
        Commands::Watch => commands::watch(root, namespace).await,
        Commands::Reindex { dry_run: true } => commands::dry_run(root, namespace).await,
        Commands::Reindex { dry_run: false } => commands::reindex(root, namespace).await,
        Commands::Prune => commands::prune(root, namespace).await,
        Commands::Ensure => commands::ensure(root, namespace).await,
        Commands::Status => commands::status(root, namespace).await,
        Commands::Namespace => commands::namespace(root, namespace),
        Commands::Clear => commands::clear(root),
        Commands::Version => {
            println!("Trellis v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trellis={}", log_level)));

    let (file_layer, stderr_layer) = if cli.log_file {
        trellis_core::ensure_state_dir(&cli.root)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(trellis_core::log_path(&cli.root))?;
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file));
        (Some(layer), None)
    } else {
        let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}
