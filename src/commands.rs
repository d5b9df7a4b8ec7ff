//! CLI command implementations

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::Context as _;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use trellis_core::{GraphStore, MemoryGraphStore, Namespace, TrellisConfig};
use trellis_indexer::{Coordinator, ExtractorRegistry, GraphSync, SyncOutcome};
use trellis_store::HttpGraphStore;
use trellis_watcher::{Dispatch, Dispatcher, FileWatcher};

/// Everything a command needs, built once from the root and config.
struct Context {
    root: PathBuf,
    config: TrellisConfig,
    ns: Namespace,
    registry: Arc<ExtractorRegistry>,
}

impl Context {
    fn load(root: PathBuf, namespace: Option<String>) -> anyhow::Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("project root {} not found", root.display()))?;
        let mut config = TrellisConfig::load(&root)?;
        if namespace.is_some() {
            config.namespace = namespace;
        }
        let ns = Namespace::for_project(&root, config.namespace.as_deref())?;
        let registry = Arc::new(ExtractorRegistry::with_defaults(&config)?);
        tracing::debug!("Namespace {} for {}", ns, root.display());
        Ok(Self { root, config, ns, registry })
    }

    fn http_store(&self) -> anyhow::Result<Arc<dyn GraphStore>> {
        let store = HttpGraphStore::new(&self.config)?;
        tracing::debug!("Graph endpoint: {}", store.endpoint());
        Ok(Arc::new(store))
    }

    fn graph_sync(&self, store: Arc<dyn GraphStore>) -> Arc<GraphSync> {
        Arc::new(GraphSync::new(store).with_timeout(self.config.sync_timeout()))
    }

    fn coordinator(&self, store: Arc<dyn GraphStore>) -> Coordinator {
        Coordinator::new(&self.root, Arc::clone(&self.registry), self.graph_sync(store))
            .with_concurrency(self.config.concurrency())
    }

    fn dispatcher(&self) -> anyhow::Result<Dispatcher> {
        let sync = self.graph_sync(self.http_store()?);
        Ok(
            Dispatcher::new(self.ns.clone(), &self.root, Arc::clone(&self.registry), sync)
                .with_probe_timeout(self.config.probe_timeout()),
        )
    }
}

/// Arguments that re-run `sync` for one path in a child logging to a file.
fn detached_args(root: &Path, namespace: Option<&str>, verbose: bool, path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--root".into(), root.into()];
    if let Some(ns) = namespace {
        args.push("--namespace".into());
        args.push(ns.into());
    }
    if verbose {
        args.push("--verbose".into());
    }
    args.push("--log-file".into());
    args.push("sync".into());
    args.push(path.into());
    args
}

/// Hands one path to a background `trellis sync` and returns without waiting.
fn spawn_detached(ctx: &Context, verbose: bool, path: &Path) -> anyhow::Result<()> {
    let exe = std::env::current_exe().context("cannot locate the trellis executable")?;
    let args = detached_args(&ctx.root, Some(ctx.ns.as_str()), verbose, path);
    let child = Command::new(exe)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("cannot start background sync of {}", path.display()))?;
    tracing::debug!("Detached sync of {} as pid {}", path.display(), child.id());
    Ok(())
}

pub async fn sync(
    root: PathBuf,
    namespace: Option<String>,
    path: PathBuf,
    detach: Option<bool>,
) -> anyhow::Result<()> {
    let ctx = Context::load(root, namespace)?;
    if let Some(verbose) = detach {
        return spawn_detached(&ctx, verbose, &path);
    }
    let dispatcher = ctx.dispatcher()?;

    let ticket = match dispatcher.dispatch(&path) {
        Dispatch::Ignored(reason) => {
            tracing::info!("Skipping {}: {}", path.display(), reason);
            return Ok(());
        }
        Dispatch::Queued(ticket) => ticket,
    };
    let rel = ticket.path().to_string();
    match ticket.outcome().await? {
        SyncOutcome::Written { children, links_failed, .. } => {
            tracing::info!("Synced {} ({} children)", rel, children);
            if links_failed > 0 {
                tracing::warn!("{} relations of {} could not be linked", links_failed, rel);
            }
        }
        SyncOutcome::Deleted { removed } => {
            tracing::info!("Removed {} ({} entities)", rel, removed);
        }
    }
    Ok(())
}

/// A hook payload as sent by editor and agent tooling.
#[derive(Debug, Deserialize)]
struct HookPayload {
    #[serde(default)]
    tool_input: Option<ToolInput>,
}

#[derive(Debug, Deserialize)]
struct ToolInput {
    file_path: Option<String>,
}

/// The path named by one `listen` input line, if any.
fn path_from_line(line: &str) -> Option<PathBuf> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('{') {
        return Some(PathBuf::from(line));
    }
    match serde_json::from_str::<HookPayload>(line) {
        Ok(payload) => payload
            .tool_input
            .and_then(|input| input.file_path)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from),
        Err(e) => {
            tracing::warn!("Ignoring malformed hook payload: {}", e);
            None
        }
    }
}

pub async fn listen(
    root: PathBuf,
    namespace: Option<String>,
    detach: Option<bool>,
) -> anyhow::Result<()> {
    let ctx = Context::load(root, namespace)?;
    if let Some(verbose) = detach {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let Some(path) = path_from_line(&line) else { continue };
            spawn_detached(&ctx, verbose, &path)?;
        }
        return Ok(());
    }

    let dispatcher = ctx.dispatcher()?;
    tracing::info!("Listening for changes under namespace {}", ctx.ns);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(path) = path_from_line(&line) else { continue };
        if let Dispatch::Ignored(reason) = dispatcher.dispatch(&path) {
            tracing::debug!("Skipping {}: {}", path.display(), reason);
        }
    }

    dispatcher.wait_idle().await;
    tracing::info!("Input closed; {} syncs failed", dispatcher.failures());
    Ok(())
}

pub async fn watch(root: PathBuf, namespace: Option<String>) -> anyhow::Result<()> {
    let ctx = Context::load(root, namespace)?;
    let dispatcher = ctx.dispatcher()?;
    let watcher = FileWatcher::new(&ctx.root)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {}", e);
        }
    };
    watcher.run(&dispatcher, shutdown).await?;
    tracing::info!("Stopped; {} syncs failed", dispatcher.failures());
    Ok(())
}

pub async fn reindex(root: PathBuf, namespace: Option<String>) -> anyhow::Result<()> {
    let ctx = Context::load(root, namespace)?;
    let coordinator = ctx.coordinator(ctx.http_store()?);
    let report = coordinator.reconcile(&ctx.ns).await?;
    println!("{}", report);
    Ok(())
}

/// Extract everything into an in-memory graph and print what would be written.
pub async fn dry_run(root: PathBuf, namespace: Option<String>) -> anyhow::Result<()> {
    let ctx = Context::load(root, namespace)?;
    let store = Arc::new(MemoryGraphStore::new());
    let coordinator = ctx.coordinator(store.clone());

    let report = coordinator.reconcile(&ctx.ns).await?;
    println!("Dry run for namespace {}: {}", ctx.ns, report);
    print_counts(&ctx.ns, store.as_ref()).await
}

pub async fn prune(root: PathBuf, namespace: Option<String>) -> anyhow::Result<()> {
    let ctx = Context::load(root, namespace)?;
    let coordinator = ctx.coordinator(ctx.http_store()?);
    let report = coordinator.prune(&ctx.ns).await?;
    println!("{} pruned, {} failed", report.pruned, report.failed);
    Ok(())
}

pub async fn ensure(root: PathBuf, namespace: Option<String>) -> anyhow::Result<()> {
    let ctx = Context::load(root, namespace)?;
    let coordinator = ctx.coordinator(ctx.http_store()?);
    match coordinator.ensure_populated(&ctx.ns).await? {
        Some(report) => println!("{}", report),
        None => println!("Namespace {} already populated", ctx.ns),
    }
    Ok(())
}

pub async fn status(root: PathBuf, namespace: Option<String>) -> anyhow::Result<()> {
    let ctx = Context::load(root, namespace)?;
    let store = ctx.http_store()?;
    store
        .probe()
        .await
        .context("graph store unreachable")?;
    print_counts(&ctx.ns, store.as_ref()).await
}

async fn print_counts(ns: &Namespace, store: &dyn GraphStore) -> anyhow::Result<()> {
    let counts = store.entity_counts(ns).await?;
    if counts.is_empty() {
        println!("Namespace {} is empty", ns);
        return Ok(());
    }
    println!("Namespace {}", ns);
    for (label, count) in &counts {
        println!("  {:<10} {}", label, count);
    }
    Ok(())
}

pub fn namespace(root: PathBuf, namespace: Option<String>) -> anyhow::Result<()> {
    let ctx = Context::load(root, namespace)?;
    println!("{}", ctx.ns);
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Clearing state for: {}", root.display());
    trellis_core::clear_state(&root)?;
    tracing::info!("State cleared");
    Ok(())
}
