//! notegraph - Knowledge graph inspector
//!
//! Loads a JSON snapshot of a knowledge base into the in-memory backend and
//! prints graph edges, canvas layout or an integrity report.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use notegraph::backend::{MemoryBackend, Snapshot};
use notegraph::layout::resolve_positions;
use notegraph::sync::PositionSync;
use notegraph::view::EdgeCache;
use notegraph::{Config, KnowledgeStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "notegraph")]
#[command(about = "Inspect a knowledge base snapshot as a note graph")]
struct Cli {
    /// Path to a YAML config file (defaults to ./notegraph.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the edges the graph view would draw
    Edges {
        #[command(flatten)]
        view: ViewArgs,
    },

    /// Print where each visible note is drawn
    Layout {
        #[command(flatten)]
        view: ViewArgs,

        /// Arrange the visible notes on a circle before printing
        #[arg(long)]
        auto: bool,

        /// Write the resulting snapshot to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report records that would be dropped or left dangling on load
    Check {
        /// Snapshot JSON file
        #[arg(short, long, env = "NOTEGRAPH_SNAPSHOT")]
        snapshot: Option<PathBuf>,

        /// Exit with an error when any issue is found
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Args)]
struct ViewArgs {
    /// Snapshot JSON file
    #[arg(short, long, env = "NOTEGRAPH_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Only show notes under this category path, e.g. "Work/Rust"
    #[arg(long)]
    category: Option<String>,

    /// Only show notes whose title or content contains this text
    #[arg(long)]
    search: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,notegraph=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Edges { view } => run_edges(&config, view).await,
        Commands::Layout { view, auto, output } => {
            run_layout(&config, view, auto, output.as_deref()).await
        }
        Commands::Check { snapshot, strict } => {
            let path = snapshot_path(&config, snapshot)?;
            run_check(&path, strict).await
        }
    }
}

fn snapshot_path(config: &Config, arg: Option<PathBuf>) -> Result<PathBuf> {
    match arg.or_else(|| config.snapshot_path.clone()) {
        Some(path) => Ok(path),
        None => bail!("No snapshot given: pass --snapshot or set NOTEGRAPH_SNAPSHOT"),
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    Snapshot::from_json(&text)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))
}

/// Load a snapshot into a fresh store and apply the view filters
async fn open_store(
    config: &Config,
    view: ViewArgs,
) -> Result<(Arc<MemoryBackend>, KnowledgeStore)> {
    let path = snapshot_path(config, view.snapshot)?;
    let backend = Arc::new(MemoryBackend::from_snapshot(read_snapshot(&path)?));
    let store = KnowledgeStore::new(backend.clone());
    store
        .reload()
        .await
        .into_result()
        .with_context(|| format!("Failed to load {}", path.display()))?;

    if let Some(category) = view.category {
        let filter: Vec<String> = category
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        store
            .set_category_filter((!filter.is_empty()).then_some(filter))
            .await;
    }
    if let Some(search) = view.search {
        store.set_search_text(search).await;
    }
    Ok((backend, store))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

async fn run_edges(config: &Config, view: ViewArgs) -> Result<()> {
    let (_, store) = open_store(config, view).await?;
    let state = store.snapshot().await;
    let mut cache = EdgeCache::new();
    let edges = cache.edges(&state);
    info!(edges = edges.len(), links = state.links().len(), "Built edges");
    print_json(&edges)
}

async fn run_layout(
    config: &Config,
    view: ViewArgs,
    auto: bool,
    output: Option<&Path>,
) -> Result<()> {
    let (backend, store) = open_store(config, view).await?;

    if auto {
        let ids: Vec<String> = store
            .read(|s| s.view().visible_notes(s).iter().map(|n| n.id.clone()).collect())
            .await;
        let sync = PositionSync::with_layout(store.clone(), config.debounce, config.layout.clone());
        let report = sync.auto_layout(&ids).await;
        sync.shutdown();
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "Some positions were not saved");
        }
        info!(placed = report.placed.len(), "Auto-layout complete");
    }

    let placed = store
        .read(|s| resolve_positions(s, &s.view().visible_notes(s), &config.layout))
        .await;
    print_json(&placed)?;

    if let Some(path) = output {
        let snapshot = backend.snapshot().await;
        let text = serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        info!("Wrote snapshot to {}", path.display());
    }
    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct IntegrityReport {
    notes: usize,
    categories: usize,
    links: usize,
    /// Links dropped on load: self links or links to missing notes
    dropped_links: Vec<String>,
    /// Positions dropped on load because their note does not exist
    dropped_positions: Vec<String>,
    /// Notes filed under a category path that does not exist
    uncategorized_notes: Vec<String>,
    /// Categories whose parent id does not resolve
    orphaned_categories: Vec<String>,
}

impl IntegrityReport {
    fn issue_count(&self) -> usize {
        self.dropped_links.len()
            + self.dropped_positions.len()
            + self.uncategorized_notes.len()
            + self.orphaned_categories.len()
    }
}

async fn run_check(path: &Path, strict: bool) -> Result<()> {
    let raw = read_snapshot(path)?;
    let backend = Arc::new(MemoryBackend::from_snapshot(raw.clone()));
    let store = KnowledgeStore::new(backend);
    store
        .reload()
        .await
        .into_result()
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let report = store
        .read(|s| IntegrityReport {
            notes: s.notes().len(),
            categories: s.categories().len(),
            links: s.links().len(),
            dropped_links: raw
                .links
                .iter()
                .filter(|l| s.link(&l.id).is_none())
                .map(|l| l.id.clone())
                .collect(),
            dropped_positions: raw
                .positions
                .iter()
                .filter(|(note_id, _)| s.position_of(note_id).is_none())
                .map(|(note_id, _)| note_id.clone())
                .collect(),
            uncategorized_notes: s
                .notes()
                .iter()
                .filter(|n| !n.category_path.is_empty() && !s.category_path_exists(&n.category_path))
                .map(|n| n.id.clone())
                .collect(),
            orphaned_categories: s
                .categories()
                .iter()
                .filter(|c| c.parent_id.as_deref().is_some_and(|p| s.category(p).is_none()))
                .map(|c| c.id.clone())
                .collect(),
        })
        .await;

    print_json(&report)?;
    let issues = report.issue_count();
    if issues > 0 {
        warn!(issues, "Snapshot has integrity issues");
        if strict {
            bail!("{} integrity issue(s) found in {}", issues, path.display());
        }
    } else {
        info!("Snapshot is consistent");
    }
    Ok(())
}
