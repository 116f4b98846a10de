// uilens - command line entry point

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use uilens::core::ObservedItem;
use uilens::services::{
    ConnectionManager, LiveScanner, ScannerOptions, TokioScheduler, WebSocketConnector,
};
use uilens::storage::SettingsStore;

#[derive(Parser)]
#[command(name = "uilens", version, about = "Live issue cache for in-page UI analysis")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a discovery snapshot and print per-file issue counts
    Scan {
        /// JSON array of observed items
        #[arg(long)]
        items: PathBuf,

        /// Analysis service URL (overrides settings)
        #[arg(long)]
        url: Option<String>,

        /// Keep reconciling server pushes until Ctrl-C (default from
        /// `live_scan_on_start`)
        #[arg(long)]
        live: bool,
    },
    /// Print the effective settings
    Settings,
    /// Hide or show one rule's issues in future scans
    ToggleRule {
        /// Rule identifier as reported by the analysis service
        rule_id: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "uilens=debug" } else { "uilens=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_settings(path: Option<PathBuf>) -> Result<SettingsStore> {
    let store = match path {
        Some(path) => SettingsStore::load_from(path),
        None => SettingsStore::new(),
    };
    store.context("failed to load settings")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut store = open_settings(cli.settings)?;
    match cli.command {
        Command::Settings => {
            println!("# {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(store.settings())?);
            Ok(())
        }
        Command::ToggleRule { rule_id } => {
            let disabled = store
                .toggle_disabled_rule(&rule_id)
                .context("failed to save settings")?;
            let state = if disabled { "disabled" } else { "enabled" };
            println!("{rule_id}: {state}");
            Ok(())
        }
        Command::Scan { items, url, live } => scan(&store, items, url, live).await,
    }
}

async fn scan(
    store: &SettingsStore,
    items: PathBuf,
    url: Option<String>,
    live: bool,
) -> Result<()> {
    let settings = store.settings();
    let watch = live || settings.live_scan_on_start;
    let raw = std::fs::read_to_string(&items)
        .with_context(|| format!("failed to read {}", items.display()))?;
    let items: Vec<ObservedItem> =
        serde_json::from_str(&raw).context("items file is not a JSON array of observed items")?;

    let scheduler = Arc::new(TokioScheduler);
    let connection = Arc::new(ConnectionManager::new(
        Arc::new(WebSocketConnector),
        scheduler.clone(),
        settings.reconnect,
    ));
    let scanner = Arc::new(LiveScanner::new(
        connection.clone(),
        scheduler,
        ScannerOptions::from(settings),
    ));
    scanner.attach(&connection);
    scanner.set_items(items);

    let url = url.unwrap_or_else(|| settings.server_url.clone());
    if let Err(err) = connection.connect(&url).await {
        // Scanning still runs; every file ends up in the error state.
        warn!(url = %url, error = %err, "analysis service unreachable");
    }

    let summary = scanner.enable_live_scan().await;
    info!(
        files = summary.files,
        completed = summary.completed,
        failed = summary.failed,
        "scan finished"
    );
    report(&scanner, settings.heatmap_enabled);

    if watch {
        info!("watching for changes, press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        report(&scanner, settings.heatmap_enabled);
        scanner.disable_live_scan();
    }

    connection.disconnect();
    Ok(())
}

fn report(scanner: &LiveScanner, heatmap_enabled: bool) {
    if heatmap_enabled {
        print_heatmap(scanner);
    } else {
        println!("{:>5}  total", scanner.heatmap().total());
    }
}

fn print_heatmap(scanner: &LiveScanner) {
    let heatmap = scanner.heatmap();
    let mut per_file: BTreeMap<String, usize> = BTreeMap::new();
    for item in scanner.items() {
        *per_file.entry(item.file().to_string()).or_default() += heatmap.count_for(&item.id);
    }

    for (file, count) in &per_file {
        let file_level = scanner.file_issues(file).map_or(0, |issues| issues.len());
        println!("{count:>5}  {file}  ({file_level} file-level)");
    }
    println!("{:>5}  total", heatmap.total());
}
