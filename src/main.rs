//! Catalogue Scanner main entry point
//!
//! This is the command-line interface for the open-data inventory scanner.

use anyhow::Context;
use catalogue_scanner::catalogue::{
    ApiCatalogue, BrowserCatalogue, CatalogueClient, Source, SourceProfile, WebDriverSession,
};
use catalogue_scanner::collector::{collect_all, Failure};
use catalogue_scanner::config::{load_config_with_hash, CatalogueConfig, Config, FetchMode};
use catalogue_scanner::derive::{complete_missing_fields, FormatTable};
use catalogue_scanner::inventory::Inventory;
use catalogue_scanner::output::{compute_statistics, export_inventory, print_statistics};
use catalogue_scanner::reconcile::reconcile;
use catalogue_scanner::session::HttpSession;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Catalogue Scanner: an open-data inventory builder
///
/// Collects every dataset of an organization from a CKAN registry, derives
/// compliance indicators and exports dataset and resource inventories. The
/// internal catalogue can be scanned and reconciled with the registry.
#[derive(Parser, Debug)]
#[command(name = "catalogue-scanner")]
#[command(version = "1.0.0")]
#[command(about = "An open-data inventory builder", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Also scan the internal catalogue and reconcile it with the registry
    #[arg(long)]
    scan_catalogue: bool,

    /// Override the output directory from the configuration
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Validate config and show what would be scanned without scanning
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(directory) = &cli.output_dir {
        config.output.directory = directory.display().to_string();
    }

    if cli.dry_run {
        handle_dry_run(&config, cli.scan_catalogue);
        return Ok(());
    }

    handle_scan(config, cli.scan_catalogue, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalogue_scanner=info,warn"),
            1 => EnvFilter::new("catalogue_scanner=debug,info"),
            2 => EnvFilter::new("catalogue_scanner=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be scanned
fn handle_dry_run(config: &Config, scan_catalogue: bool) {
    println!("=== Catalogue Scanner Dry Run ===\n");

    println!("User Agent: {}", config.user_agent.header_value());

    println!("\nHTTP:");
    println!("  Timeout: {}s", config.http.timeout);
    println!("  Max retries: {}", config.http.max_retries);
    println!(
        "  Backoff: {}s factor, {}s max",
        config.http.backoff_factor, config.http.backoff_max
    );
    println!("  Retry statuses: {:?}", config.http.retry_statuses);
    println!("  Max workers: {}", config.collector.max_workers);

    print_catalogue("Registry", &config.registry);
    match &config.catalogue {
        Some(catalogue) => print_catalogue("Catalogue", catalogue),
        None => println!("\nCatalogue: not configured"),
    }

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!(
        "  Format table: {}",
        config.output.formats_table.as_deref().unwrap_or("built-in")
    );

    println!("\n✓ Configuration is valid");
    if scan_catalogue && config.catalogue.is_some() {
        println!("✓ Would scan the registry and reconcile it with the catalogue");
    } else {
        println!("✓ Would scan the registry");
    }
}

fn print_catalogue(label: &str, catalogue: &CatalogueConfig) {
    println!("\n{}:", label);
    println!("  Base URL: {}", catalogue.base_url);
    println!("  Mode: {:?}", catalogue.mode);
    if catalogue.mode == FetchMode::Browser {
        println!(
            "  WebDriver: {} ({})",
            catalogue.webdriver_url.as_deref().unwrap_or("-"),
            catalogue.browser_name
        );
    }
    if catalogue.filters.is_empty() {
        println!("  Filters: none (all datasets)");
    } else {
        for (field, value) in &catalogue.filters {
            println!("  Filter: {} = {}", field, value);
        }
    }
}

/// A catalogue client, plus the browser session to close when done
struct OpenCatalogue {
    client: Arc<dyn CatalogueClient>,
    browser: Option<Arc<BrowserCatalogue>>,
}

impl OpenCatalogue {
    async fn open(source: Source, catalogue: &CatalogueConfig, config: &Config) -> anyhow::Result<Self> {
        match catalogue.mode {
            FetchMode::Api => {
                let client = ApiCatalogue::from_config(source, catalogue, &config.http, &config.user_agent)
                    .with_context(|| format!("Failed to set up the {} client", source))?;
                Ok(Self {
                    client: Arc::new(client),
                    browser: None,
                })
            }
            FetchMode::Browser => {
                let endpoint = catalogue
                    .webdriver_url
                    .as_deref()
                    .context("Browser mode requires a webdriver-url")?;
                let session = WebDriverSession::connect(
                    endpoint,
                    &catalogue.browser_name,
                    &catalogue.browser_args,
                    catalogue.skip_tls_verify,
                    Duration::from_secs(config.http.timeout),
                )
                .await
                .with_context(|| format!("Failed to start a browser session on {}", endpoint))?;
                let browser = Arc::new(BrowserCatalogue::new(
                    SourceProfile::from_config(source, catalogue),
                    session,
                ));
                Ok(Self {
                    client: browser.clone(),
                    browser: Some(browser),
                })
            }
        }
    }

    async fn close(self) {
        if let Some(browser) = self.browser {
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser session: {}", e);
            }
        }
    }
}

/// Handles the main scan: collect, reconcile, derive, export
async fn handle_scan(config: Config, scan_catalogue: bool, quiet: bool) -> anyhow::Result<()> {
    let formats = match &config.output.formats_table {
        Some(path) => FormatTable::from_path(path)
            .with_context(|| format!("Failed to read format table {}", path))?,
        None => FormatTable::builtin(),
    };
    let probe = HttpSession::new(
        &config.http,
        &config.user_agent,
        config.http.probe_skip_tls_verify,
    )
    .context("Failed to set up the URL probe session")?;
    let max_workers = config.collector.max_workers;

    let registry = OpenCatalogue::open(Source::Registry, &config.registry, &config).await?;
    let ids = match registry.client.dataset_ids(&config.registry.filters).await {
        Ok(ids) => ids,
        Err(e) => {
            registry.close().await;
            return Err(anyhow::Error::new(e).context("Failed to list registry datasets"));
        }
    };
    let collection = collect_all(registry.client.clone(), probe.clone(), ids, max_workers).await;
    registry.close().await;

    let mut inventory = collection.inventory;
    let mut failures = collection.failures;

    if scan_catalogue {
        match &config.catalogue {
            Some(catalogue) => {
                match scan_second_catalogue(catalogue, &config, &mut inventory, probe, max_workers).await {
                    Ok(report_failures) => failures.extend(report_failures),
                    Err(e) => tracing::error!("Catalogue scan skipped: {:#}", e),
                }
            }
            None => tracing::warn!("--scan-catalogue given but no [catalogue] section configured"),
        }
    }

    let now = chrono::Local::now().naive_local();
    complete_missing_fields(&mut inventory, &formats, now);

    let stats = compute_statistics(&inventory, &failures);
    if !quiet {
        print_statistics(&stats);
    }

    let export = export_inventory(&inventory, Path::new(&config.output.directory), now)
        .context("Failed to export inventories")?;
    tracing::info!(
        "Inventories written to {} and {}",
        export.datasets.timestamped.display(),
        export.resources.timestamped.display()
    );

    Ok(())
}

/// Lists, collects and reconciles the internal catalogue
async fn scan_second_catalogue(
    catalogue: &CatalogueConfig,
    config: &Config,
    inventory: &mut Inventory,
    probe: HttpSession,
    max_workers: usize,
) -> anyhow::Result<Vec<Failure>> {
    let other = OpenCatalogue::open(Source::Catalogue, catalogue, config).await?;

    let ids = match other.client.dataset_ids(&catalogue.filters).await {
        Ok(ids) => ids,
        Err(e) => {
            other.close().await;
            return Err(anyhow::Error::new(e).context("Failed to list catalogue datasets"));
        }
    };
    let report = reconcile(inventory, other.client.clone(), ids, probe, max_workers).await;
    other.close().await;

    Ok(report.failures)
}
