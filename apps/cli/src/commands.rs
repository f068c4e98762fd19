//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use subharvest_core::graph::{NodeId, NodeReport, NodeStatus, RunContext, RunObserver};
use subharvest_core::materialize;
use subharvest_core::pipeline::{self, INGEST_NODE, PREVIEW_NODE};
use subharvest_shared::{AppConfig, Credentials, RunSettings, init_config, load_config};
use subharvest_source::RedditClient;
use subharvest_storage::SqliteStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// subharvest — pull new subreddit submissions into a local database.
#[derive(Parser)]
#[command(
    name = "subharvest",
    version,
    about = "Incrementally ingest subreddit submissions and preview the most recent ones.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch new submissions, store them, and preview the result.
    Run {
        /// Subreddit to ingest (overrides config).
        #[arg(short, long)]
        subreddit: Option<String>,

        /// Maximum submissions to fetch (overrides config).
        #[arg(short, long)]
        limit: Option<u32>,

        /// Database path (overrides config).
        #[arg(long)]
        db: Option<String>,

        /// Rows in the preview table (overrides config).
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Print the most recent stored submissions without fetching.
    Preview {
        /// Database path (overrides config).
        #[arg(long)]
        db: Option<String>,

        /// Rows in the preview table (overrides config).
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Show recent ingestion runs.
    History {
        /// Number of runs to show.
        #[arg(long, default_value = "10")]
        count: u32,

        /// Database path (overrides config).
        #[arg(long)]
        db: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "subharvest=info",
        1 => "subharvest=debug",
        _ => "subharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            subreddit,
            limit,
            db,
            top_n,
        } => cmd_run(subreddit, limit, db, top_n).await,
        Command::Preview { db, top_n } => cmd_preview(db, top_n).await,
        Command::History { count, db } => cmd_history(count, db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Merge config-file settings with CLI flag overrides.
fn merge_settings(
    config: &AppConfig,
    subreddit: Option<String>,
    limit: Option<u32>,
    top_n: Option<usize>,
) -> RunSettings {
    let mut settings = RunSettings::from(config);
    if let Some(subreddit) = subreddit {
        settings.subreddit = subreddit;
    }
    if let Some(limit) = limit {
        settings.limit = limit;
    }
    if let Some(top_n) = top_n {
        settings.top_n = top_n;
    }
    settings
}

fn db_path(config: &AppConfig, db: Option<String>) -> PathBuf {
    PathBuf::from(db.unwrap_or_else(|| config.storage.path.clone()))
}

async fn cmd_run(
    subreddit: Option<String>,
    limit: Option<u32>,
    db: Option<String>,
    top_n: Option<usize>,
) -> Result<()> {
    let config = load_config()?;

    // Validate credentials before any network call.
    let credentials = Credentials::from_env()?;

    let settings = merge_settings(&config, subreddit, limit, top_n);
    let db_path = db_path(&config, db);

    info!(
        subreddit = %settings.subreddit,
        limit = settings.limit,
        db = %db_path.display(),
        "starting pipeline run"
    );

    let progress = CliProgress::new();

    progress.message("Authenticating with Reddit");
    let client = RedditClient::connect(&credentials).await?;

    progress.message("Opening store");
    let store = SqliteStore::open(&db_path).await?;
    let run_id = store.insert_run(&settings.subreddit).await?;

    let ctx = RunContext {
        source: &client,
        store: &store,
        settings: &settings,
    };
    let report = pipeline::run_pipeline(&ctx, &progress).await?;

    store
        .finish_run(&run_id, &report.stats_json().to_string())
        .await?;
    progress.finish();

    if let Some(failed) = report.first_failure() {
        if let NodeStatus::Failed { error } = &failed.status {
            return Err(eyre!("pipeline node '{}' failed: {error}", failed.node));
        }
    }

    // Print summary from the node metadata payloads.
    println!();
    println!("  Run complete for r/{}", settings.subreddit);
    if let Some(NodeStatus::Succeeded { metadata }) =
        report.node(INGEST_NODE).map(|n| &n.status)
    {
        println!("  Fetched:   {}", metadata["fetched"]);
        println!("  Inserted:  {}", metadata["inserted"]);
        println!("  Skipped:   {}", metadata["skipped_duplicates"]);
    }
    println!();
    if let Some(NodeStatus::Succeeded { metadata }) =
        report.node(PREVIEW_NODE).map(|n| &n.status)
    {
        if let Some(preview) = metadata["preview"].as_str() {
            println!("{preview}");
        }
    }

    Ok(())
}

async fn cmd_preview(db: Option<String>, top_n: Option<usize>) -> Result<()> {
    let config = load_config()?;
    let top_n = top_n.unwrap_or(config.preview.top_n);
    let db_path = db_path(&config, db);

    let store = SqliteStore::open(&db_path).await?;
    let view = materialize::materialize(&store, top_n).await?;

    println!("{}", view.render_table());
    Ok(())
}

async fn cmd_history(count: u32, db: Option<String>) -> Result<()> {
    let config = load_config()?;
    let db_path = db_path(&config, db);

    let store = SqliteStore::open(&db_path).await?;
    let runs = store.recent_runs(count).await?;

    if runs.is_empty() {
        println!("(no ingestion runs recorded)");
        return Ok(());
    }

    for run in runs {
        let finished = run.finished_at.as_deref().unwrap_or("(unfinished)");
        println!("  {}  r/{}", run.started_at, run.subreddit);
        println!("    id:       {}", run.id);
        println!("    finished: {finished}");
        if let Some(stats) = run.stats_json.as_deref() {
            println!("    stats:    {stats}");
        }
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner-based observer for pipeline node progress.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn message(&self, msg: &str) {
        self.spinner.set_message(msg.to_string());
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl RunObserver for CliProgress {
    fn node_started(&self, node: NodeId) {
        self.spinner.set_message(format!("Running {node}"));
    }

    fn node_finished(&self, report: &NodeReport) {
        let outcome = match &report.status {
            NodeStatus::Succeeded { .. } => "done",
            NodeStatus::Failed { .. } => "failed",
            NodeStatus::Skipped { .. } => "skipped",
        };
        self.spinner.set_message(format!("{} {outcome}", report.node));
    }
}
