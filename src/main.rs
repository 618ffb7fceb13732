use std::env;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use research_golem::lock;
use research_golem::log;
use research_golem::mailer::SmtpMailer;
use research_golem::model::{AnthropicExtractor, OpenAiResearcher};
use research_golem::scheduler::{Daemon, DaemonControl, CONNECTIVITY_PROBE};
use research_golem::store::DataStore;
use research_golem::workspace::NotionWorkspace;
use tracing::info;

#[derive(Parser)]
#[command(name = "research-golem", about = "Autonomous research assistant daemon")]
struct Cli {
    /// Directory for config, queue, logs, and the lock file
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Stderr log verbosity (error, warn, info, debug)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon loop until SIGTERM/SIGINT
    Run,
    /// Run a single research cycle and exit
    Cycle,
    /// Send the digest now, regardless of schedule
    Digest,
    /// Show config and pending queue summary
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => handle_run(&cli).await,
        Commands::Cycle => handle_cycle(&cli).await,
        Commands::Digest => handle_digest(&cli).await,
        Commands::Status => handle_status(&cli),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn require_env(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("Missing required environment variable: {}", name))
}

type ProdDaemon = Daemon<NotionWorkspace, AnthropicExtractor, OpenAiResearcher, SmtpMailer>;

/// Build the daemon from environment credentials. Mail credentials are
/// optional; without them digests are skipped with a warning.
fn build_daemon(data_dir: &PathBuf) -> Result<ProdDaemon, String> {
    let notion_key = require_env("NOTION_API_KEY")?;
    let notion_db = require_env("NOTION_DB_ID")?;
    let anthropic_key = require_env("ANTHROPIC_API_KEY")?;
    let openai_key = require_env("OPENAI_API_KEY")?;

    let mailer = match (env::var("GMAIL_USER"), env::var("GMAIL_APP_PASSWORD")) {
        (Ok(user), Ok(password)) => {
            let recipient = env::var("DIGEST_RECIPIENT").unwrap_or_else(|_| user.clone());
            Some(SmtpMailer::new(user, password, recipient))
        }
        _ => None,
    };

    Ok(Daemon {
        store: DataStore::new(data_dir.clone()),
        workspace: NotionWorkspace::new(notion_key, notion_db),
        extractor: AnthropicExtractor::new(anthropic_key),
        researcher: OpenAiResearcher::new(openai_key),
        mailer,
        control: DaemonControl::new(),
        probe_addr: CONNECTIVITY_PROBE.to_string(),
    })
}

async fn handle_run(cli: &Cli) -> Result<(), String> {
    let _guard = log::init(&cli.data_dir, &cli.log_level)?;
    let _lock = lock::try_acquire(&cli.data_dir)?;

    let daemon = build_daemon(&cli.data_dir)?;
    daemon.control.install_signal_handlers()?;

    info!("daemon starting (PID {})", std::process::id());
    daemon.run_loop().await;

    Ok(())
}

async fn handle_cycle(cli: &Cli) -> Result<(), String> {
    let _guard = log::init(&cli.data_dir, &cli.log_level)?;
    let _lock = lock::try_acquire(&cli.data_dir)?;

    let daemon = build_daemon(&cli.data_dir)?;
    let summary = daemon.run_cycle().await;

    println!(
        "Cycle complete: {} processed, {} failed, {} skipped",
        summary.processed, summary.failed, summary.skipped
    );
    Ok(())
}

async fn handle_digest(cli: &Cli) -> Result<(), String> {
    let _guard = log::init(&cli.data_dir, &cli.log_level)?;
    let _lock = lock::try_acquire(&cli.data_dir)?;

    let daemon = build_daemon(&cli.data_dir)?;
    daemon.dispatch_digest().await;
    Ok(())
}

fn handle_status(cli: &Cli) -> Result<(), String> {
    let store = DataStore::new(cli.data_dir.clone());
    let config = store.load_config();
    let queue = store.load_queue();

    println!("Data dir:        {}", cli.data_dir.display());
    println!("Cycle interval:  every {} hour(s)", config.interval_hours);
    println!("Digest hour:     {}:00 local", config.email_hour);
    println!(
        "Last digest:     {}",
        config.last_digest_date.as_deref().unwrap_or("never")
    );
    println!("Pending queue:   {} record(s)", queue.len());

    for record in &queue {
        let status = match &record.any_error {
            Some(e) => format!("ERROR: {}", e),
            None => format!("${:.4}", record.cost),
        };
        println!("  {} — {} ({})", record.processed_at, record.title, status);
    }

    Ok(())
}
