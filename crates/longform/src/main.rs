use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use longform::config::LogFormat;
use longform::db::job_repo::{self, JobFilter};
use longform::model::{ComparisonConfig, JobStatus, Topology};
use longform::provider::GenerationProvider;
use longform::{
    create_document, load_config, logging, Config, Database, DocumentRequest, FileStorage,
    HttpProvider, JobDriver, MediaOrchestrator, Orchestrator, PipelineSettings, PlanAccessGate,
    RetryPolicy, ScriptedProvider,
};

#[derive(Parser)]
#[command(name = "longform")]
#[command(version, about = "Resumable long-form document generation")]
struct Cli {
    /// Path to the JSON config file. Defaults apply when omitted.
    #[arg(short, long, global = true, env = "LONGFORM_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured log format
    #[arg(long, global = true, value_enum)]
    log_format: Option<CliLogFormat>,

    /// Use the built-in scripted provider instead of the HTTP API
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Pretty,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Pretty => LogFormat::Pretty,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a document and queue its job
    Create {
        /// Topic of the document
        #[arg(long, required_unless_present = "request")]
        topic: Option<String>,

        /// Requesting actor, checked against the configured plans
        #[arg(long, env = "USER", default_value = "local")]
        actor: String,

        #[arg(long)]
        target_chars: Option<u32>,

        /// Competitors; switches the document to the comparison topology
        #[arg(long, value_delimiter = ',')]
        compare: Vec<String>,

        /// Full request as a JSON file; other flags are ignored
        #[arg(long, conflicts_with = "topic")]
        request: Option<PathBuf>,
    },
    /// Perform one unit of work for a job
    Advance { job_id: String },
    /// Advance a job until it is done or failed
    Run { job_id: String },
    /// Show a job's snapshot
    Status { job_id: String },
    /// List jobs
    Jobs {
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        document: Option<String>,

        #[arg(long, default_value = "20")]
        limit: u64,
    },
    /// Requeue a failed job; it resumes at its cursor
    Retry { job_id: String },
    /// Rewrite one section
    Regenerate { section_id: String },
    /// Top up banners and diagrams for a finished document
    Assets { document_id: String },
}

struct App {
    config: Config,
    db: Database,
    orchestrator: Arc<Orchestrator>,
    media: Arc<MediaOrchestrator>,
}

impl App {
    fn build(config: Config, offline: bool) -> Result<Self> {
        let db_path = config
            .database_path()
            .context("Could not determine a database path; set database_path")?;
        let db = Database::open(&db_path, config.storage.bootstrap_policy())?;

        let provider: Arc<dyn GenerationProvider> = if offline {
            Arc::new(ScriptedProvider::new())
        } else {
            Arc::new(HttpProvider::from_config(&config.provider)?)
        };
        info!(provider = provider.name(), database = %db_path.display(), "Provider ready");

        let asset_dir = config
            .asset_directory()
            .context("Could not determine an asset directory; set asset_directory")?;
        let retry = RetryPolicy::from(&config.retry);

        let media = Arc::new(MediaOrchestrator::new(
            db.clone(),
            Arc::clone(&provider),
            Arc::new(FileStorage::new(asset_dir)),
            retry.clone(),
            config.media.clone(),
        ));
        let orchestrator = Arc::new(
            Orchestrator::new(
                db.clone(),
                provider,
                retry,
                PipelineSettings::from_config(&config),
            )
            .with_media(Arc::clone(&media)),
        );

        Ok(Self {
            config,
            db,
            orchestrator,
            media,
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_request(
    topic: Option<String>,
    actor: String,
    target_chars: Option<u32>,
    compare: Vec<String>,
    request: Option<PathBuf>,
) -> Result<DocumentRequest> {
    if let Some(path) = request {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read request file {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("Invalid request file {}", path.display()));
    }

    let Some(topic) = topic else {
        bail!("--topic is required without --request");
    };
    let mut request = DocumentRequest::new(&actor, &topic);
    if let Some(chars) = target_chars {
        request.requirements.target_chars = chars;
    }
    if !compare.is_empty() {
        request.topology = Topology::Comparison;
        request.options.comparison = Some(ComparisonConfig {
            competitors: compare,
            criteria: Vec::new(),
        });
    }
    Ok(request)
}

async fn run_job(app: &App, job_id: &str) -> Result<()> {
    let driver = Arc::new(JobDriver::new(
        Arc::clone(&app.orchestrator),
        app.config.driver.poll_interval(),
    ));

    let signal_driver = Arc::clone(&driver);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            signal_driver.stop();
        }
    });

    let snapshot = driver.drive(job_id).await?;
    print_json(&snapshot)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    let format = cli
        .log_format
        .map(LogFormat::from)
        .unwrap_or(config.logging.format);
    logging::init_logging(format, &config.logging.filter)?;

    let app = App::build(config, cli.offline)?;
    let db = app.db.clone();
    tokio::task::spawn_blocking(move || db.ensure_schema())
        .await
        .context("Schema bootstrap task panicked")??;

    match cli.command {
        Commands::Create {
            topic,
            actor,
            target_chars,
            compare,
            request,
        } => {
            let request = build_request(topic, actor, target_chars, compare, request)?;
            let gate = PlanAccessGate::new(app.db.clone(), app.config.access.clone());
            let (_, snapshot) = create_document(&app.db, &gate, request)?;
            print_json(&snapshot)
        }
        Commands::Advance { job_id } => print_json(&app.orchestrator.advance(&job_id).await?),
        Commands::Run { job_id } => run_job(&app, &job_id).await,
        Commands::Status { job_id } => print_json(&app.orchestrator.snapshot(&job_id)?),
        Commands::Jobs {
            status,
            document,
            limit,
        } => {
            let status = status
                .map(|s| s.parse::<JobStatus>())
                .transpose()?;
            let jobs = job_repo::query(
                &app.db,
                &JobFilter {
                    status,
                    document_id: document,
                    limit: Some(limit),
                },
            )?;
            print_json(&jobs)
        }
        Commands::Retry { job_id } => print_json(&app.orchestrator.retry_job(&job_id).await?),
        Commands::Regenerate { section_id } => {
            print_json(&app.orchestrator.regenerate_section(&section_id).await?)
        }
        Commands::Assets { document_id } => {
            print_json(&app.media.ensure_assets(&document_id).await?)
        }
    }
}
