//! codeagent CLI
//!
//! ```text
//! codeagent submit --project-id p1 "Add a footer"     persist the prompt, run the job
//! codeagent run trigger.json [--run-id ID]           run (or resume) triggers
//! codeagent history --project-id p1                  print a project's messages
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

use codeagent::job::submit;
use codeagent::llm::ChatClient;
use codeagent::metrics::encode_metrics;
use codeagent::sandbox::LocalSandboxProvider;
use codeagent::step::FileJournal;
use codeagent::store::{FileMessageStore, MessageStore};
use codeagent::telemetry::{init_tracing, shutdown_tracing, LogFormat};
use codeagent::{CodeAgentJob, JobConfig, JobTrigger};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const SERVICE_NAME: &str = "codeagent";
const REAP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "codeagent", version, about = "Run sandboxed code-generation agent jobs")]
struct Cli {
    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormatArg::Pretty, global = true)]
    log_format: LogFormatArg,

    /// Print Prometheus metrics to stdout before exiting
    #[arg(long, global = true)]
    print_metrics: bool,

    /// Model server base URL (overrides CODEAGENT_MODEL_BASE_URL)
    #[arg(long, global = true)]
    model_base_url: Option<String>,

    /// Model for the coding agent (overrides CODEAGENT_CODING_MODEL)
    #[arg(long, global = true)]
    coding_model: Option<String>,

    /// Model for the title and response generators
    #[arg(long, global = true)]
    generator_model: Option<String>,

    /// Maximum agent iterations per job
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Bearer token sent to the model server
    #[arg(long, env = "CODEAGENT_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save a prompt as a new user message and run the job for it
    Submit {
        /// Project to add the prompt to; a new project id is generated if omitted
        #[arg(long)]
        project_id: Option<String>,
        /// The prompt
        prompt: String,
    },
    /// Run jobs from trigger files ({"project_id": ..., "value": ...})
    Run {
        /// Trigger JSON files
        #[arg(required = true)]
        triggers: Vec<PathBuf>,
        /// Resume this run from its journal (single trigger only)
        #[arg(long)]
        run_id: Option<String>,
        /// Jobs executed at the same time
        #[arg(long, default_value_t = 2)]
        concurrency: usize,
    },
    /// Print the most recent messages of a project, oldest first
    History {
        #[arg(long)]
        project_id: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = configure(&cli);

    if let Err(e) = init_tracing(SERVICE_NAME, config.otlp_endpoint.as_deref(), cli.log_format.into()) {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    let result = run(cli.command, config, cli.api_key).await;

    if cli.print_metrics {
        print!("{}", encode_metrics());
    }
    shutdown_tracing();

    if let Err(e) = result {
        error!(error = %e, "codeagent failed");
        std::process::exit(1);
    }
}

/// Environment configuration with command-line overrides applied
fn configure(cli: &Cli) -> JobConfig {
    let mut config = JobConfig::from_env();
    if let Some(url) = &cli.model_base_url {
        config.model_base_url = url.clone();
    }
    if let Some(model) = &cli.coding_model {
        config.coding_model = model.clone();
    }
    if let Some(model) = &cli.generator_model {
        config.generator_model = model.clone();
    }
    if let Some(n) = cli.max_iterations {
        config.max_iterations = n;
    }
    config
}

async fn run(command: Command, config: JobConfig, api_key: Option<String>) -> Result<(), BoxError> {
    let store = Arc::new(FileMessageStore::new(&config.store_dir)?);

    match command {
        Command::Submit { project_id, prompt } => {
            let project_id = project_id.unwrap_or_else(|| Uuid::now_v7().to_string());
            let trigger = submit(store.as_ref(), &project_id, &prompt).await?;
            let job = build_job(config, store, api_key)?;
            run_one(&job, &trigger, &Uuid::now_v7().to_string()).await
        }
        Command::Run {
            triggers,
            run_id,
            concurrency,
        } => {
            if run_id.is_some() && triggers.len() > 1 {
                return Err("--run-id can only be used with a single trigger".into());
            }
            let mut loaded = Vec::with_capacity(triggers.len());
            for path in &triggers {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
                let trigger: JobTrigger = serde_json::from_str(&raw)
                    .map_err(|e| format!("invalid trigger {}: {}", path.display(), e))?;
                loaded.push(trigger);
            }

            let job = build_job(config, store, api_key)?;
            run_many(job, loaded, run_id, concurrency).await
        }
        Command::History { project_id, limit } => {
            let mut messages = store.recent_messages(&project_id, limit).await?;
            messages.reverse();
            println!("{}", serde_json::to_string_pretty(&messages)?);
            Ok(())
        }
    }
}

fn build_job(
    config: JobConfig,
    store: Arc<FileMessageStore>,
    api_key: Option<String>,
) -> Result<CodeAgentJob, BoxError> {
    let sandboxes = Arc::new(LocalSandboxProvider::new(&config.sandbox_dir, config.command_timeout)?);
    let _reaper = LocalSandboxProvider::start_reaper(sandboxes.clone(), REAP_INTERVAL);
    let journal = Arc::new(FileJournal::new(&config.journal_dir)?);

    let mut client = ChatClient::new(config.model_base_url.clone());
    if let Some(key) = api_key {
        client = client.with_api_key(key);
    }
    info!(
        model_base_url = %client.base_url(),
        coding_model = %config.coding_model,
        sandbox_dir = %config.sandbox_dir.display(),
        "Job runner configured"
    );

    Ok(CodeAgentJob::new(config, sandboxes, store, journal, Arc::new(client)))
}

async fn run_one(job: &CodeAgentJob, trigger: &JobTrigger, run_id: &str) -> Result<(), BoxError> {
    let output = job.run(trigger, run_id).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "run_id": run_id, "output": output }))?
    );
    Ok(())
}

/// Run triggers as independent tasks, at most `concurrency` at a time
async fn run_many(
    job: CodeAgentJob,
    triggers: Vec<JobTrigger>,
    run_id: Option<String>,
    concurrency: usize,
) -> Result<(), BoxError> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for trigger in triggers {
        let job = job.clone();
        let permits = permits.clone();
        let run_id = run_id.clone().unwrap_or_else(|| Uuid::now_v7().to_string());
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.map_err(|e| e.to_string())?;
            run_one(&job, &trigger, &run_id)
                .await
                .map_err(|e| format!("run {} for project {}: {}", run_id, trigger.project_id, e))
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "Job failed");
                failures += 1;
            }
            Err(e) => {
                error!(error = %e, "Job task panicked");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} job(s) failed", failures).into());
    }
    Ok(())
}
