mod config;
mod simulation;

use clap::{Parser, Subcommand, ValueEnum};
use config::HiveConfig;
use hive_orchestrator::{BackendRegistry, Orchestrator, SubmitTaskRequest};
use simulation::SimulatedFactory;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hive", about = "hive: swarm orchestrator for worker agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "hive.toml")]
    config: PathBuf,

    /// Use built-in defaults when the config file does not exist
    #[arg(long)]
    allow_defaults: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Override `swarm.min_agents`
    #[arg(long)]
    min_agents: Option<usize>,

    /// Override `swarm.max_agents`
    #[arg(long)]
    max_agents: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a simulated swarm, feed it tasks and print the final status
    Run {
        /// Number of tasks to submit
        #[arg(long, default_value_t = 50)]
        tasks: usize,
        /// How long to let the swarm run before shutting down
        #[arg(long, default_value_t = 10)]
        duration_secs: u64,
    },
    /// Load and validate the configuration, then print the effective values
    Validate,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = HiveConfig::load(&cli.config, cli.allow_defaults)
        .await?
        .with_bounds(cli.min_agents, cli.max_agents);
    config.swarm.validate()?;

    match cli.command {
        Commands::Validate => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Run {
            tasks,
            duration_secs,
        } => {
            let backends = BackendRegistry::new().with(Arc::new(SimulatedFactory::new(
                config.swarm.default_agent_kind.clone(),
                config.simulation.clone(),
            )));
            let swarm = Orchestrator::start(config.swarm.clone(), backends).await?;
            info!(
                agents = swarm.list_agents().await?.len(),
                tasks, duration_secs, "Swarm up; submitting tasks"
            );

            for n in 0..tasks {
                let request = SubmitTaskRequest::new("simulated", serde_json::json!({ "n": n }));
                let outcome = swarm.submit_task(request).await?;
                if let Some(position) = outcome.queue_position {
                    tracing::debug!(task_id = %outcome.task_id, position, "Task queued");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {}
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted; shutting down early");
                }
            }

            let status = swarm.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            swarm.shutdown().await?;
            info!("Swarm shut down");
        }
    }

    Ok(())
}
