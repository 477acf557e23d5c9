//! `overwatch` binary: loads `overwatch.toml`, wires the components together
//! and runs the orchestrator.

mod config;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use config::OverwatchConfig;
use overwatch_core::OverwatchResult;
use overwatch_decision::{DecisionEngine, DecisionRequest};
use overwatch_notify::NotificationRouter;
use overwatch_orchestrator::{Assignment, Orchestrator, Runtime, TaskExecutor, TaskSubmission};
use overwatch_quality::QualityGatePipeline;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "overwatch", about = "Overwatch: autonomous task orchestration with human escalation")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "overwatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator until Ctrl-C
    Run {
        /// JSON file with an array of task submissions to enqueue at startup
        #[arg(long)]
        tasks: Option<PathBuf>,
    },
    /// Load the config, build every component and report what was found
    Validate,
    /// Score one assignment and print the decision
    Decide {
        /// Agent kind performing the action
        #[arg(long)]
        kind: String,
        /// Action type used for historical similarity (defaults to the kind)
        #[arg(long)]
        action_type: Option<String>,
        /// JSON file with the task context
        #[arg(long)]
        context: PathBuf,
        /// Performance score of the agent
        #[arg(long, default_value_t = 0.8)]
        performance: f64,
    },
    /// Run the quality gate over a context and print the result
    Evaluate {
        /// JSON file with the context to evaluate
        #[arg(long)]
        context: PathBuf,
    },
}

/// Executor used by the binary. The actual work is done elsewhere; this one
/// only records the assignment and hands the context to the quality gate.
struct LoggingExecutor;

#[async_trait]
impl TaskExecutor for LoggingExecutor {
    async fn execute(&self, assignment: &Assignment) -> OverwatchResult<serde_json::Value> {
        info!(
            task_id = %assignment.task_id,
            kind = %assignment.task_kind,
            agent = %assignment.agent_id,
            action = %assignment.decision.action,
            "Executing task"
        );
        Ok(serde_json::json!({}))
    }
}

struct Components {
    orchestrator: Orchestrator,
    router: Arc<NotificationRouter>,
}

fn build(config: &OverwatchConfig) -> anyhow::Result<Components> {
    let kinds: Vec<String> = config.agents.iter().map(|a| a.kind.clone()).collect();
    let decision = Arc::new(DecisionEngine::new(config.decision.clone(), kinds)?);
    let quality = Arc::new(QualityGatePipeline::with_builtin_checkers(
        config.quality.clone(),
    )?);

    let mut router = NotificationRouter::new(config.notifications.clone());
    for channel in config.build_channels()? {
        router.add_channel(channel);
    }
    router.validate()?;
    let router = Arc::new(router);

    let orchestrator = Orchestrator::builder(config.orchestrator.clone())
        .agents(config.agents.iter().cloned())
        .task_kinds(config.task_kinds.iter().cloned())
        .decision_engine(decision)
        .quality_gate(quality)
        .router(router.clone())
        .executor(Arc::new(LoggingExecutor))
        .build()?;

    Ok(Components {
        orchestrator,
        router,
    })
}

async fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { tasks } => {
            let config = OverwatchConfig::load(&cli.config).await?;
            let Components {
                orchestrator,
                router,
            } = build(&config)?;

            if let Some(path) = tasks {
                let submissions: Vec<TaskSubmission> = serde_json::from_value(read_json(&path).await?)
                    .with_context(|| format!("'{}' is not a list of task submissions", path.display()))?;
                for submission in submissions {
                    orchestrator.submit(submission).await?;
                }
            }

            let handle = Runtime::spawn(orchestrator.clone(), router);
            info!("Overwatch running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
            handle.shutdown().await;

            let status = orchestrator.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Validate => {
            let config = OverwatchConfig::load(&cli.config).await?;
            let Components {
                orchestrator,
                router,
            } = build(&config)?;
            let status = orchestrator.status().await;
            println!("Configuration OK");
            println!("  agents:     {}", status.agents.len());
            println!("  task kinds: {}", config.task_kinds.len());
            println!("  channels:   {}", router.channel_names().join(", "));
            println!(
                "  tick:       every {}s, up to {} assignments",
                config.orchestrator.tick_period_secs, config.orchestrator.max_assignments_per_tick
            );
        }
        Commands::Decide {
            kind,
            action_type,
            context,
            performance,
        } => {
            let config = OverwatchConfig::load(&cli.config).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Using default decision config");
                OverwatchConfig::default()
            });
            let engine = DecisionEngine::new(config.decision, [kind.as_str()])?;
            let context = read_json(&context).await?;
            let decision = engine.decide(&DecisionRequest {
                agent_kind: &kind,
                action_type: action_type.as_deref().unwrap_or(&kind),
                context: &context,
                agent_performance: performance,
            })?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Evaluate { context } => {
            let config = OverwatchConfig::load(&cli.config).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Using default quality config");
                OverwatchConfig::default()
            });
            let pipeline = QualityGatePipeline::with_builtin_checkers(config.quality)?;
            let context = read_json(&context).await?;
            let result = pipeline.evaluate(&context).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
