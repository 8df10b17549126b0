//! dotflow - CLI entry point

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use dotflow::cli::{Cli, Command, InterviewerKind};
use dotflow::config::Config;
use dotflow::engine::{EngineConfig, OutcomeStatus, PipelineEngine};
use dotflow::graph::{Graph, parse};
use dotflow::handlers::{HandlerRegistry, StandardHandlers};
use dotflow::interview::{AutoApproveInterviewer, ConsoleInterviewer, FileInterviewer, Interviewer};
use dotflow::provider::{Provider, create_provider};

fn setup_logging(verbose: bool) {
    let default_level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Check { graph } => check(&graph),
        Command::Emit { graph } => emit(&graph),
        Command::Run {
            graph,
            goal,
            run_dir,
            interviewer,
        } => run(&config, &graph, goal, run_dir, interviewer).await,
    }
}

fn load_graph(path: &PathBuf) -> Result<Graph> {
    let source = std::fs::read_to_string(path).context(format!("Failed to read graph file {}", path.display()))?;
    parse(&source).map_err(|e| eyre::eyre!("{}: {}", path.display(), e))
}

fn check(path: &PathBuf) -> Result<()> {
    let graph = load_graph(path)?;
    println!("graph: {}", if graph.name.is_empty() { "(anonymous)" } else { &graph.name });
    println!("goal: {}", if graph.goal.is_empty() { "(unset)" } else { &graph.goal });
    println!("nodes: {}", graph.nodes.len());
    println!("edges: {}", graph.edges.len());
    for id in &graph.node_order {
        let node = &graph.nodes[id];
        println!("  {} [{}]", id, node.shape);
    }
    Ok(())
}

fn emit(path: &PathBuf) -> Result<()> {
    let graph = load_graph(path)?;
    print!("{}", graph.to_dot());
    Ok(())
}

async fn run(
    config: &Config,
    graph_path: &PathBuf,
    goal: Option<String>,
    run_dir: Option<PathBuf>,
    interviewer_kind: InterviewerKind,
) -> Result<()> {
    let mut graph = load_graph(graph_path)?;
    if let Some(goal) = goal {
        graph.set_attribute("goal", &goal);
    }

    let run_dir = run_dir.unwrap_or_else(|| {
        PathBuf::from("runs").join(format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%SZ")))
    });
    std::fs::create_dir_all(&run_dir).context("Failed to create run directory")?;

    let provider = create_provider(&config.llm.provider, &config.llm)
        .map_err(|e| eyre::eyre!("provider setup failed: {}", e))?;
    let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();
    providers.insert(config.llm.provider.clone(), provider);

    let interviewer: Arc<dyn Interviewer> = match interviewer_kind {
        InterviewerKind::Console => Arc::new(ConsoleInterviewer::new()),
        InterviewerKind::Auto => Arc::new(AutoApproveInterviewer),
        InterviewerKind::File => Arc::new(
            FileInterviewer::new(config.gates.dir.clone())
                .with_poll_interval(Duration::from_millis(config.gates.poll_interval_ms)),
        ),
    };

    let registry = HandlerRegistry::standard(StandardHandlers {
        providers,
        default_provider: config.llm.provider.clone(),
        default_model: config.llm.model.clone(),
        session_config: config.session.to_session_config(config.llm.max_tokens),
        interviewer,
        tool_timeout: Duration::from_millis(config.engine.tool_timeout_ms),
    });

    let engine = PipelineEngine::new(
        Arc::new(registry),
        EngineConfig {
            max_steps: config.engine.max_steps,
            retry_backoff: Duration::from_millis(config.engine.retry_backoff_ms),
        },
    );

    info!(graph = %graph.name, run_dir = %run_dir.display(), "starting pipeline run");
    let summary = engine.run(&graph, &run_dir).await?;

    println!("run finished: {}", summary.status.as_str());
    println!("visited: {}", summary.visited.join(" -> "));
    println!("artifacts: {}", run_dir.display());

    if summary.status == OutcomeStatus::Fail {
        std::process::exit(1);
    }
    Ok(())
}
