use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use flow_engine::exchange::{export_to_file, import_from_file};
use flow_engine::{
    builtin_templates, diff_graphs, export_json, find_template, topological_order,
    validate_workflow, EngineConfig, IdPolicy, IntentParser, LogEventSink, Session,
    WorkflowGraph,
};

/// flowsim - simulate workflow canvas graphs from JSON files
#[derive(Parser)]
#[command(name = "flowsim")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to an engine config file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a graph and print the run record
    Run {
        /// Graph document (`{ nodes, edges }`)
        graph: PathBuf,
    },

    /// Check a graph for structural problems
    Validate { graph: PathBuf },

    /// Show what changed from one graph to another
    Diff { old: PathBuf, new: PathBuf },

    /// Print the topological execution order
    Order { graph: PathBuf },

    /// List the built-in templates
    Templates,

    /// Print or save a built-in template's graph
    Template {
        id: String,
        /// Write the graph document here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Generate a graph from a plain-language description
    Generate {
        text: String,
        /// Write the graph document here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .await
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Run { graph } => run_graph(&graph, config).await,
        Commands::Validate { graph } => validate(&graph),
        Commands::Diff { old, new } => diff(&old, &new),
        Commands::Order { graph } => order(&graph),
        Commands::Templates => {
            for template in builtin_templates() {
                println!(
                    "{:<18} {:<24} {:<14} saves {}",
                    template.id, template.name, template.category, template.time_saved
                );
            }
            Ok(())
        }
        Commands::Template { id, out } => {
            let template = find_template(&id)?;
            write_graph(&template.graph(), out.as_deref())
        }
        Commands::Generate { text, out } => {
            let graph = IntentParser::new()
                .generate(&text)
                .context("could not generate a workflow")?;
            write_graph(&graph, out.as_deref())
        }
    }
}

fn load_graph(path: &Path) -> Result<WorkflowGraph> {
    import_from_file(path, IdPolicy::Preserve)
        .with_context(|| format!("failed to read graph: {}", path.display()))
}

fn write_graph(graph: &WorkflowGraph, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            export_to_file(graph, path)
                .with_context(|| format!("failed to write graph: {}", path.display()))?;
            eprintln!("Wrote {} node(s) to {}", graph.nodes.len(), path.display());
        }
        None => println!("{}", export_json(graph)?),
    }
    Ok(())
}

async fn run_graph(path: &Path, config: EngineConfig) -> Result<()> {
    let graph = load_graph(path)?;
    let mut session = Session::open(config).context("failed to open session state")?;
    session.load_graph(graph)?;

    let record = session.run(&LogEventSink).await;
    println!("{}", serde_json::to_string_pretty(&record)?);

    if let Some(node_id) = &record.failed_node {
        bail!("run {} failed at node '{}'", record.id, node_id);
    }
    eprintln!(
        "Run {} completed: {} node(s) in {}ms",
        record.id,
        record.steps.len(),
        record.total_duration_ms()
    );
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let graph = load_graph(path)?;
    let errors = validate_workflow(&graph);
    if errors.is_empty() {
        println!("{}: ok", path.display());
        return Ok(());
    }

    for error in &errors {
        println!("{}", error);
    }
    bail!("{} problem(s) found in {}", errors.len(), path.display());
}

fn diff(old: &Path, new: &Path) -> Result<()> {
    let diff = diff_graphs(&load_graph(old)?, &load_graph(new)?);
    eprintln!("{}", diff.summary_line());
    println!("{}", serde_json::to_string_pretty(&diff)?);
    Ok(())
}

fn order(path: &Path) -> Result<()> {
    let plan = topological_order(&load_graph(path)?);
    for (index, node_id) in plan.order.iter().enumerate() {
        println!("{:>3}. {}", index + 1, node_id);
    }
    if !plan.is_complete() {
        eprintln!("Not scheduled (cycle): {}", plan.excluded.join(", "));
    }
    Ok(())
}
