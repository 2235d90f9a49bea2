//! CLI entry point for graphsync.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use graphsync_core::{EntityRef, SchemaRegistry};
use graphsync_cypher::{GraphClient, GraphSession};

use graphsync_cli::config::CliConfig;
use graphsync_cli::input::{load_graph, load_schema, roots, write_outcome};
use graphsync_cli::report::dry_run;

#[derive(Parser)]
#[command(name = "graphsync")]
#[command(about = "Persist JSON object graphs to Neo4j")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: graphsync).
    #[arg(short, long, default_value = "graphsync", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Print the statements a save would run, without connecting.
    Plan(GraphArgs),
    /// Save the graph and write back the ids the store assigned.
    Save {
        #[command(flatten)]
        graph: GraphArgs,

        /// Where to write the updated graph (default: overwrite --graph).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete one entity's node and every relationship touching it.
    Delete {
        #[command(flatten)]
        graph: GraphArgs,

        /// Index of the entity to delete.
        #[arg(short, long)]
        entity: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct GraphArgs {
    /// JSON array of entity descriptors.
    #[arg(short, long)]
    schema: PathBuf,

    /// JSON object graph.
    #[arg(short, long)]
    graph: PathBuf,

    /// Root entity indices (default: every entity).
    #[arg(short, long)]
    root: Vec<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config = CliConfig::load(&cli.config)?;

    match cli.command {
        Command::Plan(args) => {
            let registry = load_schema(&args.schema)?;
            let graph = load_graph(&args.graph)?;
            let roots = roots(&graph, &args.root)?;
            let run = dry_run(&registry, &graph, &roots, &config.mapper);
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        Command::Save { graph: args, output } => {
            let registry = Arc::new(load_schema(&args.schema)?);
            let mut graph = load_graph(&args.graph)?;
            let roots = roots(&graph, &args.root)?;

            let mut session = connect(&config, registry).await?;
            let outcome = session.save_all(&mut graph, &roots).await;
            let path = output.as_ref().unwrap_or(&args.graph);
            let report = write_outcome(path, &graph, outcome)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Delete {
            graph: args,
            entity,
            output,
        } => {
            let registry = Arc::new(load_schema(&args.schema)?);
            let mut graph = load_graph(&args.graph)?;
            roots(&graph, &[entity])?;

            let mut session = connect(&config, registry).await?;
            let outcome = session.delete(&mut graph, EntityRef(entity)).await;
            let path = output.as_ref().unwrap_or(&args.graph);
            let report = write_outcome(path, &graph, outcome)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn connect(
    config: &CliConfig,
    registry: Arc<SchemaRegistry>,
) -> anyhow::Result<GraphSession> {
    let client = GraphClient::connect(&config.neo4j).await?;
    Ok(GraphSession::new(client, registry, &config.mapper))
}
