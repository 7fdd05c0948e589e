//! A small `clap`-derived command for ad-hoc plan inspection: given a
//! supergraph SDL file and an operation file, either validate the composed
//! schema or print the serialized query plan for the operation against it.
//!
//! Grounded in the sibling `apollo-federation-cli` crate's own binary shape
//! (a `clap::Parser` over a couple of subcommands delegating straight into
//! the library crate), trimmed to the two operations this planner supports.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use apollo_compiler::executable::ExecutableDocument;
use apollo_federation::{ComposedSchema, QueryPlanner, QueryPlannerConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apollo-federation-cli", about = "Federated query planner CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate a supergraph SDL file, reporting composition facts.
    Validate {
        /// Path to the supergraph SDL document.
        supergraph: PathBuf,
    },
    /// Plan an operation against a supergraph and print the serialized plan.
    Plan {
        /// Path to the supergraph SDL document.
        supergraph: PathBuf,
        /// Path to the GraphQL operation document.
        operation: PathBuf,
        /// Operation name to plan, if the document defines more than one.
        #[arg(long)]
        operation_name: Option<String>,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Validate { supergraph } => {
            let source = read(&supergraph)?;
            let schema = ComposedSchema::parse(&source).map_err(|e| e.to_string())?;
            println!(
                "supergraph is valid: {} subgraph(s)",
                schema.metadata().subgraphs.len()
            );
            for (name, info) in &schema.metadata().subgraphs {
                println!("  - {name} ({})", info.url);
            }
            Ok(())
        }
        Command::Plan {
            supergraph,
            operation,
            operation_name,
        } => {
            let supergraph_source = read(&supergraph)?;
            let operation_source = read(&operation)?;

            let schema = ComposedSchema::parse(&supergraph_source).map_err(|e| e.to_string())?;
            let document = ExecutableDocument::parse_and_validate(
                schema.schema(),
                &operation_source,
                operation.display().to_string(),
            )
            .map_err(|e| e.to_string())?;

            let planner = QueryPlanner::new(schema, QueryPlannerConfig::default());
            let plan = planner
                .build_query_plan(&document, operation_name.as_deref())
                .map_err(|e| e.to_string())?;

            println!("{plan}");
            Ok(())
        }
    }
}

fn read(path: &PathBuf) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))
}
