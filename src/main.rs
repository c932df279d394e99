//! Feedback Query - command line entry point
//!
//! Answers questions against the configured vector store and model gateways.
//! Results are printed as JSON in the same shape the query service returns.

use clap::{Parser, Subcommand};
use feedback_query::core::error::{QueryError, Result};
use feedback_query::engine::{ErrorResponse, HealthResponse, QueryService};
use feedback_query::{EngineConfig, Plan};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

const DEFAULT_CONFIG: &str = "config/engine.toml";

/// Ask natural-language questions about citizen feedback
#[derive(Parser, Debug)]
#[command(name = "feedback-query")]
#[command(about = "Plan and execute natural-language questions over citizen feedback")]
struct Cli {
    /// Engine configuration file (TOML); defaults apply when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan, execute and print the answer to a question
    Ask { question: Vec<String> },
    /// Print the plan for a question without executing it
    Plan { question: Vec<String> },
    /// Execute a plan read from a JSON file
    Run { plan: PathBuf },
    /// Interactive question loop
    Repl,
    /// Report liveness without contacting any collaborator
    Health,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => EngineConfig::load(Path::new(DEFAULT_CONFIG)),
        None => Ok(EngineConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_error(e: &QueryError) -> Result<()> {
    print_json(&ErrorResponse::from(e))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedback_query=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    if let Command::Health = cli.command {
        return print_json(&HealthResponse::ok());
    }

    let rt = Runtime::new()?;
    let service = QueryService::from_config(config)?;

    let ok = match cli.command {
        Command::Ask { question } => {
            let question = question.join(" ");
            match rt.block_on(service.respond(&question)) {
                Ok(response) => print_json(&response).map(|_| true)?,
                Err(response) => print_json(&response).map(|_| false)?,
            }
        }
        Command::Plan { question } => match rt.block_on(service.plan(&question.join(" "))) {
            Ok(plan) => print_json(&plan).map(|_| true)?,
            Err(e) => print_error(&e).map(|_| false)?,
        },
        Command::Run { plan } => {
            let plan: Plan = serde_json::from_str(&std::fs::read_to_string(plan)?)?;
            match rt.block_on(service.run_plan(plan)) {
                Ok(response) => print_json(&response).map(|_| true)?,
                Err(e) => print_error(&e).map(|_| false)?,
            }
        }
        Command::Repl => {
            repl(&rt, &service)?;
            true
        }
        Command::Health => true,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn repl(rt: &Runtime, service: &QueryService) -> Result<()> {
    println!("\n=== FEEDBACK QUERY ===");
    println!("Ask a question about citizen feedback.");
    println!();
    println!("Commands:");
    println!("  plan <question> - Show the plan without executing it");
    println!("  quit / q        - Exit");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input == "quit" || input == "q" {
            break;
        }

        if let Some(question) = input.strip_prefix("plan ") {
            match rt.block_on(service.plan(question)) {
                Ok(plan) => print_json(&plan)?,
                Err(e) => print_error(&e)?,
            }
            continue;
        }

        match rt.block_on(service.respond(input)) {
            Ok(response) => print_json(&response)?,
            Err(response) => print_json(&response)?,
        }
    }

    println!("\nGoodbye!");
    Ok(())
}
