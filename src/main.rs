use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contract_rag::config::Config;
use contract_rag::mcp::server::{McpContext, McpServer};
use contract_rag::retriever::StrategyKind;
use contract_rag::session::{AnalyzeOptions, Session};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contract-rag", version, about = "Contract clause extraction and risk rating")]
struct Cli {
    /// Path to the JSON config file (default: contract-rag.json)
    #[arg(short, long, global = true, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build (or reuse) the index for a contract
    Index {
        contract: PathBuf,
        #[arg(long)]
        rebuild: bool,
    },
    /// Extract, summarize and rate every configured clause type
    Analyze {
        contract: PathBuf,
        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Suggest revisions for HIGH-risk clauses
        #[arg(long)]
        redline: bool,
        /// Include answers to the standard contract questions
        #[arg(long)]
        qa: bool,
        #[arg(long)]
        rebuild: bool,
    },
    /// Ask one question about a contract
    Query {
        contract: PathBuf,
        question: String,
        /// similarity | diverse | reranked (default from config)
        #[arg(long)]
        strategy: Option<StrategyKind>,
        #[arg(long)]
        rebuild: bool,
    },
    /// List the indexes stored in the database
    Indexes {
        /// Delete this namespace first
        #[arg(long)]
        delete: Option<String>,
    },
    /// Serve the MCP tools over stdio
    Serve,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 1. Load config
    let mut config = Config::load(&cli.config)?;
    config.apply_env_overrides();

    // 2. Validate and connect the oracles, outside any async runtime
    let mut session = Session::from_config(config)?;

    match cli.command {
        Command::Index { contract, rebuild } => {
            let summary = session.index_contract(&contract, rebuild)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Analyze {
            contract,
            output,
            redline,
            qa,
            rebuild,
        } => {
            let options = AnalyzeOptions {
                redline,
                qa,
                rebuild,
            };
            let report = session.analyze(&contract, options)?;
            match output {
                Some(path) => {
                    report.write(&path)?;
                    eprint!("{}", report.render_summary());
                }
                None => println!("{}", report.to_json()?),
            }
        }
        Command::Query {
            contract,
            question,
            strategy,
            rebuild,
        } => {
            let result = session.query(&contract, &question, strategy, rebuild)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Indexes { delete } => {
            if let Some(namespace) = delete {
                if !session.delete_index(&namespace)? {
                    eprintln!("No index named '{namespace}'");
                }
            }
            println!("{}", serde_json::to_string_pretty(&session.list_indexes()?)?);
        }
        Command::Serve => serve(session)?,
    }

    Ok(())
}

fn serve(session: Session) -> Result<()> {
    info!("Starting contract-rag MCP server...");
    let ctx = McpContext::new(session);
    // Last handle to the session is dropped here, after the runtime is gone
    let keep_alive = Arc::clone(&ctx.session);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let result = runtime.block_on(McpServer::new(ctx).start());
    drop(runtime);
    drop(keep_alive);
    result
}
