// z-agent binary: MCP server on stdio plus a small setup CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::EnvFilter;

use z_agent::mcp::ZAgentServer;
use z_agent::storage::init_storage;

#[derive(Parser)]
#[command(name = "z-agent", version, about = "Task, plan and lesson bookkeeping for agent workflows, served over MCP")]
struct Cli {
    /// Project root holding the .z-agent directory
    #[arg(long, env = "Z_AGENT_ROOT", default_value = ".")]
    root: PathBuf,

    /// Fail on malformed frontmatter instead of falling back to defaults
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server on stdio (the default)
    Serve,
    /// Create the .z-agent directory layout and exit
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the MCP wire protocol, so logging goes to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("z_agent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let storage = init_storage(cli.root, cli.strict);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Init => {
            storage.ensure_directories()?;
            println!("Initialized {}", storage.root().display());
        }
        Command::Serve => {
            storage.ensure_directories()?;
            let service = ZAgentServer::new(storage).serve(stdio()).await?;
            info!("z-agent MCP server running on stdio");
            service.waiting().await?;
        }
    }

    Ok(())
}
