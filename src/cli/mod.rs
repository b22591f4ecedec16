//! CLI module for delve
//!
//! Provides command-line interface parsing and handling for the delve binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;
pub mod research;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// delve - durable multi-agent research
///
/// Turns a question into a researched report: triage, optional clarifying
/// questions, planned web searches run concurrently, and a written report.
#[derive(Parser, Debug)]
#[command(
    name = "delve",
    version,
    about = "delve - durable multi-agent research",
    long_about = "Turns a question into a researched report: triage, optional clarifying\n\
                  questions, planned web searches run concurrently, and a written report.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  delve init                                   # Scaffold delve.toml\n    \
                  delve research \"best restaurants in Melbourne\" # Interactive research\n    \
                  delve research --non-interactive \"Tokyo population\"\n    \
                  delve serve --config my.toml                 # Start the HTTP server"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "delve.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create delve.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files without prompting
        #[arg(short, long)]
        force: bool,

        /// Agent endpoint to configure (ollama or openai)
        #[arg(long, default_value = "ollama")]
        provider: String,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "3000")]
        port: u16,
    },

    /// Start the HTTP server
    Serve,

    /// Research a query from the terminal
    Research {
        /// The question to research
        query: String,

        /// Skip triage and clarifying questions
        #[arg(short, long)]
        non_interactive: bool,

        /// Render the report to a file after writing it
        #[arg(short, long)]
        artifact: bool,

        /// Run id (generated when omitted)
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Inspect the agent configuration set
    #[command(subcommand)]
    Agent(AgentCommands),
}

/// Agent inspection subcommands
#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// List all agents
    List,

    /// Show details for one agent kind
    Show {
        /// Agent kind (triage, clarifying, planner, search, writer, artifact)
        kind: String,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
