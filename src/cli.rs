//! CLI command definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// dotflow - agentic pipeline engine driven by DOT-style graphs
#[derive(Parser)]
#[command(
    name = "dfl",
    about = "Run agentic pipelines described as DOT-style graphs",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Execute a pipeline graph
    Run {
        /// Graph description file
        graph: PathBuf,

        /// Override the graph's goal attribute
        #[arg(short, long)]
        goal: Option<String>,

        /// Run directory (default: runs/run-<timestamp>)
        #[arg(long)]
        run_dir: Option<PathBuf>,

        /// Where human-gate answers come from
        #[arg(long, value_enum, default_value = "console")]
        interviewer: InterviewerKind,
    },

    /// Parse a graph and report its structure
    Check {
        /// Graph description file
        graph: PathBuf,
    },

    /// Parse a graph and re-emit it in canonical form
    Emit {
        /// Graph description file
        graph: PathBuf,
    },
}

/// Interviewer selection for gate nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InterviewerKind {
    /// Prompt on the terminal
    Console,
    /// Approve everything without asking
    Auto,
    /// Exchange question/answer files through the gates directory
    File,
}
