//! CLI argument parsing using clap

use clap::{ArgGroup, Parser, Subcommand};

/// mantic - structural code search for AI coding agents
///
/// Ranks repository files by relevance to a natural-language query using
/// path structure, filename morphology and cached identifiers. File
/// contents are never searched during scoring.
#[derive(Parser, Debug)]
#[command(name = "mantic")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(group = ArgGroup::new("format").args(["json", "files", "markdown", "mcp"]))]
#[command(group = ArgGroup::new("type_filter").args(["code", "config", "test"]))]
pub struct Cli {
    /// Free-text query; multiple words are joined with spaces
    pub query: Vec<String>,

    /// Directory to scan (defaults to the current directory)
    #[arg(short = 'p', long, global = true)]
    pub path: Option<String>,

    /// Suppress the stats line on stderr
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// JSON output (default)
    #[arg(long)]
    pub json: bool,

    /// One path per line
    #[arg(long)]
    pub files: bool,

    /// Markdown summary
    #[arg(long)]
    pub markdown: bool,

    /// MCP text-content envelope
    #[arg(long)]
    pub mcp: bool,

    /// Only code files (tests included, deprioritised)
    #[arg(long)]
    pub code: bool,

    /// Only configuration files
    #[arg(long)]
    pub config: bool,

    /// Only test files
    #[arg(long)]
    pub test: bool,

    /// Keep generated files (lock files, build output) in results
    #[arg(long)]
    pub include_generated: bool,

    /// Attach dependency-graph impact analysis to each result
    #[arg(long)]
    pub impact: bool,

    /// Record this query and its top files into a session
    #[arg(long)]
    pub session: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage search sessions
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },

    /// Start the MCP stdio server
    Server,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Start a new session
    Start {
        /// Session name (defaults to the generated id)
        name: Option<String>,

        /// What this session is trying to accomplish
        #[arg(short = 'i', long)]
        intent: Option<String>,
    },

    /// List sessions, most recently active first
    List,

    /// Show one session with its boost candidates
    Info {
        /// Session id or active-session name
        id: String,
    },

    /// End a session
    End {
        /// Session id; defaults to the most recently active session
        id: Option<String>,
    },
}

impl Cli {
    pub fn output_format(&self) -> mantic::output::OutputFormat {
        use mantic::output::OutputFormat;
        if self.files {
            OutputFormat::Files
        } else if self.markdown {
            OutputFormat::Markdown
        } else if self.mcp {
            OutputFormat::Mcp
        } else {
            OutputFormat::Json
        }
    }

    pub fn type_filter(&self) -> Option<mantic::pipeline::TypeFilter> {
        use mantic::pipeline::TypeFilter;
        if self.code {
            Some(TypeFilter::Code)
        } else if self.config {
            Some(TypeFilter::Config)
        } else if self.test {
            Some(TypeFilter::Test)
        } else {
            None
        }
    }
}
