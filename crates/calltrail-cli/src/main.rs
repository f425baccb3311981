//! Calltrail CLI - Command-line interface for Calltrail
//!
//! Indexes a source tree into a persisted call/data-flow graph and answers
//! path and symbol queries against it.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "calltrail")]
#[command(author = "Calltrail Contributors")]
#[command(version)]
#[command(about = "Call graph and data-flow path finder for C, C++ and Python", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Index file to read or write (defaults to .calltrail/index.json)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Calltrail in a directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Index the codebase and save the graph
    Index {
        /// Path to index (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Worker threads (overrides the config file)
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Show index statistics
    Status,

    /// Find symbols whose name contains every pattern
    Search {
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Show the defining file
        #[arg(long)]
        show_path: bool,

        /// Keep index order instead of sorting by name
        #[arg(long)]
        nosort: bool,
    },

    /// List every symbol
    List {
        /// Keep index order instead of sorting by name
        #[arg(long)]
        nosort: bool,
    },

    /// Enumerate call paths between symbols
    Query(QueryArgs),

    /// Enumerate data-flow paths from a source into a variable
    Flow {
        #[arg(long)]
        source: String,

        #[arg(long)]
        variable: String,

        /// Stop after this many paths (0 = no limit)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },

    /// Print a symbol's type
    Type { symbol: String },

    /// Show where matching variables get their values
    Sources {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Show which variables matching symbols flow into
    Sinks {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// List variables, optionally filtered
    Vars {
        patterns: Vec<String>,

        /// Show the defining file
        #[arg(long)]
        show_path: bool,
    },

    /// Show assignments to a member variable
    Member {
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

#[derive(Args)]
pub struct QueryArgs {
    /// Start symbol, or a chain of symbols ending at the search start
    #[arg(long, num_args = 1..)]
    start: Vec<String>,

    /// End symbol, or a chain of symbols starting at the search end
    #[arg(long, num_args = 1.., default_value = "END")]
    end: Vec<String>,

    /// Trace back from the end symbol to every root
    #[arg(long)]
    backtrace: bool,

    /// Treat each symbol as a substring pattern
    #[arg(long)]
    pattern: bool,

    /// Show the defining file of each symbol
    #[arg(long)]
    show_path: bool,

    /// Stop after this many paths (0 = no limit)
    #[arg(short, long, default_value = "0")]
    limit: usize,
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let index = cli.index.as_deref();
    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Index { path, threads } => commands::index(&path, index, threads),
        Commands::Status => commands::status(index),
        Commands::Search {
            patterns,
            show_path,
            nosort,
        } => commands::search(index, &patterns, show_path, nosort),
        Commands::List { nosort } => commands::list(index, nosort),
        Commands::Query(args) => commands::query(index, &args),
        Commands::Flow {
            source,
            variable,
            limit,
        } => commands::flow(index, &source, &variable, limit),
        Commands::Type { symbol } => commands::symbol_type(index, &symbol),
        Commands::Sources { patterns } => commands::sources(index, &patterns),
        Commands::Sinks { patterns } => commands::sinks(index, &patterns),
        Commands::Vars {
            patterns,
            show_path,
        } => commands::vars(index, &patterns, show_path),
        Commands::Member { patterns } => commands::member(index, &patterns),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
