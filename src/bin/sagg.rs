//! sagg CLI - Combine a project's Python files into one LLM-ready text file.

use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser, ValueEnum};
use clap_complete::{generate, Shell};
use sagg::aggregate::Aggregator;
use sagg::errors::{exit_code, SaggError};
use sagg::report::{format_report, ReportFormat};
use sagg::tokens::Encoding;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sagg")]
#[command(about = "Combine source files from a directory tree into a single file")]
#[command(version)]
struct Cli {
    /// Root directory to scan
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Remove comments and docstrings from the files
    #[arg(short = 'r', long)]
    remove_comments: bool,

    /// File the combined sections are written to
    #[arg(short = 'o', long, default_value = "combined_code.txt")]
    output_file: PathBuf,

    /// Directory levels below the root to search (0 = root only)
    #[arg(short = 'd', long, default_value_t = 1)]
    search_depth: usize,

    /// Show only definitions instead of full file content
    #[arg(short = 's', long)]
    show_defs: bool,

    /// Write files matching this path or glob verbatim (repeatable)
    #[arg(short = 'e', long, value_name = "PATTERN")]
    no_filter_for: Vec<String>,

    /// Extension of the files to combine
    #[arg(long, default_value = "py")]
    extension: String,

    /// Include hidden files and directories
    #[arg(long)]
    include_hidden: bool,

    /// Do not apply .gitignore rules
    #[arg(long)]
    no_gitignore: bool,

    /// Token encoding for the summary
    #[arg(long, default_value = "cl100k")]
    encoding: EncodingArg,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Log per-file details (repeat for trace output)
    #[arg(short = 'v', long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(Clone, ValueEnum)]
enum EncodingArg {
    Cl100k,
    O200k,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Cl100k => Encoding::Cl100kBase,
            EncodingArg::O200k => Encoding::O200kBase,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "sagg", &mut std::io::stdout());
        return;
    }

    init_logging(&cli);

    let json_output = cli.json;
    if let Err(e) = run(cli) {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

/// Diagnostics go to stderr; RUST_LOG overrides the flag-derived level.
fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), SaggError> {
    let mut aggregator = Aggregator::new(&cli.root)
        .search_depth(cli.search_depth)
        .extension(cli.extension.trim_start_matches('.'))
        .remove_comments(cli.remove_comments)
        .show_definitions(cli.show_defs)
        .include_hidden(cli.include_hidden)
        .respect_gitignore(!cli.no_gitignore)
        .encoding(cli.encoding.into());

    for pattern in cli.no_filter_for {
        aggregator = aggregator.exempt(pattern);
    }

    let report = aggregator.run(&cli.output_file)?;

    let format = if cli.json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    println!("{}", format_report(&report, format)?);

    Ok(())
}
