//! skein: trace inspection CLI.
//!
//! Consumes the trace log written by `skein-trace` and turns it into a
//! human-viewable document (`visualize`) or a quick terminal summary
//! (`stats`). The core engine is untouched by this binary; it only reads
//! the sink path handed to it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use skein_render::write_html;
use skein_trace::{DEFAULT_TRACE_FILE, TraceReader, group_by_trace};

/// Trace inspection for LLM applications
#[derive(Parser)]
#[command(name = "skein")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the trace log as an interactive HTML document
    Visualize {
        /// Path to the trace log
        #[arg(long, default_value = DEFAULT_TRACE_FILE)]
        log: PathBuf,

        /// Output path for the HTML document
        #[arg(long, default_value = "trace_visualization.html")]
        out: PathBuf,
    },

    /// Print per-trace span and error counts from the trace log
    Stats {
        /// Path to the trace log
        #[arg(long, default_value = DEFAULT_TRACE_FILE)]
        log: PathBuf,
    },
}

/// Initialize logging to stderr for interactive use.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Visualize { log, out } => {
            let written = write_html(&log, &out)
                .with_context(|| format!("rendering {}", log.display()))?;
            println!("Wrote {}", written.display());
        }
        Commands::Stats { log } => {
            let records = TraceReader::new(&log)
                .load()
                .with_context(|| format!("loading {}", log.display()))?;
            info!("loaded {} span record(s)", records.len());

            let groups = group_by_trace(records);
            if groups.is_empty() {
                println!("No traces in {}", log.display());
                return Ok(());
            }

            println!("{} trace(s)", groups.len());
            for group in &groups {
                let errors = group
                    .records
                    .iter()
                    .filter(|r| r.status.is_error())
                    .count();
                println!(
                    "  {}  {} span(s), {} error(s)",
                    group.trace_id,
                    group.records.len(),
                    errors
                );
            }
        }
    }

    Ok(())
}
