use astsql::cli::{self, CheckOptions, CliError};
use astsql::TraversalOrder;
use clap::{Parser, Subcommand};
use std::io::{self, Read};

#[derive(Parser)]
#[command(name = "astsql")]
#[command(about = "astsql - grammar-constrained encoding of SQL objects as action sequences")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Round-trip dataset SQL objects through the action vocabulary
    Check {
        /// Path to a JSON file (reads from stdin if not provided)
        #[arg(short, long)]
        file: Option<String>,

        /// Encode breadth-first instead of depth-first
        #[arg(long)]
        breadth_first: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            file,
            breadth_first,
        } => run_check(file, breadth_first),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(file: Option<String>, breadth_first: bool) -> Result<(), CliError> {
    let input = match file {
        Some(path) => Some(std::fs::read_to_string(path).map_err(CliError::Io)?),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            Some(buffer)
        }
        None => None,
    };

    let options = CheckOptions {
        input,
        order: if breadth_first {
            TraversalOrder::BreadthFirst
        } else {
            TraversalOrder::DepthFirst
        },
    };

    let summary = cli::execute_check(&options)?;
    println!(
        "{} total, {} ok, {} skipped, {} failed",
        summary.total, summary.ok, summary.skipped, summary.failed
    );
    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
