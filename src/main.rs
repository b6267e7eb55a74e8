mod adapters;
mod cli;
mod config;
mod core;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::commands::log::LogFilter;
use crate::cli::{Cli, Commands};

fn main() {
    let args = Cli::parse();

    init_tracing(args.verbose, args.quiet);
    cli::context::init(args.config.as_deref());

    let result = match &args.command {
        Commands::Init => cli::commands::init::execute(args.source),
        Commands::Log {
            action,
            actor,
            target,
            status,
            since,
            last,
            json,
        } => LogFilter::from_args(
            action.clone(),
            actor.clone(),
            target.clone(),
            status.as_deref(),
            since.as_deref(),
        )
        .and_then(|filter| cli::commands::log::execute(args.source, filter, *last, *json)),
        Commands::Show { id } => cli::commands::show::execute(args.source, id),
        Commands::Status => cli::commands::status::execute(args.source),
    };

    if let Err(e) = result {
        cli::output::error(&format!("Error: {e}"));
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr; `RUST_LOG` wins over the flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
