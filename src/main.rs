//! rfp-chat CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rfp_chat::cli::{Cli, execute};

#[allow(clippy::print_stdout)]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = execute(&cli)?;
    if !output.is_empty() {
        print!("{output}");
        if !output.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rfp_chat=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rfp_chat=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
