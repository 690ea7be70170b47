use clap::Parser;
use gravflip_cli::commands::{Cmd, Command};

/// Gravflip CLI
///
/// Gravflip rewrites orientation-sensitive arithmetic in method bodies into calls to
/// invert-aware transforms, and can evaluate the result under either gravity orientation.
#[derive(Parser)]
#[command(name = "gravflip")]
#[command(about = "Gravflip: gravity-inverting bytecode rewriter")]
struct Cli {
    /// Log rewrite and evaluation details.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Cmd,
}

/// Runs the Gravflip CLI with the provided arguments.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute()
}
