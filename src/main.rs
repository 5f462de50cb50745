use clap::Parser;
use tracing_subscriber::EnvFilter;

use hitstream::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("hitstream=debug,info")
    } else {
        EnvFilter::new("hitstream=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Convert(args) => {
            cli::convert::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Detect(args) => {
            cli::detect::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
