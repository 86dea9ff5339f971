// prx-aws-creds - temporary AWS credentials for PRX dev tools

mod cli;

use clap::Parser;

fn main() {
    // Parse CLI arguments first to get verbose flag
    let args = cli::Cli::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Logs go to stderr; stdout is reserved for exports and JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::execute(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
