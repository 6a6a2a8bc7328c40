use anyhow::Result;
use clap::Parser;
use minibank::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Log to stderr so command output on stdout stays clean. RUST_LOG
    // controls verbosity; defaults to warnings and up.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli.run().await
}
