/// Parley CLI - Main entry point
mod cli_app;

use parley_core::Config;
use std::env;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let (config, rest) = Config::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let bin = args.first().map(|s| s.as_str()).unwrap_or("parley");
    cli_app::run(bin, config, rest)
}
