//! Entity validation CLI
//!
//! # Usage
//!
//! ```bash
//! # Validate one payload against a rules document
//! entity-validate validate --type contact --payload contact.json --rules rules.yaml
//!
//! # Validate a batch of entities
//! entity-validate bulk --entities entities.json --rules rules.yaml --records records.json
//!
//! # Summarize persisted outcomes
//! entity-validate report daily --results outcomes.json --date 2024-03-06
//!
//! # Run the scheduled monitor against a results service
//! entity-validate monitor --results-url http://localhost:8080
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success - validation passed
//! - 1: Validation failed with errors
//! - 2: Validation passed with warnings
//! - 3: Invalid input or arguments
//! - 4: File not found or inaccessible
//! - 10: Internal error

use clap::Parser;
use tracing_subscriber::EnvFilter;
use validation_engine::{run_cli, EntityCli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = EntityCli::parse();
    init_tracing(&cli)?;

    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}

fn init_tracing(cli: &EntityCli) -> anyhow::Result<()> {
    let default_level = if cli.quiet {
        tracing::Level::ERROR
    } else {
        match cli.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };
    let filter = EnvFilter::from_default_env().add_directive(default_level.into());

    if std::env::var("VALIDATION_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }
    Ok(())
}
