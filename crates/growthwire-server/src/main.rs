// crates/growthwire-server/src/main.rs
// ============================================================================
// Module: Growthwire Server Entry Point
// Description: Binary entry point for the ingestion server.
// Purpose: Load configuration, build the server, and serve until failure.
// Dependencies: clap, growthwire-server, tokio
// ============================================================================

//! ## Overview
//! Parses the command line, loads and validates the configuration file, and
//! runs the HTTP server with its enrichment reconciler. All failures are
//! reported on stderr with a non-zero exit code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use growthwire_server::GrowthwireServer;
use growthwire_server::ServerError;
use growthwire_server::config;

// ============================================================================
// SECTION: CLI
// ============================================================================

/// Command line arguments for the ingestion server.
#[derive(Debug, Parser)]
#[command(name = "growthwire-server", about = "Secure growth telemetry ingestion server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: PathBuf,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Server entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "growthwire-server: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration and serves until the transport fails.
async fn run() -> Result<(), ServerError> {
    let cli = Cli::parse();
    let loaded =
        config::load(&cli.config).map_err(|err| ServerError::Config(err.to_string()))?;
    GrowthwireServer::from_config(&loaded)?.serve().await
}
