//! Frederick CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or missing configuration
//! - 3: Validation failure
//! - 4: Composition error
//! - 5: External collaborator failure

use std::process::ExitCode;

use clap::Parser;
use frederick_compose::{ComposeError, ErrorKind};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const COMPOSITION_ERROR: u8 = 4;
    pub const EXTERNAL_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "frederick=debug,info"
    } else {
        "frederick=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Already initialised when embedded; keep going.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args).await,
        Commands::Create(args) => commands::create::execute(args).await,
        Commands::Deploy(args) => commands::deploy::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Map an error to its exit code by the first composition error in the chain.
fn categorize_error(e: &anyhow::Error) -> u8 {
    let kind = e
        .chain()
        .find_map(|cause| cause.downcast_ref::<ComposeError>())
        .map(ComposeError::kind);

    match kind {
        Some(ErrorKind::Config) => ExitCodes::INVALID_ARGS,
        Some(ErrorKind::Validation) => ExitCodes::VALIDATION_FAILURE,
        Some(ErrorKind::Composition) => ExitCodes::COMPOSITION_ERROR,
        Some(ErrorKind::External) => ExitCodes::EXTERNAL_ERROR,
        Some(ErrorKind::Io) | None => ExitCodes::GENERAL_ERROR,
    }
}
