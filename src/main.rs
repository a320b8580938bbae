use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use asak::cli::{self, CliError};
use asak::config::Config;
use asak::dispatch::Dispatcher;
use asak::handlers::{self, NormalizeOptions};
use asak::logging;
use asak::macros::MacroStore;
use asak::selection;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            // The subscriber may not be installed yet.
            if tracing::dispatcher::has_been_set() {
                error!("Fatal error: {e:#}");
            } else {
                eprintln!("asak: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let registry = handlers::default_registry(&config).context("Failed to set up handlers")?;

    let args = match cli::parse_from(&registry, std::env::args_os()) {
        Ok(args) => args,
        // Prints usage or help and exits with clap's status.
        Err(CliError::Usage(e)) => e.exit(),
        Err(CliError::NoUrls) => {
            eprintln!("error: {}", CliError::NoUrls);
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e).context("Invalid handler flags"),
    };

    if let Some(path) = logging::init(args.debug, args.log.as_deref())? {
        debug!(path = %path.display(), "Logging to file");
    }
    debug!(handlers = ?registry, "Handlers registered");

    let macros = MacroStore::load(&config.macros_file).context("Failed to load macros")?;

    let requested = match selection::resolve(&macros, &args.macros, &args.use_handles, &registry) {
        Ok(requested) => requested,
        Err(e) => {
            error!("{e}. Exiting...");
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(handles = ?requested, urls = args.urls.len(), "Starting");

    let dispatcher = Dispatcher::new(
        &registry,
        config.handler_timeout,
        NormalizeOptions {
            strip_tracking: config.strip_tracking,
        },
    );
    let report = dispatcher.run(&args.urls, &args, &requested).await;

    info!(
        invocations = report.invocations,
        archived = report.archived,
        skipped = report.skipped,
        failed = report.failed_invocations(),
        malformed_urls = report.malformed_urls(),
        "Done"
    );

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
