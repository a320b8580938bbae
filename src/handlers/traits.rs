use std::time::Duration;

use async_trait::async_trait;
use clap::Command;
use thiserror::Error;

use crate::cli::Args;

/// What a single handler invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The URL was archived. `location` is a file path or a snapshot URL.
    Archived { location: String },
    /// Nothing was done, e.g. the output already exists and `--overwrite` is off.
    Skipped { reason: String },
}

/// Failure of one (handler, URL, handle) invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// An archiving mechanism that can be selected by handle name.
///
/// Implementations hold only read-only configuration, so the same value is
/// reused for every URL.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &'static str;

    /// Handle names this handler answers to. Must not be empty.
    fn handles(&self) -> &'static [&'static str];

    /// Add handler-specific flags to the command line.
    ///
    /// Flags must be named options; ids and long names must not clash with
    /// the global flags or with other handlers.
    fn add_arguments(&self, cmd: Command) -> Command {
        cmd
    }

    /// Archive `url` for one of [`Handler::handles`].
    ///
    /// `url` is already normalized. `handle` is the matched handle name; a
    /// handler with several requested handles is called once per handle.
    ///
    /// # Errors
    ///
    /// Returns an error if archiving fails. The error is scoped to this
    /// invocation only.
    async fn handle(&self, url: &str, args: &Args, handle: &str)
        -> Result<HandleOutcome, HandlerError>;
}
