//! Runs the requested handles against every URL.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cli::Args;
use crate::handlers::{normalize_url, HandleOutcome, HandlerError, HandlerRegistry, NormalizeOptions};
use crate::selection::RequestSet;

/// One failed invocation, or a URL that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub url: String,
    /// `None` for URLs rejected before any handler ran.
    pub handler: Option<&'static str>,
    pub handle: Option<String>,
    pub message: String,
}

/// Tally of a dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub invocations: usize,
    pub archived: usize,
    pub skipped: usize,
    pub failures: Vec<Failure>,
}

impl DispatchReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failed invocations, excluding malformed URLs.
    #[must_use]
    pub fn failed_invocations(&self) -> usize {
        self.failures.iter().filter(|f| f.handler.is_some()).count()
    }

    /// URLs skipped because they could not be normalized.
    #[must_use]
    pub fn malformed_urls(&self) -> usize {
        self.failures.iter().filter(|f| f.handler.is_none()).count()
    }
}

/// Sequential dispatcher. Every invocation is awaited before the next one
/// starts, and a failure never stops later invocations.
pub struct Dispatcher<'a> {
    registry: &'a HandlerRegistry,
    timeout: Duration,
    normalize: NormalizeOptions,
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(registry: &'a HandlerRegistry, timeout: Duration, normalize: NormalizeOptions) -> Self {
        Self {
            registry,
            timeout,
            normalize,
        }
    }

    /// Archive every URL with every handler whose handles intersect `requested`.
    pub async fn run(&self, urls: &[String], args: &Args, requested: &RequestSet) -> DispatchReport {
        let mut report = DispatchReport::default();

        if requested.is_empty() {
            info!("No handles requested, nothing to do");
            return report;
        }

        for raw in urls {
            let url = match normalize_url(raw, &self.normalize) {
                Ok(url) => url,
                Err(e) => {
                    error!(url = %raw, error = %e, "Skipping malformed URL");
                    report.failures.push(Failure {
                        url: raw.clone(),
                        handler: None,
                        handle: None,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            debug!(input = %raw, url = %url, "Normalized URL");

            for handler in self.registry.handlers() {
                for handle in requested {
                    if !handler.handles().contains(&handle.as_str()) {
                        continue;
                    }

                    report.invocations += 1;
                    info!(url = %url, handler = handler.name(), handle = %handle, "Running handler");

                    let result = match tokio::time::timeout(
                        self.timeout,
                        handler.handle(&url, args, handle),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(HandlerError::Timeout(self.timeout)),
                    };

                    match result {
                        Ok(HandleOutcome::Archived { location }) => {
                            report.archived += 1;
                            info!(url = %url, handler = handler.name(), handle = %handle, location = %location, "Archived");
                        }
                        Ok(HandleOutcome::Skipped { reason }) => {
                            report.skipped += 1;
                            warn!(url = %url, handler = handler.name(), handle = %handle, reason = %reason, "Skipped");
                        }
                        Err(e) => {
                            error!(url = %url, handler = handler.name(), handle = %handle, error = %e, "Handler failed");
                            report.failures.push(Failure {
                                url: url.clone(),
                                handler: Some(handler.name()),
                                handle: Some(handle.clone()),
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        report
    }
}
