//! Wayback Machine submission.

use std::time::Duration;

use async_trait::async_trait;
use clap::{Arg, ArgAction, Command};
use reqwest::{redirect, Client};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::traits::{HandleOutcome, Handler, HandlerError};
use crate::cli::Args;
use crate::config::Config;

const HANDLES: &[&str] = &["wayback"];

/// Availability API response, trimmed to what we read.
#[derive(Debug, Deserialize)]
struct Availability {
    #[serde(default)]
    archived_snapshots: Snapshots,
}

#[derive(Debug, Default, Deserialize)]
struct Snapshots {
    closest: Option<Closest>,
}

#[derive(Debug, Deserialize)]
struct Closest {
    url: String,
    #[serde(default = "default_available")]
    available: bool,
}

const fn default_available() -> bool {
    true
}

/// Submits URLs to the Wayback Machine's save endpoint.
pub struct WaybackHandler {
    client: Client,
    base_url: String,
    availability_url: String,
}

impl WaybackHandler {
    /// Create a handler from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, HandlerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(config.user_agent.as_str())
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url: config.wayback_base_url.trim_end_matches('/').to_string(),
            availability_url: config.wayback_availability_url.clone(),
        })
    }

    /// Submit a URL to the Wayback Machine and return the snapshot URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service refuses it.
    pub async fn submit(&self, url: &str) -> Result<String, HandlerError> {
        debug!(url = %url, "Submitting URL to Wayback Machine");

        let save_url = format!("{}/save/{url}", self.base_url);
        let response = self.client.get(&save_url).send().await?;
        let status = response.status();

        if status.is_success() || status.is_redirection() {
            // Content-Location on success, Location on redirect; both point at the snapshot.
            for header in ["content-location", "location"] {
                if let Some(loc) = response.headers().get(header).and_then(|v| v.to_str().ok()) {
                    let snapshot_url = self.absolute(loc);
                    info!(url = %url, snapshot = %snapshot_url, "Wayback snapshot created");
                    return Ok(snapshot_url);
                }
            }

            if let Some(memento) = response
                .headers()
                .get("link")
                .and_then(|v| v.to_str().ok())
                .and_then(extract_memento_url)
            {
                info!(url = %url, snapshot = %memento, "Wayback snapshot created");
                return Ok(memento);
            }

            let generic_url = format!("{}/web/*/{url}", self.base_url);
            info!(url = %url, "Wayback submission accepted (no specific snapshot URL)");
            return Ok(generic_url);
        }

        match status.as_u16() {
            429 => warn!(url = %url, "Wayback Machine rate limited"),
            520 | 523 => {
                warn!(url = %url, status = %status, "Target site may be blocking Wayback archival");
            }
            _ => warn!(url = %url, status = %status, "Wayback Machine submission failed"),
        }
        Err(HandlerError::Status {
            url: save_url,
            status: status.as_u16(),
        })
    }

    /// Most recent existing snapshot of `url`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the availability API cannot be reached or answers
    /// with something unparsable.
    pub async fn check_existing(&self, url: &str) -> Result<Option<String>, HandlerError> {
        let check_url = format!("{}?url={}", self.availability_url, urlencoding::encode(url));

        let response = self.client.get(&check_url).send().await?;
        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "Wayback availability check failed");
            return Ok(None);
        }

        let availability: Availability = response.json().await?;
        Ok(availability
            .archived_snapshots
            .closest
            .filter(|c| c.available)
            .map(|c| c.url))
    }

    fn absolute(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            format!("{}{location}", self.base_url)
        }
    }
}

#[async_trait]
impl Handler for WaybackHandler {
    fn name(&self) -> &'static str {
        "wayback"
    }

    fn handles(&self) -> &'static [&'static str] {
        HANDLES
    }

    fn add_arguments(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("wayback-reuse")
                .long("wayback-reuse")
                .action(ArgAction::SetTrue)
                .help("Reuse an existing Wayback snapshot instead of requesting a new one"),
        )
    }

    async fn handle(
        &self,
        url: &str,
        args: &Args,
        _handle: &str,
    ) -> Result<HandleOutcome, HandlerError> {
        if args.flag("wayback-reuse") {
            if let Some(existing) = self.check_existing(url).await? {
                info!(url = %url, snapshot = %existing, "Reusing existing Wayback snapshot");
                return Ok(HandleOutcome::Archived { location: existing });
            }
        }

        let location = self.submit(url).await?;
        Ok(HandleOutcome::Archived { location })
    }
}

/// Extract memento URL from Link header.
fn extract_memento_url(link_header: &str) -> Option<String> {
    // Link headers look like: <url>; rel="memento"; ...
    for part in link_header.split(',') {
        if part.contains("rel=\"memento\"") || part.contains("rel=memento") {
            if let (Some(start), Some(end)) = (part.find('<'), part.find('>')) {
                if start < end {
                    return Some(part[start + 1..end].to_string());
                }
            }
        }
    }
    None
}
