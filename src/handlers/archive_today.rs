//! Archive.today submission.

use std::time::Duration;

use async_trait::async_trait;
use clap::{Arg, ArgAction, Command};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use super::traits::{HandleOutcome, Handler, HandlerError};
use crate::cli::Args;
use crate::config::Config;

const HANDLES: &[&str] = &["archivetoday"];

/// Archive.today and its mirrors.
const MIRROR_HOSTS: &[&str] = &[
    "archive.today",
    "archive.ph",
    "archive.is",
    "archive.li",
    "archive.vn",
    "archive.md",
    "archive.fo",
];

/// Paths on the archive hosts that are not snapshots.
const EXCLUDED_PATHS: &[&str] = &["submit", "search", "about", "faq", "timegate", "newest"];

/// Submits URLs to Archive.today.
pub struct ArchiveTodayHandler {
    client: Client,
    base_url: String,
    /// Host (with port, if any) of `base_url`, accepted as a snapshot host.
    base_host: Option<String>,
}

impl ArchiveTodayHandler {
    /// Create a handler from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, HandlerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        let base_url = config.archive_today_base_url.trim_end_matches('/').to_string();
        let base_host = Url::parse(&base_url).ok().and_then(|u| host_with_port(&u));

        Ok(Self {
            client,
            base_url,
            base_host,
        })
    }

    /// Submit a URL and return the archive URL.
    ///
    /// An existing archive is returned as-is unless `force` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails.
    pub async fn submit(&self, url: &str, force: bool) -> Result<String, HandlerError> {
        if !force {
            if let Some(existing) = self.check_existing(url).await? {
                info!(url = %url, archive = %existing, "URL already archived on Archive.today");
                return Ok(existing);
            }
        }

        debug!(url = %url, "Submitting URL to Archive.today");

        let submit_url = format!("{}/submit/", self.base_url);
        let response = self
            .client
            .post(&submit_url)
            .form(&[("url", url)])
            .send()
            .await?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            if status.as_u16() == 429 {
                warn!(url = %url, "Archive.today rate limited");
            } else {
                warn!(url = %url, status = %status, "Archive.today submission failed");
            }
            return Err(HandlerError::Status {
                url: submit_url,
                status: status.as_u16(),
            });
        }

        // Archive.today typically redirects to the archived page.
        if self.is_archive_url(&final_url) {
            info!(url = %url, archive = %final_url, "Archive.today snapshot created");
            return Ok(final_url);
        }

        let body = response.text().await?;
        if let Some(archive_url) = self.extract_archive_url(&body) {
            info!(url = %url, archive = %archive_url, "Archive.today snapshot created");
            return Ok(archive_url);
        }

        // Accepted but still queued; the newest-snapshot URL resolves once it is done.
        let pending_url = format!("{}/newest/{url}", self.base_url);
        info!(url = %url, "Archive.today submission accepted");
        Ok(pending_url)
    }

    /// Check if a URL has been archived on Archive.today.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup request fails.
    pub async fn check_existing(&self, url: &str) -> Result<Option<String>, HandlerError> {
        let check_url = format!("{}/newest/{url}", self.base_url);

        let response = self.client.get(&check_url).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let final_url = response.url().to_string();
        if self.is_archive_url(&final_url) {
            return Ok(Some(final_url));
        }

        let body = response.text().await?;
        Ok(self.extract_archive_url(&body))
    }

    /// Whether `url` is a snapshot page: a known archive host followed by a
    /// short alphanumeric id.
    fn is_archive_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = host_with_port(&parsed) else {
            return false;
        };

        let known = MIRROR_HOSTS.contains(&host.as_str()) || self.base_host.as_ref() == Some(&host);
        if !known {
            return false;
        }

        let first = parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .unwrap_or("");
        let excluded = EXCLUDED_PATHS.iter().any(|p| first.eq_ignore_ascii_case(p));

        !excluded
            && (4..=10).contains(&first.len())
            && first.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// Extract an archive URL from an HTML response body.
    fn extract_archive_url(&self, body: &str) -> Option<String> {
        for marker in ["rel=\"canonical\" href=\"", "property=\"og:url\" content=\""] {
            if let Some(start) = body.find(marker) {
                let after = &body[start + marker.len()..];
                if let Some(end) = after.find('"') {
                    let candidate = &after[..end];
                    if self.is_archive_url(candidate) {
                        return Some(candidate.to_string());
                    }
                }
            }
        }

        // Any absolute link into an archive host.
        let mut rest = body;
        while let Some(start) = rest.find("https://").or_else(|| rest.find("http://")) {
            let after = &rest[start..];
            let end = after
                .find(|c: char| c == '"' || c == '\'' || c == '<' || c == '>' || c.is_whitespace())
                .unwrap_or(after.len());
            let candidate = &after[..end];
            if self.is_archive_url(candidate) {
                return Some(candidate.to_string());
            }
            rest = &after[end.max(1)..];
        }

        None
    }
}

fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

#[async_trait]
impl Handler for ArchiveTodayHandler {
    fn name(&self) -> &'static str {
        "archive_today"
    }

    fn handles(&self) -> &'static [&'static str] {
        HANDLES
    }

    fn add_arguments(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("archivetoday-force")
                .long("archivetoday-force")
                .action(ArgAction::SetTrue)
                .help("Submit to Archive.today even if an archive already exists"),
        )
    }

    async fn handle(
        &self,
        url: &str,
        args: &Args,
        _handle: &str,
    ) -> Result<HandleOutcome, HandlerError> {
        let location = self.submit(url, args.flag("archivetoday-force")).await?;
        Ok(HandleOutcome::Archived { location })
    }
}
