//! Plain file download.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use clap::{value_parser, Arg, Command};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use super::output::{self, PartFile};
use super::traits::{HandleOutcome, Handler, HandlerError};
use crate::cli::Args;
use crate::config::Config;

const HANDLES: &[&str] = &["file"];

/// Extension used when neither the URL nor the content type gives one.
const FALLBACK_EXTENSION: &str = "bin";

/// Downloads the resource behind a URL as-is.
pub struct DownloadHandler {
    client: Client,
    output_dir: PathBuf,
}

impl DownloadHandler {
    /// Create a handler from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, HandlerError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            output_dir: config.output_dir.clone(),
        })
    }
}

#[async_trait]
impl Handler for DownloadHandler {
    fn name(&self) -> &'static str {
        "download"
    }

    fn handles(&self) -> &'static [&'static str] {
        HANDLES
    }

    fn add_arguments(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("download-max-bytes")
                .long("download-max-bytes")
                .value_name("N")
                .value_parser(value_parser!(u64))
                .help("Abort file downloads larger than N bytes"),
        )
    }

    async fn handle(
        &self,
        url: &str,
        args: &Args,
        handle: &str,
    ) -> Result<HandleOutcome, HandlerError> {
        let max_bytes = args.value::<u64>("download-max-bytes");

        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HandlerError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let (Some(max), Some(len)) = (max_bytes, response.content_length()) {
            if len > max {
                return Err(anyhow::anyhow!(
                    "{url} is {len} bytes, larger than --download-max-bytes {max}"
                )
                .into());
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let ext = file_extension(url, content_type.as_deref());

        let path = output::output_path(&self.output_dir, url, args, handle, &ext);
        if let Some(reason) = output::skip_reason(&path, args) {
            return Ok(HandleOutcome::Skipped { reason });
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        // Dropped on any early return or cancellation, taking the partial file with it.
        let part = PartFile::for_output(&path)?;
        let mut file = tokio::fs::File::create(part.path()).await?;

        debug!(url = %url, output = %path.display(), "Downloading file");

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            if max_bytes.is_some_and(|max| written > max) {
                return Err(anyhow::anyhow!(
                    "{url} exceeded --download-max-bytes after {written} bytes"
                )
                .into());
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        part.commit(&path).await?;
        info!(url = %url, output = %path.display(), bytes = written, "File downloaded");

        Ok(HandleOutcome::Archived {
            location: path.display().to_string(),
        })
    }
}

/// Extension from the URL path, else from the content type, else `bin`.
fn file_extension(url: &str, content_type: Option<&str>) -> String {
    let from_path = Url::parse(url).ok().and_then(|u| {
        let last = u.path_segments()?.next_back()?.to_string();
        let (name, ext) = last.rsplit_once('.')?;
        (!name.is_empty() && !ext.is_empty() && ext.len() <= 5 && ext.chars().all(char::is_alphanumeric))
            .then(|| ext.to_lowercase())
    });
    if let Some(ext) = from_path {
        return ext;
    }

    content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(preferred_extension)
        .unwrap_or(FALLBACK_EXTENSION)
        .to_string()
}

/// mime_guess lists extensions alphabetically; prefer the common ones.
fn preferred_extension(exts: &'static [&'static str]) -> Option<&'static str> {
    const PREFERRED: &[&str] = &["html", "jpg", "png", "pdf", "txt", "json", "mp4", "mp3"];
    PREFERRED
        .iter()
        .find(|p| exts.contains(*p))
        .copied()
        .or_else(|| exts.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_path() {
        assert_eq!(file_extension("https://example.com/a/report.PDF", None), "pdf");
        assert_eq!(
            file_extension("https://example.com/a/report.pdf?x=1", Some("text/html")),
            "pdf"
        );
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(
            file_extension("https://example.com/page", Some("text/html; charset=utf-8")),
            "html"
        );
        assert_eq!(file_extension("https://example.com/img", Some("image/jpeg")), "jpg");
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(file_extension("https://example.com/blob", None), "bin");
        assert_eq!(
            file_extension("https://example.com/blob", Some("application/x-unknown-thing")),
            "bin"
        );
    }
}
