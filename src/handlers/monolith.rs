//! Monolith wrapper for creating self-contained HTML archives.
//!
//! Monolith is a CLI tool that bundles a web page with all its resources
//! (CSS, images, fonts, JavaScript) into a single HTML file using data URIs,
//! so the archived page renders offline.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Arg, ArgAction, Command as ClapCommand};
use tokio::process::Command;
use tracing::{debug, warn};

use super::output::{self, PartFile};
use super::traits::{HandleOutcome, Handler, HandlerError};
use crate::cli::Args;
use crate::config::Config;

const HANDLES: &[&str] = &["monolith"];

/// Archive hosts excluded from asset fetching to avoid archiving archives.
const BLOCKED_DOMAINS: &[&str] = &[
    "web.archive.org",
    "archive.org",
    "archive.today",
    "archive.is",
    "archive.ph",
    "archive.fo",
    "archive.li",
    "archive.md",
    "archive.vn",
];

/// Max characters of tool output kept in error messages.
const MAX_OUTPUT_LEN: usize = 2000;

/// Saves a page as a single self-contained HTML file.
pub struct MonolithHandler {
    path: String,
    output_dir: PathBuf,
    user_agent: String,
}

impl MonolithHandler {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.monolith_path.clone(),
            output_dir: config.output_dir.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    fn build_command(&self, input: &str, output_path: &Path, include_js: bool) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.arg(input);
        cmd.arg("-o").arg(output_path);

        // Isolate mode - prevents external requests when viewing the saved file
        cmd.arg("-I");

        // monolith v3+ includes JavaScript by default; `-j` excludes it.
        if !include_js {
            cmd.arg("-j");
        }

        for domain in BLOCKED_DOMAINS {
            cmd.arg("-B").arg(domain);
        }

        // Network timeout in seconds
        cmd.arg("-t").arg("30");
        cmd.arg("-u").arg(&self.user_agent);

        // Some monolith errors are printed to stdout.
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Handler for MonolithHandler {
    fn name(&self) -> &'static str {
        "monolith"
    }

    fn handles(&self) -> &'static [&'static str] {
        HANDLES
    }

    fn add_arguments(&self, cmd: ClapCommand) -> ClapCommand {
        cmd.arg(
            Arg::new("monolith-js")
                .long("monolith-js")
                .action(ArgAction::SetTrue)
                .help("Keep JavaScript in monolith HTML archives"),
        )
    }

    async fn handle(
        &self,
        url: &str,
        args: &Args,
        handle: &str,
    ) -> Result<HandleOutcome, HandlerError> {
        let output_path = output::output_path(&self.output_dir, url, args, handle, "html");
        if let Some(reason) = output::skip_reason(&output_path, args) {
            return Ok(HandleOutcome::Skipped { reason });
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let part = PartFile::for_output(&output_path)?;

        debug!(url = %url, output = %output_path.display(), "Creating self-contained HTML with monolith");

        let output = self
            .build_command(url, part.path(), args.flag("monolith-js"))
            .output()
            .await
            .with_context(|| format!("Failed to execute monolith at '{}'", self.path))?;

        if !output.status.success() {
            let stdout = clip_output(&String::from_utf8_lossy(&output.stdout));
            let stderr = clip_output(&String::from_utf8_lossy(&output.stderr));

            // monolith can fail on some resources and still write a usable page.
            if !part.exists() {
                return Err(HandlerError::Tool {
                    tool: "monolith",
                    message: format!(
                        "exit code {:?}\nStderr:\n{stderr}\nStdout:\n{stdout}",
                        output.status.code()
                    ),
                });
            }
            warn!(
                url = %url,
                exit_code = ?output.status.code(),
                stderr = %stderr,
                "Monolith completed with warnings but produced output file"
            );
        }

        if !part.exists() {
            return Err(HandlerError::Tool {
                tool: "monolith",
                message: "did not create output file".to_string(),
            });
        }

        part.commit(&output_path).await?;
        let size = tokio::fs::metadata(&output_path).await?.len();
        debug!(url = %url, output = %output_path.display(), size, "Self-contained HTML created");

        Ok(HandleOutcome::Archived {
            location: output_path.display().to_string(),
        })
    }
}

/// Trim tool output for error messages.
pub(crate) fn clip_output(text: &str) -> String {
    let text = text.trim();
    if text.len() <= MAX_OUTPUT_LEN {
        return text.to_string();
    }
    let mut cut = MAX_OUTPUT_LEN;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}...[truncated {} more bytes]",
        &text[..cut],
        text.len() - cut
    )
}
