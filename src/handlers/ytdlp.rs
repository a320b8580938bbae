//! Video and audio downloads through yt-dlp.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Arg, Command as ClapCommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::monolith::clip_output;
use super::output;
use super::traits::{HandleOutcome, Handler, HandlerError};
use crate::cli::Args;
use crate::config::Config;

const HANDLES: &[&str] = &["video", "audio"];

/// Default format selection, capped at 1080p.
const DEFAULT_FORMAT: &str = "bestvideo[height<=1080]+bestaudio/best[height<=1080]/best";

/// Download progress information parsed from yt-dlp output.
#[derive(Debug, Clone, PartialEq)]
struct DownloadProgress {
    /// Progress percentage (0.0-100.0)
    percent: f64,
    /// Download speed (e.g., "2.34MiB/s")
    speed: Option<String>,
    /// Estimated time remaining (e.g., "00:15")
    eta: Option<String>,
    /// Total size (e.g., "~45.50MiB")
    total_size: Option<String>,
}

/// What a line of yt-dlp output tells us.
#[derive(Debug, Clone, PartialEq)]
enum OutputLine {
    Progress(DownloadProgress),
    Destination(String),
    AlreadyDownloaded(String),
    Other,
}

/// Downloads media with yt-dlp. `video` keeps the best video+audio, `audio`
/// extracts an mp3.
pub struct YtDlpHandler {
    path: String,
    output_dir: PathBuf,
}

impl YtDlpHandler {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.yt_dlp_path.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    fn build_command(&self, url: &str, args: &Args, handle: &str) -> Command {
        let template = output::output_path(&self.output_dir, url, args, handle, "%(ext)s");

        let mut cmd = Command::new(&self.path);
        cmd.arg("--no-playlist")
            .arg("--newline")
            .arg("--no-colors")
            .arg("-o")
            .arg(&template);

        if args.overwrite {
            cmd.arg("--force-overwrites");
        } else {
            cmd.arg("--no-overwrites");
        }

        if handle == "audio" {
            cmd.arg("-x").arg("--audio-format").arg("mp3");
        } else {
            let format = args
                .value::<String>("ytdlp-format")
                .unwrap_or_else(|| DEFAULT_FORMAT.to_string());
            cmd.arg("-f").arg(format);
        }

        cmd.arg("--").arg(url);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Handler for YtDlpHandler {
    fn name(&self) -> &'static str {
        "ytdlp"
    }

    fn handles(&self) -> &'static [&'static str] {
        HANDLES
    }

    fn add_arguments(&self, cmd: ClapCommand) -> ClapCommand {
        cmd.arg(
            Arg::new("ytdlp-format")
                .long("ytdlp-format")
                .value_name("FORMAT")
                .help("yt-dlp format selector for the video handle"),
        )
    }

    async fn handle(
        &self,
        url: &str,
        args: &Args,
        handle: &str,
    ) -> Result<HandleOutcome, HandlerError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        debug!(url = %url, handle = %handle, "Starting yt-dlp");
        let mut child = self
            .build_command(url, args, handle)
            .spawn()
            .with_context(|| format!("Failed to execute yt-dlp at '{}'", self.path))?;

        let stdout = child
            .stdout
            .take()
            .context("yt-dlp stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .context("yt-dlp stderr was not captured")?;

        // Drain stderr concurrently so a chatty tool cannot block on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push_str(&line);
                collected.push('\n');
            }
            collected
        });

        let mut destination: Option<String> = None;
        let mut already: Option<String> = None;
        let mut last_logged = 0_u32;

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_output_line(&line) {
                OutputLine::Progress(progress) => {
                    // Log roughly every quarter.
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let quarter = (progress.percent / 25.0) as u32;
                    if quarter > last_logged {
                        last_logged = quarter;
                        debug!(
                            url = %url,
                            percent = progress.percent,
                            total_size = ?progress.total_size,
                            speed = ?progress.speed,
                            eta = ?progress.eta,
                            "yt-dlp progress"
                        );
                    }
                }
                OutputLine::Destination(path) => destination = Some(path),
                OutputLine::AlreadyDownloaded(path) => already = Some(path),
                OutputLine::Other => {}
            }
        }

        let status = child.wait().await?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(HandlerError::Tool {
                tool: "yt-dlp",
                message: format!(
                    "exit code {:?}: {}",
                    status.code(),
                    clip_output(&stderr_text)
                ),
            });
        }

        if let Some(path) = already {
            if destination.is_none() {
                return Ok(HandleOutcome::Skipped {
                    reason: format!("{path} has already been downloaded (use --overwrite to replace it)"),
                });
            }
        }

        let location = destination.unwrap_or_else(|| self.output_dir.display().to_string());
        info!(url = %url, handle = %handle, location = %location, "yt-dlp download finished");
        Ok(HandleOutcome::Archived { location })
    }
}

/// Classify one line of yt-dlp stdout.
///
/// Example lines:
/// - `[download]   15.2% of ~45.50MiB at 2.34MiB/s ETA 00:15`
/// - `[download] Destination: filename.mp4`
/// - `[Merger] Merging formats into "filename.mkv"`
/// - `[ExtractAudio] Destination: filename.mp3`
/// - `[download] filename.mp4 has already been downloaded`
fn parse_output_line(line: &str) -> OutputLine {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into ") {
        return OutputLine::Destination(rest.trim_matches('"').to_string());
    }

    if let Some(idx) = line.find("Destination: ") {
        if line.starts_with("[download]") || line.starts_with("[ExtractAudio]") {
            return OutputLine::Destination(line[idx + "Destination: ".len()..].to_string());
        }
    }

    if let Some(rest) = line.strip_prefix("[download] ") {
        if let Some(path) = rest.strip_suffix(" has already been downloaded") {
            return OutputLine::AlreadyDownloaded(path.to_string());
        }
        if let Some(progress) = parse_progress(rest) {
            return OutputLine::Progress(progress);
        }
    }

    OutputLine::Other
}

fn parse_progress(rest: &str) -> Option<DownloadProgress> {
    let pct_pos = rest.find('%')?;
    let percent = rest[..pct_pos]
        .split_whitespace()
        .last()?
        .parse::<f64>()
        .ok()?;

    let word_after = |marker: &str| {
        rest.find(marker).and_then(|pos| {
            rest[pos + marker.len()..]
                .split_whitespace()
                .next()
                .map(ToString::to_string)
        })
    };

    Some(DownloadProgress {
        percent,
        speed: word_after(" at "),
        eta: word_after("ETA "),
        total_size: word_after(" of "),
    })
}
