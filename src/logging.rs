//! Log setup.
//!
//! Lines look like `[wayback][    INFO] Wayback snapshot created url=...`:
//! the component is the last segment of the event's target.

use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::constants::LOG_FILE_SUFFIX;

/// `[<component>][<LEVEL>] <message> <fields>` event format.
#[derive(Debug, Clone, Copy, Default)]
pub struct BracketFormat;

impl<S, N> FormatEvent<S, N> for BracketFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        write!(
            writer,
            "[{}][{:>8}] ",
            component(meta.target()),
            meta.level().as_str()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Last `::` segment of a tracing target.
#[must_use]
pub fn component(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

/// Log file path for `--log NAME`.
#[must_use]
pub fn log_file_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}{LOG_FILE_SUFFIX}"))
}

/// Default filter: this crate at debug or info, everything else at warn.
#[must_use]
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "warn,asak=debug"
    } else {
        "warn,asak=info"
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr, or only to `NAME.sak.log` (appending) when `log` is
/// set. `RUST_LOG` overrides the level selection.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init(debug: bool, log: Option<&str>) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let (writer, path) = match log {
        Some(name) => {
            let path = log_file_path(name);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), Some(path))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(BracketFormat)
                .with_ansi(false)
                .with_writer(writer),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    Ok(path)
}
