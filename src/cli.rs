//! Command line grammar.
//!
//! The grammar is assembled at startup: a fixed set of global flags, then
//! whatever flags each registered handler contributes. `--use` only accepts
//! handle names that some registered handler declares.

use std::collections::HashSet;
use std::ffi::OsString;

use clap::builder::PossibleValuesParser;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use thiserror::Error;

use crate::constants::{AUTO_MACRO, DEFAULT_FILENAME_CLIP, DEFAULT_HASH_CLIP};
use crate::handlers::HandlerRegistry;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Usage(#[from] clap::Error),
    #[error("handler '{handler}' flag '{flag}' collides with an existing flag")]
    FlagCollision { handler: &'static str, flag: String },
    #[error("handler '{handler}' tried to add positional argument '{arg}'")]
    PositionalFlag { handler: &'static str, arg: String },
    #[error("no URL given; expected [MACRO]... <URL>...")]
    NoUrls,
}

/// Parsed invocation. Immutable after parsing.
#[derive(Debug, Clone)]
pub struct Args {
    /// Macro names to expand. `["auto"]` when none were given.
    pub macros: Vec<String>,
    /// URLs to archive, as typed.
    pub urls: Vec<String>,
    /// Handles selected with `--use`.
    pub use_handles: Vec<String>,
    pub debug: bool,
    pub url_hash: bool,
    pub filename: Option<String>,
    pub overwrite: bool,
    pub log: Option<String>,
    pub filename_clip: usize,
    pub hash_clip: usize,
    /// Raw matches, for handler-specific flags.
    pub matches: ArgMatches,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            macros: vec![AUTO_MACRO.to_string()],
            urls: Vec::new(),
            use_handles: Vec::new(),
            debug: false,
            url_hash: false,
            filename: None,
            overwrite: false,
            log: None,
            filename_clip: DEFAULT_FILENAME_CLIP,
            hash_clip: DEFAULT_HASH_CLIP,
            matches: ArgMatches::default(),
        }
    }
}

impl Args {
    /// Value of a boolean handler flag. `false` when the flag is not defined.
    #[must_use]
    pub fn flag(&self, id: &str) -> bool {
        matches!(self.matches.try_get_one::<bool>(id), Ok(Some(true)))
    }

    /// Value of a handler option. `None` when unset or not defined.
    #[must_use]
    pub fn value<T>(&self, id: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.matches.try_get_one::<T>(id).ok().flatten().cloned()
    }
}

/// Build the full command: global flags plus every handler's flags.
///
/// # Errors
///
/// Returns an error if a handler flag collides with a global flag or with
/// another handler's flag, or if a handler adds a positional argument.
pub fn build_command(registry: &HandlerRegistry) -> Result<Command, CliError> {
    let mut cmd = global_command(registry.handles());
    check_collisions(&cmd, "asak")?;

    for handler in registry.handlers() {
        cmd = handler.add_arguments(cmd);
        check_collisions(&cmd, handler.name())?;
    }

    Ok(cmd)
}

/// Parse `argv` (including the program name) against the registry's grammar.
///
/// # Errors
///
/// Returns [`CliError::Usage`] for anything clap rejects (including unknown
/// `--use` values and `--help`), [`CliError::NoUrls`] when no target looks
/// like a URL, and the errors of [`build_command`].
pub fn parse_from<I, T>(registry: &HandlerRegistry, argv: I) -> Result<Args, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command(registry)?.try_get_matches_from(argv)?;

    let targets: Vec<String> = matches
        .get_many::<String>("targets")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();
    let (macros, urls) = split_targets(targets)?;

    Ok(Args {
        macros,
        urls,
        use_handles: matches
            .get_many::<String>("use")
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default(),
        debug: matches.get_flag("debug"),
        url_hash: matches.get_flag("url-hash"),
        filename: matches.get_one::<String>("filename").cloned(),
        overwrite: matches.get_flag("overwrite"),
        log: matches.get_one::<String>("log").cloned(),
        filename_clip: matches
            .get_one::<usize>("filename-clip")
            .copied()
            .unwrap_or(DEFAULT_FILENAME_CLIP),
        hash_clip: matches
            .get_one::<usize>("hash-clip")
            .copied()
            .unwrap_or(DEFAULT_HASH_CLIP),
        matches,
    })
}

fn global_command(handles: Vec<&'static str>) -> Command {
    Command::new("asak")
        .about("Archives digital content.")
        .version(clap::crate_version!())
        .arg(
            Arg::new("targets")
                .value_name("MACRO|URL")
                .num_args(1..)
                .required(true)
                .help("Macros to expand (default: auto), followed by one or more URLs to archive"),
        )
        .arg(
            Arg::new("use")
                .long("use")
                .value_name("HANDLE")
                .action(ArgAction::Append)
                .value_parser(PossibleValuesParser::new(handles))
                .help("Handle to run in addition to the macros (repeatable)"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .arg(
            Arg::new("url-hash")
                .long("url-hash")
                .action(ArgAction::SetTrue)
                .help("Add a URL hash to filenames"),
        )
        .arg(
            Arg::new("filename")
                .long("filename")
                .value_name("NAME")
                .help("Filename to archive to; {host}, {date} and {handle} are expanded"),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .action(ArgAction::SetTrue)
                .help("Overwrite existing output files instead of skipping them"),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .value_name("NAME")
                .help("Write the log to NAME.sak.log instead of stderr"),
        )
        .arg(
            Arg::new("filename-clip")
                .long("filename-clip")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("100")
                .help("Limit on the length of the filename"),
        )
        .arg(
            Arg::new("hash-clip")
                .long("hash-clip")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("8")
                .help("Limit on the length of the hash in the filename"),
        )
}

/// Reject duplicate ids, long names or short names anywhere in `cmd`.
///
/// Called after each handler extends the command, so the first handler that
/// introduces a duplicate is the one reported.
fn check_collisions(cmd: &Command, handler: &'static str) -> Result<(), CliError> {
    let mut ids = HashSet::new();
    let mut longs: HashSet<&str> = HashSet::from(["help", "version"]);
    let mut shorts: HashSet<char> = HashSet::from(['h', 'V']);

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_str();
        if arg.is_positional() && id != "targets" {
            return Err(CliError::PositionalFlag {
                handler,
                arg: id.to_string(),
            });
        }
        if !ids.insert(id) {
            return Err(CliError::FlagCollision {
                handler,
                flag: id.to_string(),
            });
        }
        if let Some(long) = arg.get_long() {
            if !longs.insert(long) {
                return Err(CliError::FlagCollision {
                    handler,
                    flag: format!("--{long}"),
                });
            }
        }
        if let Some(short) = arg.get_short() {
            if !shorts.insert(short) {
                return Err(CliError::FlagCollision {
                    handler,
                    flag: format!("-{short}"),
                });
            }
        }
    }

    Ok(())
}

/// Split positional targets into macro names and URLs.
///
/// Leading tokens that do not look like URLs are macro names; everything from
/// the first URL-looking token on is a URL.
fn split_targets(targets: Vec<String>) -> Result<(Vec<String>, Vec<String>), CliError> {
    let Some(first_url) = targets.iter().position(|t| looks_like_url(t)) else {
        return Err(CliError::NoUrls);
    };

    let mut macros = targets;
    let urls = macros.split_off(first_url);
    if macros.is_empty() {
        macros.push(AUTO_MACRO.to_string());
    }
    Ok((macros, urls))
}

/// Whether a positional token is read as a URL rather than a macro name.
pub(crate) fn looks_like_url(token: &str) -> bool {
    token.contains("://") || token.contains('.') || token.contains('/')
}
