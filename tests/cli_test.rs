//! Integration tests for the command line grammar.

use std::sync::Arc;

use async_trait::async_trait;
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, Command};

use asak::cli::{self, Args, CliError};
use asak::config::Config;
use asak::handlers::{default_registry, HandleOutcome, Handler, HandlerError, HandlerRegistry};

/// Handler that contributes a single flag.
struct Flagged {
    name: &'static str,
    flag: &'static str,
    positional: bool,
}

#[async_trait]
impl Handler for Flagged {
    fn name(&self) -> &'static str {
        self.name
    }

    fn handles(&self) -> &'static [&'static str] {
        &["x"]
    }

    fn add_arguments(&self, cmd: Command) -> Command {
        if self.positional {
            cmd.arg(Arg::new(self.flag))
        } else {
            cmd.arg(Arg::new(self.flag).long(self.flag).action(ArgAction::SetTrue))
        }
    }

    async fn handle(
        &self,
        _url: &str,
        _args: &Args,
        _handle: &str,
    ) -> Result<HandleOutcome, HandlerError> {
        Ok(HandleOutcome::Skipped {
            reason: "test".to_string(),
        })
    }
}

fn registry() -> HandlerRegistry {
    default_registry(&Config::for_testing()).unwrap()
}

fn parse(argv: &[&str]) -> Result<Args, CliError> {
    let mut full = vec!["asak"];
    full.extend_from_slice(argv);
    cli::parse_from(&registry(), full)
}

#[test]
fn test_defaults() {
    let args = parse(&["https://example.com/"]).unwrap();
    assert_eq!(args.macros, vec!["auto"]);
    assert_eq!(args.urls, vec!["https://example.com/"]);
    assert!(args.use_handles.is_empty());
    assert!(!args.debug && !args.url_hash && !args.overwrite);
    assert_eq!(args.filename, None);
    assert_eq!(args.log, None);
    assert_eq!(args.filename_clip, 100);
    assert_eq!(args.hash_clip, 8);
}

#[test]
fn test_global_flags() {
    let args = parse(&[
        "quick",
        "--use",
        "wayback",
        "--use=file",
        "--debug",
        "--url-hash",
        "--overwrite",
        "--filename",
        "{host}",
        "--log",
        "run",
        "--filename-clip",
        "40",
        "--hash-clip",
        "12",
        "https://a.example/",
        "b.example",
    ])
    .unwrap();

    assert_eq!(args.macros, vec!["quick"]);
    assert_eq!(args.urls, vec!["https://a.example/", "b.example"]);
    assert_eq!(args.use_handles, vec!["wayback", "file"]);
    assert!(args.debug && args.url_hash && args.overwrite);
    assert_eq!(args.filename.as_deref(), Some("{host}"));
    assert_eq!(args.log.as_deref(), Some("run"));
    assert_eq!(args.filename_clip, 40);
    assert_eq!(args.hash_clip, 12);
}

#[test]
fn test_unknown_use_value_rejected() {
    let err = parse(&["--use", "telepathy", "https://example.com/"]).unwrap_err();
    let CliError::Usage(e) = &err else {
        panic!("expected usage error, got {err:?}");
    };
    assert_eq!(e.kind(), ErrorKind::InvalidValue);
}

#[test]
fn test_url_required() {
    assert!(matches!(parse(&["quick"]), Err(CliError::NoUrls)));
    assert!(matches!(parse(&[]), Err(CliError::Usage(_))));
}

#[test]
fn test_non_numeric_clip_rejected() {
    assert!(matches!(
        parse(&["--hash-clip", "many", "https://example.com/"]),
        Err(CliError::Usage(_))
    ));
}

#[test]
fn test_handler_flags_available() {
    let args = parse(&[
        "--wayback-reuse",
        "--monolith-js",
        "--ytdlp-format",
        "best",
        "--download-max-bytes",
        "1024",
        "https://example.com/",
    ])
    .unwrap();
    assert!(args.flag("wayback-reuse"));
    assert!(args.flag("monolith-js"));
    assert!(!args.flag("archivetoday-force"));
    assert_eq!(args.value::<String>("ytdlp-format").as_deref(), Some("best"));
    assert_eq!(args.value::<u64>("download-max-bytes"), Some(1024));
}

#[test]
fn test_handler_flag_colliding_with_global_flag() {
    let mut registry = HandlerRegistry::new();
    registry
        .register(Arc::new(Flagged {
            name: "clash",
            flag: "debug",
            positional: false,
        }))
        .unwrap();

    let err = cli::build_command(&registry).unwrap_err();
    assert!(matches!(err, CliError::FlagCollision { handler: "clash", .. }));
}

#[test]
fn test_handler_flags_colliding_with_each_other() {
    let mut registry = HandlerRegistry::new();
    registry
        .register(Arc::new(Flagged {
            name: "first",
            flag: "shared",
            positional: false,
        }))
        .unwrap();
    registry
        .register(Arc::new(Flagged {
            name: "second",
            flag: "shared",
            positional: false,
        }))
        .unwrap();

    let err = cli::build_command(&registry).unwrap_err();
    assert!(matches!(err, CliError::FlagCollision { handler: "second", .. }));
}

#[test]
fn test_handler_flag_colliding_with_help() {
    let mut registry = HandlerRegistry::new();
    registry
        .register(Arc::new(Flagged {
            name: "helpful",
            flag: "help",
            positional: false,
        }))
        .unwrap();

    assert!(matches!(
        cli::build_command(&registry),
        Err(CliError::FlagCollision { .. })
    ));
}

#[test]
fn test_handler_positional_rejected() {
    let mut registry = HandlerRegistry::new();
    registry
        .register(Arc::new(Flagged {
            name: "greedy",
            flag: "extra",
            positional: true,
        }))
        .unwrap();

    assert!(matches!(
        cli::build_command(&registry),
        Err(CliError::PositionalFlag { handler: "greedy", .. })
    ));
}

#[test]
fn test_default_registry_builds() {
    let cmd = cli::build_command(&registry()).unwrap();
    cmd.debug_assert();
}
