//! Integration tests for the dispatch loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use asak::cli::Args;
use asak::dispatch::Dispatcher;
use asak::handlers::{
    HandleOutcome, Handler, HandlerError, HandlerRegistry, NormalizeOptions,
};
use asak::selection::RequestSet;

type Calls = Arc<Mutex<Vec<(String, String, String)>>>;

/// Records every invocation; fails or stalls on request.
struct Recorder {
    name: &'static str,
    handles: &'static [&'static str],
    calls: Calls,
    fail_on: Option<&'static str>,
    stall: bool,
}

impl Recorder {
    fn new(name: &'static str, handles: &'static [&'static str], calls: &Calls) -> Self {
        Self {
            name,
            handles,
            calls: calls.clone(),
            fail_on: None,
            stall: false,
        }
    }
}

#[async_trait]
impl Handler for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn handles(&self) -> &'static [&'static str] {
        self.handles
    }

    async fn handle(
        &self,
        url: &str,
        _args: &Args,
        handle: &str,
    ) -> Result<HandleOutcome, HandlerError> {
        self.calls
            .lock()
            .unwrap()
            .push((self.name.to_string(), url.to_string(), handle.to_string()));

        if self.stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_on.is_some_and(|needle| url.contains(needle)) {
            return Err(HandlerError::Tool {
                tool: "recorder",
                message: "boom".to_string(),
            });
        }
        Ok(HandleOutcome::Archived {
            location: format!("{url}#{handle}"),
        })
    }
}

fn requested(items: &[&str]) -> RequestSet {
    items.iter().map(ToString::to_string).collect()
}

fn urls(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn dispatcher(registry: &HandlerRegistry) -> Dispatcher<'_> {
    Dispatcher::new(registry, Duration::from_secs(5), NormalizeOptions::default())
}

fn count(calls: &Calls, name: &str, handle: &str) -> usize {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter(|(n, _, h)| n == name && h == handle)
        .count()
}

#[tokio::test]
async fn test_multi_capability_handler_invoked_per_handle() {
    let calls = Calls::default();
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(Recorder::new("a", &["x"], &calls))).unwrap();
    registry.register(Arc::new(Recorder::new("b", &["x", "y"], &calls))).unwrap();

    let report = dispatcher(&registry)
        .run(
            &urls(&["https://one.example/", "https://two.example/"]),
            &Args::default(),
            &requested(&["x", "y"]),
        )
        .await;

    // Per URL: A once (x), B twice (x and y).
    assert_eq!(report.invocations, 6);
    assert_eq!(report.archived, 6);
    assert!(report.is_success());
    assert_eq!(count(&calls, "a", "x"), 2);
    assert_eq!(count(&calls, "b", "x"), 2);
    assert_eq!(count(&calls, "b", "y"), 2);
    assert_eq!(count(&calls, "a", "y"), 0);
}

#[tokio::test]
async fn test_urls_processed_in_order_and_normalized() {
    let calls = Calls::default();
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(Recorder::new("a", &["x"], &calls))).unwrap();

    dispatcher(&registry)
        .run(
            &urls(&["HTTPS://Second.Example:443", "first.example/page"]),
            &Args::default(),
            &requested(&["x"]),
        )
        .await;

    let seen: Vec<String> = calls.lock().unwrap().iter().map(|c| c.1.clone()).collect();
    assert_eq!(
        seen,
        vec!["https://second.example/", "https://first.example/page"]
    );
}

#[tokio::test]
async fn test_no_matching_handlers_does_nothing() {
    let calls = Calls::default();
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(Recorder::new("a", &["x"], &calls))).unwrap();

    let report = dispatcher(&registry)
        .run(
            &urls(&["https://one.example/"]),
            &Args::default(),
            &requested(&["z"]),
        )
        .await;

    assert_eq!(report.invocations, 0);
    assert!(report.is_success());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_request_set_does_nothing() {
    let calls = Calls::default();
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(Recorder::new("a", &["x"], &calls))).unwrap();

    let report = dispatcher(&registry)
        .run(&urls(&["https://one.example/"]), &Args::default(), &RequestSet::new())
        .await;

    assert_eq!(report, Default::default());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failure_is_isolated() {
    let calls = Calls::default();
    let mut failing = Recorder::new("failing", &["x"], &calls);
    failing.fail_on = Some("one.example");

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(failing)).unwrap();
    registry.register(Arc::new(Recorder::new("after", &["x"], &calls))).unwrap();

    let report = dispatcher(&registry)
        .run(
            &urls(&["https://one.example/", "https://two.example/"]),
            &Args::default(),
            &requested(&["x"]),
        )
        .await;

    // The sibling handler and the next URL still ran.
    assert_eq!(report.invocations, 4);
    assert_eq!(report.archived, 3);
    assert_eq!(report.failed_invocations(), 1);
    assert!(!report.is_success());
    assert_eq!(count(&calls, "after", "x"), 2);
    assert_eq!(count(&calls, "failing", "x"), 2);

    let failure = &report.failures[0];
    assert_eq!(failure.url, "https://one.example/");
    assert_eq!(failure.handler, Some("failing"));
    assert_eq!(failure.handle.as_deref(), Some("x"));
}

#[tokio::test]
async fn test_malformed_url_skipped() {
    let calls = Calls::default();
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(Recorder::new("a", &["x"], &calls))).unwrap();

    let report = dispatcher(&registry)
        .run(
            &urls(&["https://bad host.example/", "https://good.example/"]),
            &Args::default(),
            &requested(&["x"]),
        )
        .await;

    assert_eq!(report.malformed_urls(), 1);
    assert_eq!(report.invocations, 1);
    assert!(!report.is_success());
    assert_eq!(calls.lock().unwrap()[0].1, "https://good.example/");
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let calls = Calls::default();
    let mut slow = Recorder::new("slow", &["x"], &calls);
    slow.stall = true;

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(slow)).unwrap();
    registry.register(Arc::new(Recorder::new("fast", &["x"], &calls))).unwrap();

    let report = Dispatcher::new(&registry, Duration::from_millis(50), NormalizeOptions::default())
        .run(&urls(&["https://one.example/"]), &Args::default(), &requested(&["x"]))
        .await;

    assert_eq!(report.failed_invocations(), 1);
    assert_eq!(report.archived, 1);
    assert!(report.failures[0].message.contains("timed out"));
}
