//! Command execution: status polling and output lines.

mod common;

use common::{ExecPlan, FakeEngine};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stevedore_core::{Container, Mounts, INITIAL_POLL_DELAY, MAX_POLL_DELAY};
use tempfile::TempDir;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

async fn open(engine: &Arc<FakeEngine>, shared: &TempDir) -> Container {
    let host = engine.host(shared.path());
    host.image("alpine:3")
        .open_container(&host, "runner", &Mounts::new())
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_poll_delay_doubles_up_to_cap() {
    let shared = TempDir::new().unwrap();
    let engine = FakeEngine::new();
    let container = open(&engine, &shared).await;
    engine.plan_exec(ExecPlan::default().running_for(12));

    let start = tokio::time::Instant::now();
    container
        .execute(&["sleep".to_string(), "4".to_string()], None)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    // twelve running answers, then the one carrying the exit code
    assert_eq!(engine.inspections(), 13);

    // 1 + 2 + ... + 512 ms, then three polls held at the cap
    let expected = Duration::from_millis(1023) + MAX_POLL_DELAY * 3;
    assert_eq!(INITIAL_POLL_DELAY, Duration::from_millis(1));
    assert!(elapsed >= expected, "elapsed {elapsed:?}");
    assert!(elapsed < expected + Duration::from_millis(10), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_quick_command_polls_once() {
    let shared = TempDir::new().unwrap();
    let engine = FakeEngine::new();
    let container = open(&engine, &shared).await;
    engine.plan_exec(ExecPlan::default().running_for(0));

    let start = tokio::time::Instant::now();
    container.execute(&["true".to_string()], None).await.unwrap();

    assert_eq!(engine.inspections(), 1);
    assert!(start.elapsed() < Duration::from_millis(5));
}

/// Records `(stream, line)` for every output line event.
#[derive(Clone, Default)]
struct OutputLines(Arc<Mutex<Vec<(String, String)>>>);

#[derive(Default)]
struct LineFields {
    stream: Option<String>,
    message: Option<String>,
}

impl Visit for LineFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "stream" => self.stream = Some(format!("{value:?}")),
            "message" => self.message = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

impl<S: Subscriber> Layer<S> for OutputLines {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = LineFields::default();
        event.record(&mut fields);
        if let Some(stream) = fields.stream {
            self.0
                .lock()
                .unwrap()
                .push((stream, fields.message.unwrap_or_default()));
        }
    }
}

#[tokio::test]
async fn test_output_split_across_chunks_is_logged_as_lines() {
    let lines = OutputLines::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(lines.clone()));

    let shared = TempDir::new().unwrap();
    let engine = FakeEngine::new();
    let container = open(&engine, &shared).await;
    engine.plan_exec(
        ExecPlan::default()
            .stdout("hello wo")
            .stdout("rld\nsecond")
            .stderr("oo")
            .stderr("ps\n")
            .stdout(" line\nno newline")
            .rechunk(5),
    );

    container.execute(&["build".to_string()], None).await.unwrap();

    let pair = |s: &str, l: &str| (s.to_string(), l.to_string());
    assert_eq!(
        *lines.0.lock().unwrap(),
        vec![
            pair("stdout", "hello world"),
            pair("stderr", "oops"),
            pair("stdout", "second line"),
            pair("stdout", "no newline"),
        ]
    );
}

#[tokio::test]
async fn test_failed_command_still_logs_output() {
    let lines = OutputLines::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(lines.clone()));

    let shared = TempDir::new().unwrap();
    let engine = FakeEngine::new();
    let container = open(&engine, &shared).await;
    engine.plan_exec(ExecPlan::exit(2).stderr("no such file\n").rechunk(3));

    let err = container
        .execute(&["cat".to_string(), "missing".to_string()], None)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), Some(2));
    assert_eq!(
        *lines.0.lock().unwrap(),
        vec![("stderr".to_string(), "no such file".to_string())]
    );
}
