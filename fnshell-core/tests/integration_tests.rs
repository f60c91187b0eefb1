// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests for the shell pipeline.
//!
//! These drive `Shell::run` with an in-memory emulator, in-memory terminal
//! streams, and (for discovery) a real HTTP hub on a loopback port.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
use tokio_util::sync::CancellationToken;

use fnshell_core::error::ShellError;
use fnshell_core::shell::NO_FUNCTIONS_MESSAGE;
use fnshell_core::{
    EmulatorInstance, FunctionsEmulator, Invocation, InvocationError, InvocationTarget,
    LocatorHubClient, ProjectId, RunningEmulator, ServiceKind, SessionOutcome, Shell,
    ShellConfig, ShellOptions, ShutdownError, StartupError, Trigger,
};

struct FakeInstance {
    triggers: Vec<Trigger>,
    emulated: Vec<String>,
}

#[async_trait]
impl EmulatorInstance for FakeInstance {
    fn triggers(&self) -> Vec<Trigger> {
        self.triggers.clone()
    }

    fn emulated_functions(&self) -> Vec<String> {
        self.emulated.clone()
    }

    async fn invoke(
        &self,
        trigger: &Trigger,
        argument: Option<Value>,
    ) -> Result<Invocation, InvocationError> {
        Ok(Invocation::Value(json!({
            "function": trigger.name,
            "data": argument.unwrap_or(Value::Null),
        })))
    }
}

#[derive(Default)]
struct FakeEmulator {
    triggers: Vec<Trigger>,
    emulated: Vec<String>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    started_with: Mutex<Option<ShellConfig>>,
    fail_stop: bool,
}

impl FakeEmulator {
    fn serving(names: &[&str]) -> Self {
        Self {
            triggers: names.iter().map(|name| event_trigger(name)).collect(),
            emulated: names.iter().map(|name| name.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl FunctionsEmulator for FakeEmulator {
    async fn start(&self, config: &ShellConfig) -> Result<(), StartupError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.started_with.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    async fn connect(&self) -> Result<RunningEmulator, StartupError> {
        Ok(Arc::new(FakeInstance {
            triggers: self.triggers.clone(),
            emulated: self.emulated.clone(),
        }))
    }

    async fn stop(&self) -> Result<(), ShutdownError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(ShutdownError::Gateway {
                reason: "listener already closed".to_string(),
            });
        }
        Ok(())
    }
}

/// Terminal whose every write fails, like a closed stdout pipe.
struct BrokenPipe;

impl AsyncWrite for BrokenPipe {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn event_trigger(name: &str) -> Trigger {
    Trigger {
        name: name.to_string(),
        target: InvocationTarget::Event {
            event_type: "providers/cloud.firestore/eventTypes/document.create".to_string(),
            resource: "projects/demo/databases/(default)/documents/items/{id}".to_string(),
        },
        emulated: true,
    }
}

fn options(port: &str) -> ShellOptions {
    ShellOptions {
        port: port.to_string(),
        inspect_functions: None,
        project: Some("demo".to_string()),
    }
}

/// Hub client pointed at an empty directory: no hub is ever found.
fn no_hub() -> (TempDir, LocatorHubClient) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let client = LocatorHubClient::with_locator_dir(dir.path());
    (dir, client)
}

async fn read_until(stream: &mut DuplexStream, transcript: &mut String, needle: &str) {
    let mut buf = [0u8; 1024];
    while !transcript.contains(needle) {
        let n = stream.read(&mut buf).await.expect("read shell output");
        assert!(n > 0, "shell output closed before {:?} appeared", needle);
        transcript.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
}

/// Scenario: no hub, two grouped triggers, interrupt afterwards.
#[tokio::test]
async fn test_grouped_triggers_then_interrupt() {
    let (_dir, hub) = no_hub();
    let emulator = Arc::new(FakeEmulator::serving(&["onCreate-a", "onCreate-b"]));
    let shell = Shell::new(hub, emulator.clone());

    let (mut stdin, shell_in) = tokio::io::duplex(4096);
    let (shell_out, mut stdout) = tokio::io::duplex(64 * 1024);
    let shutdown = CancellationToken::new();

    let session = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut shell_out = shell_out;
            shell
                .run(&options("5001"), BufReader::new(shell_in), &mut shell_out, shutdown)
                .await
        })
    };

    let mut transcript = String::new();
    read_until(&mut stdout, &mut transcript, "firebase > ").await;

    stdin.write_all(b"onCreate.a\n").await.unwrap();
    read_until(&mut stdout, &mut transcript, "[Function: onCreate.a]").await;

    stdin.write_all(b"onCreate.b\n").await.unwrap();
    read_until(&mut stdout, &mut transcript, "[Function: onCreate.b]").await;

    stdin.write_all(b"onCreate\n").await.unwrap();
    read_until(
        &mut stdout,
        &mut transcript,
        "{ a: [Function: onCreate.a], b: [Function: onCreate.b] }",
    )
    .await;

    stdin
        .write_all(b"onCreate.b({\"id\": 1})\n")
        .await
        .unwrap();
    read_until(&mut stdout, &mut transcript, "\"function\": \"onCreate-b\"").await;

    shutdown.cancel();
    let outcome = session.await.unwrap().unwrap();

    assert_eq!(outcome, SessionOutcome::Terminated);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(emulator.starts.load(Ordering::SeqCst), 1);
    assert_eq!(emulator.stops.load(Ordering::SeqCst), 1);
    assert!(!transcript.contains(NO_FUNCTIONS_MESSAGE));
}

/// Scenario: the emulator reports no emulated triggers.
#[tokio::test]
async fn test_no_functions_emulated_exits_without_prompt() {
    let (_dir, hub) = no_hub();
    let emulator = Arc::new(FakeEmulator {
        triggers: vec![event_trigger("notServed")],
        emulated: Vec::new(),
        ..Default::default()
    });
    let shell = Shell::new(hub, emulator.clone());

    let mut output = Vec::new();
    let outcome = shell
        .run(
            &options("5001"),
            BufReader::new(&b"never.read()\n"[..]),
            &mut output,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let transcript = String::from_utf8(output).unwrap();
    assert_eq!(outcome, SessionOutcome::NoFunctionsEmulated);
    assert_ne!(outcome.exit_code(), 0);
    assert_eq!(transcript, format!("{}\n", NO_FUNCTIONS_MESSAGE));
    assert!(!transcript.contains("firebase > "));
    // The emulator is released before the process exits.
    assert_eq!(emulator.stops.load(Ordering::SeqCst), 1);
}

/// Scenario: a hub with one registered firestore emulator.
#[tokio::test]
async fn test_hub_peer_announced_before_start() {
    let app = Router::new().route(
        "/emulators",
        get(|| async {
            Json(json!({
                "firestore": {"name": "firestore", "host": "127.0.0.1", "port": 8080},
                "hub": {"name": "hub", "host": "127.0.0.1", "port": 4400}
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hub_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let dir = TempDir::new().expect("Failed to create temp dir");
    let hub = LocatorHubClient::with_locator_dir(dir.path());
    std::fs::write(
        hub.locator_path(&ProjectId::new("demo").unwrap()),
        json!({
            "version": "1.0.0",
            "host": "127.0.0.1",
            "port": hub_addr.port(),
            "pid": std::process::id(),
        })
        .to_string(),
    )
    .unwrap();

    let emulator = Arc::new(FakeEmulator::default());
    let shell = Shell::new(hub, emulator.clone());

    let mut output = Vec::new();
    let outcome = shell
        .run(
            &options("5001"),
            BufReader::new(&b""[..]),
            &mut output,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, SessionOutcome::NoFunctionsEmulated);

    let started_with = emulator
        .started_with
        .lock()
        .unwrap()
        .clone()
        .expect("emulator was started");
    let kinds: Vec<_> = started_with.peers.keys().copied().collect();
    assert_eq!(kinds, vec![ServiceKind::Firestore]);
    let firestore = &started_with.peers[&ServiceKind::Firestore];
    assert_eq!(firestore.host, "127.0.0.1");
    assert_eq!(firestore.port.value(), 8080);

    let transcript = String::from_utf8(output).unwrap();
    let notice = transcript
        .find("Connecting to running firestore emulator at 127.0.0.1:8080")
        .expect("notice emitted");
    assert_eq!(transcript.matches("Connecting to running").count(), 1);
    let no_functions = transcript.find(NO_FUNCTIONS_MESSAGE).unwrap();
    assert!(notice < no_functions);
}

/// A non-numeric port fails before the emulator is touched.
#[tokio::test]
async fn test_non_numeric_port_fails_before_start() {
    for port in ["abc", "", "50x1"] {
        let (_dir, hub) = no_hub();
        let emulator = Arc::new(FakeEmulator::serving(&["a"]));
        let shell = Shell::new(hub, emulator.clone());

        let mut output = Vec::new();
        let err = shell
            .run(
                &options(port),
                BufReader::new(&b""[..]),
                &mut output,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShellError::Config(_)), "port {:?}", port);
        assert_eq!(emulator.starts.load(Ordering::SeqCst), 0);
        assert!(output.is_empty());
    }
}

/// An interrupt that arrives before the prompt still ends cleanly.
#[tokio::test]
async fn test_interrupt_before_session_is_graceful() {
    let (_dir, hub) = no_hub();
    let emulator = Arc::new(FakeEmulator::serving(&["a"]));
    let shell = Shell::new(hub, emulator.clone());

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let mut output = Vec::new();
    let outcome = shell
        .run(&options("5001"), BufReader::new(&b""[..]), &mut output, shutdown)
        .await
        .unwrap();

    assert_eq!(outcome, SessionOutcome::Terminated);
    assert_eq!(emulator.starts.load(Ordering::SeqCst), 0);
}

/// End of input keeps the session alive until the interrupt.
#[tokio::test]
async fn test_eof_waits_for_interrupt() {
    let (_dir, hub) = no_hub();
    let emulator = Arc::new(FakeEmulator::serving(&["hello"]));
    let shell = Shell::new(hub, emulator.clone());
    let shutdown = CancellationToken::new();

    let (shell_out, mut stdout) = tokio::io::duplex(64 * 1024);
    let session = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut shell_out = shell_out;
            shell
                .run(
                    &options("5001"),
                    BufReader::new(&b"hello\n"[..]),
                    &mut shell_out,
                    shutdown,
                )
                .await
        })
    };

    let mut transcript = String::new();
    read_until(&mut stdout, &mut transcript, "[Function: hello]").await;
    tokio::task::yield_now().await;
    assert!(!session.is_finished());
    assert_eq!(emulator.stops.load(Ordering::SeqCst), 0);

    shutdown.cancel();
    assert_eq!(session.await.unwrap().unwrap(), SessionOutcome::Terminated);
    assert_eq!(emulator.stops.load(Ordering::SeqCst), 1);
}

/// A failing stop is reported once and the session still terminates.
#[tokio::test]
async fn test_failed_stop_reported_once() {
    let (_dir, hub) = no_hub();
    let emulator = Arc::new(FakeEmulator {
        fail_stop: true,
        ..FakeEmulator::serving(&["hello"])
    });
    let shell = Shell::new(hub, emulator.clone());
    let shutdown = CancellationToken::new();

    let (shell_out, mut stdout) = tokio::io::duplex(64 * 1024);
    let session = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut shell_out = shell_out;
            shell
                .run(
                    &options("5001"),
                    BufReader::new(&b""[..]),
                    &mut shell_out,
                    shutdown,
                )
                .await
        })
    };

    let mut transcript = String::new();
    read_until(&mut stdout, &mut transcript, "firebase > ").await;
    shutdown.cancel();

    assert_eq!(session.await.unwrap().unwrap(), SessionOutcome::Terminated);
    stdout.read_to_string(&mut transcript).await.unwrap();

    assert_eq!(emulator.stops.load(Ordering::SeqCst), 1);
    assert_eq!(
        transcript
            .matches("Error stopping functions emulator: ")
            .count(),
        1
    );
    assert!(transcript.contains("listener already closed"));
}

/// Losing the terminal still releases the emulator.
#[tokio::test]
async fn test_broken_output_still_stops_emulator() {
    let (_dir, hub) = no_hub();
    let emulator = Arc::new(FakeEmulator::serving(&["hello"]));
    let shell = Shell::new(hub, emulator.clone());

    let err = shell
        .run(
            &options("5001"),
            BufReader::new(&b"hello\n"[..]),
            &mut BrokenPipe,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ShellError::Io { .. }));
    assert_eq!(emulator.starts.load(Ordering::SeqCst), 1);
    assert_eq!(emulator.stops.load(Ordering::SeqCst), 1);
}

/// Losing the terminal on the no-functions path still releases the emulator.
#[tokio::test]
async fn test_broken_output_without_functions_still_stops_emulator() {
    let (_dir, hub) = no_hub();
    let emulator = Arc::new(FakeEmulator::default());
    let shell = Shell::new(hub, emulator.clone());

    let err = shell
        .run(
            &options("5001"),
            BufReader::new(&b""[..]),
            &mut BrokenPipe,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ShellError::Io { .. }));
    assert_eq!(emulator.stops.load(Ordering::SeqCst), 1);
}

/// A function named `help` does not hide the help text.
#[tokio::test]
async fn test_help_survives_function_named_help() {
    let (_dir, hub) = no_hub();
    let emulator = Arc::new(FakeEmulator::serving(&["help", "other"]));
    let shell = Shell::new(hub, emulator.clone());
    let shutdown = CancellationToken::new();

    let (mut stdin, shell_in) = tokio::io::duplex(4096);
    let (shell_out, mut stdout) = tokio::io::duplex(64 * 1024);
    let session = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut shell_out = shell_out;
            shell
                .run(&options("5001"), BufReader::new(shell_in), &mut shell_out, shutdown)
                .await
        })
    };

    let mut transcript = String::new();
    read_until(&mut stdout, &mut transcript, "firebase > ").await;
    stdin.write_all(b"help\n").await.unwrap();
    read_until(&mut stdout, &mut transcript, "local-emulator").await;
    assert!(!transcript.contains("[Function: help]"));

    shutdown.cancel();
    assert_eq!(session.await.unwrap().unwrap(), SessionOutcome::Terminated);
}
