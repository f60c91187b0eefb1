// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Interactive session with typed state transitions.
//!
//! Implements the session lifecycle: Idle → Running → ShuttingDown → Terminated.
//! Only the shutdown token moves a running session forward; nothing typed at
//! the prompt can end it.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::binder::CallableBinder;
use crate::emulator::{RunningEmulator, Trigger};
use crate::error::{ShellError, ShellResult, StateTransitionError};
use crate::lifecycle::EmulatorLifecycle;
use crate::namespace::Namespace;
use crate::repl::{format_invocation, Repl};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Namespace not yet built, no prompt shown.
    Idle,

    /// Reading and evaluating expressions.
    Running,

    /// Shutdown signal received, emulator being stopped.
    ShuttingDown,

    /// Session finished.
    Terminated,
}

impl SessionState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::ShuttingDown => "ShuttingDown",
            Self::Terminated => "Terminated",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        matches!(
            (self, target),
            // From Idle
            (Self::Idle, Self::Running) |
            (Self::Idle, Self::ShuttingDown) |
            (Self::Idle, Self::Terminated) |
            // From Running
            (Self::Running, Self::ShuttingDown) |
            // From ShuttingDown
            (Self::ShuttingDown, Self::Terminated)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for the session lifecycle.
#[derive(Debug)]
pub struct SessionStateMachine {
    current_state: SessionState,
    transition_count: u64,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: SessionState::Idle,
            transition_count: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.current_state
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: SessionState) -> Result<(), StateTransitionError> {
        if self.current_state == SessionState::Terminated {
            return Err(StateTransitionError::TerminalState {
                state: self.current_state.name(),
            });
        }
        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            from = self.current_state.name(),
            to = target.name(),
            "Session state transition"
        );

        self.current_state = target;
        self.transition_count += 1;

        Ok(())
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Shut down after a termination signal.
    Terminated,
    /// The emulator had nothing to serve; no prompt was shown.
    NoFunctionsEmulated,
}

impl SessionOutcome {
    /// Process exit code for this outcome.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Terminated => 0,
            Self::NoFunctionsEmulated => 1,
        }
    }
}

/// One interactive shell session over a started emulator.
pub struct ShellSession {
    state: SessionStateMachine,
    lifecycle: EmulatorLifecycle,
    prompt: String,
    repl: Option<Repl>,
}

impl ShellSession {
    pub fn new(lifecycle: EmulatorLifecycle, prompt: impl Into<String>) -> Self {
        Self {
            state: SessionStateMachine::new(),
            lifecycle,
            prompt: prompt.into(),
            repl: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    /// Namespace of a running session.
    pub fn namespace(&self) -> Option<&Namespace> {
        self.repl.as_ref().map(Repl::namespace)
    }

    /// Bind every trigger into a fresh namespace and enter `Running`.
    pub fn enter(&mut self, triggers: Vec<Trigger>, instance: &RunningEmulator) -> ShellResult<()> {
        let mut namespace = Namespace::new();
        for trigger in triggers.into_iter().filter(|t| t.emulated) {
            let callable = CallableBinder::bind(trigger, instance);
            tracing::debug!(
                function = %callable.trigger_name(),
                path = %callable.path(),
                signature = callable.trigger().signature(),
                "Bound function"
            );
            namespace.install(callable);
        }
        namespace.install_help();

        tracing::info!(
            functions = namespace.callables().count(),
            "Functions shell ready"
        );

        self.state.transition_to(SessionState::Running)?;
        self.repl = Some(Repl::new(self.prompt.clone(), format_invocation, namespace));
        Ok(())
    }

    /// End a session that never reached `Running`.
    pub fn abandon(&mut self) -> ShellResult<()> {
        if self.state() == SessionState::Idle {
            self.state.transition_to(SessionState::Terminated)?;
        }
        Ok(())
    }

    /// Read-eval-print until `shutdown` is cancelled, then stop the emulator.
    /// End of input stops reading but keeps the session alive. The emulator
    /// is stopped even when writing to `output` fails.
    pub async fn run<R, W>(
        &mut self,
        input: R,
        output: &mut W,
        shutdown: &CancellationToken,
    ) -> ShellResult<SessionOutcome>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Some(repl) = self.repl.as_ref() else {
            return Err(StateTransitionError::InvalidTransition {
                from: self.state().name(),
                to: SessionState::ShuttingDown.name(),
            }
            .into());
        };

        let looped = read_eval_print(repl, input, output, shutdown).await;
        if let Err(e) = &looped {
            tracing::error!(error = %e, "Shell output failed, stopping functions emulator");
        }

        let stopped = self.shutdown(output).await;
        looped?;
        stopped?;
        Ok(SessionOutcome::Terminated)
    }

    /// Stop the emulator and terminate. A failed stop is reported once and
    /// otherwise ignored.
    pub async fn shutdown<W>(&mut self, output: &mut W) -> ShellResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.state.transition_to(SessionState::ShuttingDown)?;
        tracing::info!("Shutting down functions shell");

        let reported = match self.lifecycle.stop().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!(error = %e, "Error while stopping functions emulator");
                write_out(output, &format!("Error stopping functions emulator: {}\n", e)).await
            }
        };

        self.state.transition_to(SessionState::Terminated)?;
        reported
    }
}

async fn read_eval_print<R, W>(
    repl: &Repl,
    input: R,
    output: &mut W,
    shutdown: &CancellationToken,
) -> ShellResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        write_out(output, repl.prompt()).await?;

        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("Input closed, waiting for shutdown signal");
                shutdown.cancelled().await;
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read input, waiting for shutdown signal");
                shutdown.cancelled().await;
                break;
            }
        };

        let rendered = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            rendered = repl.eval(&line) => rendered,
        };

        if let Some(rendered) = rendered {
            write_out(output, &rendered).await?;
            write_out(output, "\n").await?;
        }
    }

    write_out(output, "\n").await
}

pub(crate) async fn write_out<W>(output: &mut W, text: &str) -> ShellResult<()>
where
    W: AsyncWrite + Unpin,
{
    output
        .write_all(text.as_bytes())
        .await
        .map_err(|e| ShellError::Io {
            context: "writing shell output",
            source: e,
        })?;
    output.flush().await.map_err(|e| ShellError::Io {
        context: "flushing shell output",
        source: e,
    })
}
