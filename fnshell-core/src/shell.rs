// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The shell pipeline: discover → start → enumerate → bind → run → stop.
//!
//! Each stage waits for the previous one. The shutdown token is raced against
//! the stages that can block, and every path that has started the emulator
//! ends in `EmulatorLifecycle::stop`.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::config::ShellOptions;
use crate::emulator::FunctionsEmulator;
use crate::error::{ShellResult, StartupError};
use crate::hub::{connection_notices, HubClient, HubDiscovery};
use crate::lifecycle::EmulatorLifecycle;
use crate::repl::DEFAULT_PROMPT;
use crate::session::{write_out, SessionOutcome, ShellSession};
use crate::triggers::TriggerRegistry;

/// Message printed when the emulator has nothing to serve.
pub const NO_FUNCTIONS_MESSAGE: &str = "No functions emulated.";

/// Wires discovery, the emulator, and the interactive session together.
pub struct Shell<C> {
    discovery: HubDiscovery<C>,
    emulator: Arc<dyn FunctionsEmulator>,
    prompt: String,
}

impl<C: HubClient> Shell<C> {
    pub fn new(hub: C, emulator: Arc<dyn FunctionsEmulator>) -> Self {
        Self {
            discovery: HubDiscovery::new(hub),
            emulator,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Run one shell session to completion.
    ///
    /// Configuration and startup failures are returned as errors before any
    /// prompt is shown. A shutdown signal at any stage ends in a graceful
    /// `SessionOutcome::Terminated`.
    pub async fn run<R, W>(
        &self,
        options: &ShellOptions,
        input: R,
        output: &mut W,
        shutdown: CancellationToken,
    ) -> ShellResult<SessionOutcome>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let config = options.validate()?;

        let peers = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown requested during emulator discovery");
                return Ok(SessionOutcome::Terminated);
            }
            peers = self.discovery.locate(&config.project) => peers,
        };
        for notice in connection_notices(&peers) {
            tracing::debug!("{}", notice);
            write_out(output, &format!("i  {}\n", notice)).await?;
        }
        let config = config.with_peers(peers);

        let lifecycle = EmulatorLifecycle::new(Arc::clone(&self.emulator));
        let mut session = ShellSession::new(lifecycle.clone(), self.prompt.clone());

        let start = lifecycle.start(config);
        tokio::pin!(start);
        let raced = tokio::select! {
            biased;
            result = &mut start => Some(result),
            _ = shutdown.cancelled() => None,
        };
        let started = match raced {
            Some(result) => result,
            None => {
                tracing::info!("Shutdown requested while functions emulator was starting");
                let (result, stopped) = tokio::join!(start, lifecycle.stop());
                if let Err(e) = stopped {
                    tracing::warn!(error = %e, "Error while stopping functions emulator");
                }
                match result {
                    Ok(_) | Err(StartupError::Cancelled) => {
                        session.abandon()?;
                        return Ok(SessionOutcome::Terminated);
                    }
                    Err(e) => Err(e),
                }
            }
        };

        let instance = match started {
            Ok(instance) => instance,
            Err(e) => {
                session.abandon()?;
                return Err(e.into());
            }
        };

        let triggers = TriggerRegistry::list_emulated(instance.as_ref());
        if triggers.is_empty() {
            tracing::debug!("{}", NO_FUNCTIONS_MESSAGE);
            let reported = write_out(output, &format!("{}\n", NO_FUNCTIONS_MESSAGE)).await;
            if let Err(e) = lifecycle.stop().await {
                tracing::warn!(error = %e, "Error while stopping functions emulator");
            }
            session.abandon()?;
            reported?;
            return Ok(SessionOutcome::NoFunctionsEmulated);
        }

        session.enter(triggers, &instance)?;
        session.run(input, output, &shutdown).await
    }
}
