// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Start-once, stop-idempotent ownership of the functions emulator.
//!
//! Phases move strictly forward: Unstarted → Starting → Started → Stopping →
//! Stopped. A `stop` that arrives while `start` is in flight cancels the
//! start; the start path then releases whatever the emulator had acquired and
//! the stop waits for it to finish.

use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::ShellConfig;
use crate::emulator::{FunctionsEmulator, RunningEmulator};
use crate::error::{ShellError, ShutdownError, StartupError};

/// Lifecycle phases of the functions emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Unstarted,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl LifecyclePhase {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unstarted => "Unstarted",
            Self::Starting => "Starting",
            Self::Started => "Started",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

struct Shared {
    emulator: Arc<dyn FunctionsEmulator>,
    phase: watch::Sender<LifecyclePhase>,
    instance: OnceLock<RunningEmulator>,
    cancel: CancellationToken,
}

impl Shared {
    /// Stop the emulator after a failed or abandoned start.
    async fn release(&self) {
        if let Err(e) = self.emulator.stop().await {
            tracing::warn!(error = %e, "Failed to release emulator after aborted start");
        }
        self.phase.send_replace(LifecyclePhase::Stopped);
    }
}

/// Owns the functions emulator for the lifetime of one shell session.
#[derive(Clone)]
pub struct EmulatorLifecycle {
    shared: Arc<Shared>,
}

enum StopAction {
    Nothing,
    WaitForStopped,
    Stop,
}

impl EmulatorLifecycle {
    pub fn new(emulator: Arc<dyn FunctionsEmulator>) -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::Unstarted);
        Self {
            shared: Arc::new(Shared {
                emulator,
                phase,
                instance: OnceLock::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> LifecyclePhase {
        *self.shared.phase.borrow()
    }

    /// Start the emulator and wait for it to become ready.
    pub async fn start(&self, config: ShellConfig) -> Result<RunningEmulator, StartupError> {
        let mut previous = LifecyclePhase::Unstarted;
        let claimed = self.shared.phase.send_if_modified(|phase| {
            previous = *phase;
            if *phase == LifecyclePhase::Unstarted {
                *phase = LifecyclePhase::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(match previous {
                LifecyclePhase::Stopping | LifecyclePhase::Stopped => StartupError::Cancelled,
                _ => StartupError::AlreadyStarted,
            });
        }

        tracing::info!(
            port = config.port.value(),
            debug_port = ?config.debug_port.map(|p| p.value()),
            peers = config.peers.len(),
            "Starting functions emulator"
        );

        let guard = StartGuard {
            shared: Some(Arc::clone(&self.shared)),
        };

        let outcome = tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => Err(StartupError::Cancelled),
            result = self.bring_up(&config) => result,
        };

        let instance = match outcome {
            Ok(instance) => instance,
            Err(e) => {
                guard.disarm();
                tracing::error!(error = %e, "Functions emulator failed to start");
                self.shared.release().await;
                return Err(e);
            }
        };

        if self.shared.instance.set(Arc::clone(&instance)).is_err() {
            tracing::warn!("Functions emulator instance was already recorded");
        }
        let cancel = &self.shared.cancel;
        let promoted = self.shared.phase.send_if_modified(|phase| {
            if *phase == LifecyclePhase::Starting && !cancel.is_cancelled() {
                *phase = LifecyclePhase::Started;
                true
            } else {
                false
            }
        });
        guard.disarm();

        if !promoted {
            tracing::info!("Shutdown requested while emulator was starting");
            self.shared.release().await;
            return Err(StartupError::Cancelled);
        }

        tracing::info!(port = config.port.value(), "Functions emulator ready");
        Ok(instance)
    }

    async fn bring_up(&self, config: &ShellConfig) -> Result<RunningEmulator, StartupError> {
        self.shared.emulator.start(config).await?;
        self.shared.emulator.connect().await
    }

    /// Handle established by `start`.
    pub fn get(&self) -> Result<RunningEmulator, ShellError> {
        if self.phase() != LifecyclePhase::Started {
            return Err(ShellError::NotStarted);
        }
        self.shared
            .instance
            .get()
            .cloned()
            .ok_or(ShellError::NotStarted)
    }

    /// Stop the emulator. Safe to call repeatedly, concurrently, and while
    /// `start` is still running. Only the call that performs the stop can
    /// return its error.
    pub async fn stop(&self) -> Result<(), ShutdownError> {
        let mut action = StopAction::Nothing;
        let cancel = &self.shared.cancel;
        self.shared.phase.send_if_modified(|phase| match *phase {
            LifecyclePhase::Unstarted => {
                *phase = LifecyclePhase::Stopped;
                true
            }
            LifecyclePhase::Starting => {
                cancel.cancel();
                action = StopAction::WaitForStopped;
                false
            }
            LifecyclePhase::Started => {
                *phase = LifecyclePhase::Stopping;
                action = StopAction::Stop;
                true
            }
            LifecyclePhase::Stopping => {
                action = StopAction::WaitForStopped;
                false
            }
            LifecyclePhase::Stopped => false,
        });

        match action {
            StopAction::Nothing => Ok(()),
            StopAction::WaitForStopped => {
                let mut rx = self.shared.phase.subscribe();
                let _ = rx.wait_for(|phase| *phase == LifecyclePhase::Stopped).await;
                Ok(())
            }
            StopAction::Stop => {
                tracing::info!("Stopping functions emulator");
                let result = self.shared.emulator.stop().await;
                self.shared.phase.send_replace(LifecyclePhase::Stopped);
                result
            }
        }
    }
}

/// Releases the emulator if a `start` future is dropped before it finishes.
struct StartGuard {
    shared: Option<Arc<Shared>>,
}

impl StartGuard {
    fn disarm(mut self) {
        self.shared = None;
    }
}

impl Drop for StartGuard {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        let abandoned = shared.phase.send_if_modified(|phase| {
            if *phase == LifecyclePhase::Starting {
                *phase = LifecyclePhase::Stopping;
                true
            } else {
                false
            }
        });
        if !abandoned {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { shared.release().await });
            }
            Err(_) => {
                shared.phase.send_replace(LifecyclePhase::Stopped);
            }
        }
    }
}
