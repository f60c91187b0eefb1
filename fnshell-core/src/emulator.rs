// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Interfaces to the functions emulator.
//!
//! The shell never executes functions itself. It drives an emulator through
//! [`FunctionsEmulator`] and calls triggers through the [`EmulatorInstance`]
//! the emulator hands back once it is ready.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ShellConfig;
use crate::error::{InvocationError, ShutdownError, StartupError};

/// Where a trigger's invocations go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationTarget {
    /// HTTPS function reachable at `url` through the emulator.
    Http { url: String },
    /// Background function fired by events of `event_type` on `resource`.
    Event { event_type: String, resource: String },
}

/// Metadata describing one deployable function and how to invoke it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub name: String,
    pub target: InvocationTarget,
    pub emulated: bool,
}

impl Trigger {
    /// Human-readable call signature shown for the bound callable.
    pub fn signature(&self) -> &'static str {
        match self.target {
            InvocationTarget::Http { .. } => "(request?)",
            InvocationTarget::Event { .. } => "(data?)",
        }
    }
}

/// An HTTP request fired at a function. The response is reported
/// asynchronously by the emulator, not returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub method: String,
    pub url: String,
}

/// What a bound callable produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Result of a background function.
    Value(Value),
    /// An outbound HTTP request is in flight.
    Request(SentRequest),
    /// Plain text produced by the function.
    Text(String),
}

/// Handle to a started, ready functions emulator.
#[async_trait]
pub trait EmulatorInstance: Send + Sync {
    /// Every trigger the emulator knows about, in declaration order.
    fn triggers(&self) -> Vec<Trigger>;

    /// Names of the triggers this instance can serve locally.
    fn emulated_functions(&self) -> Vec<String>;

    /// Dispatch one call to `trigger` with an optional JSON argument.
    async fn invoke(
        &self,
        trigger: &Trigger,
        argument: Option<Value>,
    ) -> Result<Invocation, InvocationError>;
}

/// Shared handle to the running emulator instance.
pub type RunningEmulator = Arc<dyn EmulatorInstance>;

/// A functions emulator the shell can start and stop.
#[async_trait]
pub trait FunctionsEmulator: Send + Sync {
    /// Bind the emulator's listener and launch its handlers.
    async fn start(&self, config: &ShellConfig) -> Result<(), StartupError>;

    /// Wait until the started emulator is ready and return its instance.
    async fn connect(&self) -> Result<RunningEmulator, StartupError>;

    /// Release everything `start` acquired. Must tolerate a partial start.
    async fn stop(&self) -> Result<(), ShutdownError>;
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            InvocationTarget::Http { url } => write!(f, "{} [http] {}", self.name, url),
            InvocationTarget::Event {
                event_type,
                resource,
            } => write!(f, "{} [{}] {}", self.name, event_type, resource),
        }
    }
}
