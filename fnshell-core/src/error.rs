// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for fnshell.
//!
//! Every stage of the shell pipeline has its own error enum. Stages before the
//! interactive loop are fatal to the session, invocation errors are local to a
//! single call, and shutdown errors are reported but never propagated.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the shell pipeline.
#[derive(Debug, Error)]
pub enum ShellError {
    // =========================================================================
    // Configuration Errors - Fail-Fast Before Any Listener Exists
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // =========================================================================
    // Emulator Lifecycle Errors
    // =========================================================================
    #[error("Emulator failed to start: {0}")]
    Startup(#[from] StartupError),

    #[error("Functions emulator has not been started")]
    NotStarted,

    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid or missing configuration. Raised before the emulator is started.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid port: {value} - {reason}")]
    InvalidPort { value: String, reason: String },

    #[error("Duplicate function name: {name}")]
    DuplicateFunctionName { name: String },

    #[error("Manifest file not found: {path}")]
    ManifestNotFound { path: PathBuf },

    #[error("Manifest parse error: {message}")]
    ManifestParse { message: String },
}

/// Hub discovery failures. Never leave the discovery boundary: they are
/// collapsed into an empty peer map by `HubDiscovery::locate`.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Hub locator unreadable at {path}: {reason}")]
    Locator { path: PathBuf, reason: String },

    #[error("Hub request failed: {reason}")]
    Request { reason: String },

    #[error("Hub returned status {status}")]
    Status { status: u16 },

    #[error("Hub response malformed: {reason}")]
    Malformed { reason: String },
}

/// The functions emulator could not be brought up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Port {port} is unavailable: {reason}")]
    PortUnavailable { port: u16, reason: String },

    #[error("Invalid emulator configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to spawn handler for {function}: {reason}")]
    SpawnFailed { function: String, reason: String },

    #[error("Emulator did not become ready: {reason}")]
    NotReady { reason: String },

    #[error("Emulator start was cancelled by shutdown")]
    Cancelled,

    #[error("Emulator was already started in this session")]
    AlreadyStarted,
}

/// A single bound callable failed. Rendered as the call's result.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Function {function} is not emulated")]
    NotEmulated { function: String },

    #[error("Invalid argument for {function}: {reason}")]
    InvalidArgument { function: String, reason: String },

    #[error("Request to {function} failed: {reason}")]
    Transport { function: String, reason: String },

    #[error("Function {function} failed with status {status}: {detail}")]
    Failed {
        function: String,
        status: u16,
        detail: String,
    },
}

/// Stopping the emulator failed. Logged once during teardown, then ignored.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("Failed to stop gateway: {reason}")]
    Gateway { reason: String },

    #[error("Failed to stop handler {function}: {reason}")]
    Handler { function: String, reason: String },
}

/// State transition errors for the session state machine.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition session from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Session is in terminal state: {state}")]
    TerminalState { state: &'static str },
}

/// Result type alias using ShellError.
pub type ShellResult<T> = Result<T, ShellError>;
