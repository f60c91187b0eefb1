//! fnshell Core Library
//!
//! Coordinates an interactive functions shell: discovers peer emulators
//! through the hub, owns the functions emulator lifecycle, and binds emulated
//! triggers into the shell namespace.

pub mod binder;
pub mod config;
pub mod emulator;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod namespace;
pub mod repl;
pub mod session;
pub mod shell;
pub mod triggers;
pub mod types;

// Re-export commonly used types
pub use binder::{namespace_path, BoundCallable, CallableBinder};
pub use config::{ConfigLoader, FunctionConfig, Manifest, ShellConfig, ShellOptions, TriggerConfig};
pub use emulator::{
    EmulatorInstance, FunctionsEmulator, Invocation, InvocationTarget, RunningEmulator,
    SentRequest, Trigger,
};
pub use error::{
    ConfigError, DiscoveryError, InvocationError, ShellError, ShellResult, ShutdownError,
    StartupError,
};
pub use hub::{HubClient, HubDiscovery, LocatorHubClient};
pub use lifecycle::{EmulatorLifecycle, LifecyclePhase};
pub use namespace::Namespace;
pub use session::{SessionOutcome, SessionState, ShellSession};
pub use shell::Shell;
pub use triggers::TriggerRegistry;
pub use types::{EmulatorEndpoint, FunctionName, PeerMap, Port, ProjectId, ServiceKind};
