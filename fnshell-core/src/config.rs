// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shell options and the YAML function manifest.
//!
//! Both are validated up front: any invalid field is a `ConfigError` raised
//! before discovery runs or a listener is bound.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{FunctionName, PeerMap, Port, ProjectId, ServiceKind};

/// Inspector port used when `--inspect-functions` is given without a value.
pub const DEFAULT_INSPECT_PORT: u16 = 9229;

/// Region assigned to functions that don't declare one.
pub const DEFAULT_REGION: &str = "us-central1";

/// Raw options as received from the command line (before validation).
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// Port for the functions emulator, as typed by the operator.
    pub port: String,
    /// `None` when the flag is absent, `Some("")` when given without a value.
    pub inspect_functions: Option<String>,
    /// Project the emulators belong to.
    pub project: Option<String>,
}

impl ShellOptions {
    /// Validate the options into a `ShellConfig` with no peers yet.
    pub fn validate(&self) -> Result<ShellConfig, ConfigError> {
        let port = Port::parse(&self.port)?;
        let debug_port = parse_inspection_port(self.inspect_functions.as_deref())?;
        let project = match self.project.as_deref() {
            Some(project) => ProjectId::new(project)?,
            None => {
                return Err(ConfigError::MissingRequiredField {
                    field: "project",
                    context: "shell options".to_string(),
                })
            }
        };

        Ok(ShellConfig {
            project,
            port,
            debug_port,
            peers: PeerMap::new(),
        })
    }
}

/// Resolve the inspector port from the `--inspect-functions` flag value.
pub fn parse_inspection_port(value: Option<&str>) -> Result<Option<Port>, ConfigError> {
    match value.map(str::trim) {
        None => Ok(None),
        Some("") | Some("true") => Ok(Some(Port::new(DEFAULT_INSPECT_PORT)?)),
        Some(raw) => Port::parse(raw)
            .map(Some)
            .map_err(|e| ConfigError::InvalidFieldValue {
                field: "inspect_functions",
                value: raw.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Configuration handed to the functions emulator. Built once, never mutated
/// after the emulator starts.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub project: ProjectId,
    pub port: Port,
    pub debug_port: Option<Port>,
    pub peers: PeerMap,
}

impl ShellConfig {
    /// Attach the peers found by discovery.
    pub fn with_peers(mut self, peers: PeerMap) -> Self {
        self.peers = peers;
        self
    }
}

/// Raw trigger declaration as parsed from YAML.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawTrigger {
    Http,
    Event { event_type: String, resource: String },
}

/// Raw function declaration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawFunctionConfig {
    name: String,
    #[serde(default = "default_region")]
    region: String,
    trigger: RawTrigger,
    handler_port: u16,
    #[serde(default)]
    command: Vec<String>,
    #[serde(default)]
    environment: HashMap<String, String>,
    #[serde(default = "default_emulated")]
    emulated: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_emulated() -> bool {
    true
}

/// Raw manifest file.
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    functions: Vec<RawFunctionConfig>,
}

/// How a function is triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerConfig {
    Http,
    Event { event_type: String, resource: String },
}

impl TriggerConfig {
    /// Service whose events fire this trigger. `None` for HTTP triggers and
    /// for event sources no emulator serves.
    pub fn event_service(&self) -> Option<ServiceKind> {
        let TriggerConfig::Event { event_type, .. } = self else {
            return None;
        };
        if event_type.contains("firestore") {
            Some(ServiceKind::Firestore)
        } else if event_type.contains("firebase.database") {
            Some(ServiceKind::Database)
        } else if event_type.contains("pubsub") {
            Some(ServiceKind::Pubsub)
        } else if event_type.contains("firebase.auth") {
            Some(ServiceKind::Auth)
        } else if event_type.contains("storage") {
            Some(ServiceKind::Storage)
        } else {
            None
        }
    }

    /// Whether the emulator can serve this trigger locally.
    pub fn is_emulatable(&self) -> bool {
        matches!(self, TriggerConfig::Http) || self.event_service().is_some()
    }
}

/// Validated function declaration.
#[derive(Debug, Clone)]
pub struct FunctionConfig {
    pub name: FunctionName,
    pub region: String,
    pub trigger: TriggerConfig,
    pub handler_port: Port,
    /// Program and arguments that serve the handler; empty when the handler
    /// is started outside the shell.
    pub command: Vec<String>,
    pub environment: HashMap<String, String>,
    pub emulated: bool,
}

/// Validated function manifest.
#[derive(Debug, Default)]
pub struct Manifest {
    pub functions: Vec<FunctionConfig>,
}

/// Manifest loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a manifest from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Manifest, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ManifestParse {
            message: format!("reading {}: {}", path.display(), e),
        })?;

        Self::load_string(&content)
    }

    /// Load and validate a manifest from a YAML string.
    pub fn load_string(content: &str) -> Result<Manifest, ConfigError> {
        let raw: RawManifest =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ManifestParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawManifest) -> Result<Manifest, ConfigError> {
        let mut functions = Vec::with_capacity(raw.functions.len());
        let mut seen_names = std::collections::HashSet::new();
        let mut seen_ports = std::collections::HashSet::new();

        for (index, raw_func) in raw.functions.into_iter().enumerate() {
            let func = Self::validate_function(raw_func, index)?;

            if !seen_names.insert(func.name.clone()) {
                return Err(ConfigError::DuplicateFunctionName {
                    name: func.name.to_string(),
                });
            }

            if !seen_ports.insert(func.handler_port) {
                return Err(ConfigError::InvalidPort {
                    value: func.handler_port.to_string(),
                    reason: format!(
                        "Handler port {} is already used by another function",
                        func.handler_port
                    ),
                });
            }

            functions.push(func);
        }

        Ok(Manifest { functions })
    }

    fn validate_function(raw: RawFunctionConfig, index: usize) -> Result<FunctionConfig, ConfigError> {
        let context = format!("function at index {}", index);

        let name = FunctionName::new(&raw.name)?;

        if raw.region.is_empty()
            || !raw
                .region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::InvalidFieldValue {
                field: "region",
                value: raw.region,
                reason: format!("Region must be a lowercase identifier in {}", context),
            });
        }

        let trigger = match raw.trigger {
            RawTrigger::Http => TriggerConfig::Http,
            RawTrigger::Event {
                event_type,
                resource,
            } => {
                if event_type.is_empty() {
                    return Err(ConfigError::MissingRequiredField {
                        field: "event_type",
                        context,
                    });
                }
                if resource.is_empty() {
                    return Err(ConfigError::MissingRequiredField {
                        field: "resource",
                        context,
                    });
                }
                TriggerConfig::Event {
                    event_type,
                    resource,
                }
            }
        };

        let handler_port = Port::new(raw.handler_port)?;

        for key in raw.environment.keys() {
            if key.is_empty() {
                return Err(ConfigError::InvalidFieldValue {
                    field: "environment",
                    value: format!("empty key in {}", context),
                    reason: "Environment variable names cannot be empty".to_string(),
                });
            }
        }

        Ok(FunctionConfig {
            name,
            region: raw.region,
            trigger,
            handler_port,
            command: raw.command,
            environment: raw.environment,
            emulated: raw.emulated,
        })
    }
}
