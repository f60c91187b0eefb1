// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time, so a `ShellConfig`
//! built from them cannot carry a malformed port or project.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest function name the emulator accepts.
const MAX_FUNCTION_NAME_LEN: usize = 63;
/// Longest project identifier accepted.
const MAX_PROJECT_ID_LEN: usize = 64;

/// Validated network port.
/// Must be in range 1-65535 (0 is reserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Create a new Port with validation.
    pub fn new(port: u16) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort {
                value: port.to_string(),
                reason: "Port 0 is reserved and cannot be used".to_string(),
            });
        }
        Ok(Self(port))
    }

    /// Parse a port from its base-10 string form.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        let port = trimmed
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidPort {
                value: value.to_string(),
                reason: format!("not a base-10 port number ({})", e),
            })?;
        Self::new(port)
    }

    /// Get the inner port value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Validated project identifier.
/// Lowercase ASCII letters, digits and hyphens; non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a new ProjectId with validation.
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigError> {
        let id = id.into();

        if id.is_empty() {
            return Err(ConfigError::MissingRequiredField {
                field: "project",
                context: "shell options".to_string(),
            });
        }

        if id.len() > MAX_PROJECT_ID_LEN {
            return Err(ConfigError::InvalidFieldValue {
                field: "project",
                value: id.clone(),
                reason: format!("Project ID too long: {} chars (max {})", id.len(), MAX_PROJECT_ID_LEN),
            });
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::InvalidFieldValue {
                field: "project",
                value: id,
                reason: "Project ID must contain only lowercase letters, digits, and hyphens"
                    .to_string(),
            });
        }

        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

/// Validated function name as declared in a manifest.
/// Alphanumeric with hyphens/underscores, max 63 chars. Hyphens separate
/// groups, so empty groups (`a--b`, `-a`) are rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionName(String);

impl FunctionName {
    /// Create a new FunctionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Function name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_FUNCTION_NAME_LEN {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name.clone(),
                reason: format!(
                    "Function name too long: {} chars (max {})",
                    name.len(),
                    MAX_FUNCTION_NAME_LEN
                ),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Function name must contain only alphanumeric characters, hyphens, and underscores".to_string(),
            });
        }

        if name.split('-').any(str::is_empty) {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Function name groups cannot be empty".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FunctionName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FunctionName> for String {
    fn from(name: FunctionName) -> Self {
        name.0
    }
}

/// Emulator kinds the hub may report. Declaration order is the canonical
/// order used when iterating peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Functions,
    Firestore,
    Database,
    Hosting,
    Pubsub,
    Auth,
    Storage,
}

/// Every recognized emulator kind, in canonical order.
pub const ALL_SERVICE_EMULATORS: [ServiceKind; 7] = [
    ServiceKind::Functions,
    ServiceKind::Firestore,
    ServiceKind::Database,
    ServiceKind::Hosting,
    ServiceKind::Pubsub,
    ServiceKind::Auth,
    ServiceKind::Storage,
];

impl ServiceKind {
    /// Name used by the hub and in log output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Functions => "functions",
            Self::Firestore => "firestore",
            Self::Database => "database",
            Self::Hosting => "hosting",
            Self::Pubsub => "pubsub",
            Self::Auth => "auth",
            Self::Storage => "storage",
        }
    }

    /// Look up a kind by its hub name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        ALL_SERVICE_EMULATORS
            .into_iter()
            .find(|kind| kind.as_str() == name)
    }

    /// Environment variable through which function code finds this peer.
    pub const fn host_env_var(&self) -> Option<&'static str> {
        match self {
            Self::Firestore => Some("FIRESTORE_EMULATOR_HOST"),
            Self::Database => Some("FIREBASE_DATABASE_EMULATOR_HOST"),
            Self::Pubsub => Some("PUBSUB_EMULATOR_HOST"),
            Self::Auth => Some("FIREBASE_AUTH_EMULATOR_HOST"),
            Self::Storage => Some("FIREBASE_STORAGE_EMULATOR_HOST"),
            Self::Functions | Self::Hosting => None,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Address of one running peer emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorEndpoint {
    pub kind: ServiceKind,
    pub host: String,
    pub port: Port,
}

impl EmulatorEndpoint {
    /// `host:port` form, as used in emulator host environment variables.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for EmulatorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} emulator at {}:{}", self.kind, self.host, self.port)
    }
}

/// Discovered peers keyed by kind. Iterates in canonical kind order.
pub type PeerMap = BTreeMap<ServiceKind, EmulatorEndpoint>;
